//! Request/response surface of the remote chat service.
//!
//! Every call except token exchange and registration carries the bearer token
//! explicitly; nothing here reads process-wide state.

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::client::config::ClientConfig;
use crate::common::error::{ClientError, Result};
use crate::common::models::{Conversation, ConversationId, Message, User};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password2: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignupResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
struct CreateOrGetRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct MarkAsReadRequest<'a> {
    conversation_id: &'a ConversationId,
}

#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn obtain_token(&self, credentials: &LoginRequest) -> Result<TokenResponse>;
    async fn current_user(&self, token: &str) -> Result<User>;
    async fn register(&self, payload: &SignupRequest) -> Result<SignupResponse>;
    async fn list_conversations(&self, token: &str) -> Result<Vec<Conversation>>;
    async fn create_or_get_conversation(&self, token: &str, email: &str) -> Result<Conversation>;
    async fn list_messages(&self, token: &str, conversation: &ConversationId) -> Result<Vec<Message>>;
    async fn mark_as_read(&self, token: &str, conversation: &ConversationId) -> Result<()>;
}

/// `reqwest` implementation of [`ChatApi`].
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self::with_client(client, &config.api_base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = check_status(request.send().await?).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let path = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    debug!("Request to {} failed with {}: {}", path, status, body_hint(&body));
    Err(ClientError::from_status(status.as_u16(), body))
}

// keep error bodies out of the logs beyond a short prefix
fn body_hint(body: &str) -> &str {
    let end = body.char_indices().nth(80).map(|(i, _)| i).unwrap_or(body.len());
    &body[..end]
}

#[async_trait]
impl ChatApi for HttpApi {
    async fn obtain_token(&self, credentials: &LoginRequest) -> Result<TokenResponse> {
        let request = self.client.post(self.endpoint("/auth/token/")).json(credentials);
        self.send_json(request).await
    }

    async fn current_user(&self, token: &str) -> Result<User> {
        let request = self.client.get(self.endpoint("/auth/user/")).bearer_auth(token);
        self.send_json(request).await
    }

    async fn register(&self, payload: &SignupRequest) -> Result<SignupResponse> {
        let request = self.client.post(self.endpoint("/auth/register/")).json(payload);
        self.send_json(request).await
    }

    async fn list_conversations(&self, token: &str) -> Result<Vec<Conversation>> {
        let request = self.client.get(self.endpoint("/conversations/")).bearer_auth(token);
        self.send_json(request).await
    }

    async fn create_or_get_conversation(&self, token: &str, email: &str) -> Result<Conversation> {
        let request = self
            .client
            .post(self.endpoint("/conversations/create_or_get/"))
            .bearer_auth(token)
            .json(&CreateOrGetRequest { email });
        self.send_json(request).await
    }

    async fn list_messages(&self, token: &str, conversation: &ConversationId) -> Result<Vec<Message>> {
        let request = self
            .client
            .get(self.endpoint("/messages/"))
            .query(&[("conversation", conversation.as_str())])
            .bearer_auth(token);
        self.send_json(request).await
    }

    async fn mark_as_read(&self, token: &str, conversation: &ConversationId) -> Result<()> {
        let request = self
            .client
            .post(self.endpoint("/messages/mark_as_read/"))
            .bearer_auth(token)
            .json(&MarkAsReadRequest {
                conversation_id: conversation,
            });
        check_status(request.send().await?).await?;
        Ok(())
    }
}
