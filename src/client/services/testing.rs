//! In-memory stand-ins for the remote service and the push channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;
use url::Url;

use crate::client::models::app_state::Credentials;
use crate::client::services::api::{ChatApi, LoginRequest, SignupRequest, SignupResponse, TokenResponse};
use crate::client::services::conversation_session::EventSink;
use crate::client::services::websocket_client::{ChannelConnector, PushChannel};
use crate::common::error::{ClientError, Result};
use crate::common::models::{Conversation, ConversationId, Message, User};

pub fn user(id: &str, name: &str) -> User {
    User {
        id: id.to_string(),
        username: name.to_string(),
        email: format!("{name}@example.com"),
    }
}

pub fn credentials(token: &str, id: &str, name: &str) -> Credentials {
    Credentials {
        token: token.to_string(),
        user: user(id, name),
    }
}

pub fn message(id: &str, content: &str, sender_id: &str, sender_name: &str) -> Message {
    Message {
        id: id.to_string(),
        content: content.to_string(),
        sender: user(sender_id, sender_name),
        timestamp: "2024-05-01T10:15:00Z".parse().expect("valid timestamp"),
    }
}

pub fn conversation(id: &str, participants: Vec<User>) -> Conversation {
    Conversation {
        id: ConversationId::new(id),
        participants,
        last_message: None,
        unread_count: 0,
    }
}

/// Failure a fake endpoint should produce.
#[derive(Debug, Clone, Copy)]
pub enum Fail {
    Status(u16),
    /// Stands in for a connection-level failure.
    Offline,
}

impl Fail {
    fn error(self) -> ClientError {
        match self {
            Fail::Status(status) => ClientError::from_status(status, "fake"),
            Fail::Offline => ClientError::channel("connection refused"),
        }
    }
}

#[derive(Default)]
pub struct FakeApi {
    /// (username, password) -> access token
    accounts: Mutex<HashMap<(String, String), String>>,
    users_by_token: Mutex<HashMap<String, User>>,
    user_fetch_failure: Mutex<Option<Fail>>,
    signup: Mutex<Option<std::result::Result<(String, User), Fail>>>,
    conversations: Mutex<Option<std::result::Result<Vec<Conversation>, Fail>>>,
    create_or_get: Mutex<HashMap<String, std::result::Result<Conversation, Fail>>>,
    history: Mutex<HashMap<String, std::result::Result<Vec<Message>, Fail>>>,
    history_holds: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    history_served: Mutex<Vec<String>>,
    mark_as_read_failure: Mutex<Option<Fail>>,
    mark_as_read_holds: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn add_account(&self, username: &str, password: &str, token: &str, user: User) {
        self.accounts
            .lock()
            .unwrap()
            .insert((username.to_string(), password.to_string()), token.to_string());
        self.users_by_token.lock().unwrap().insert(token.to_string(), user);
    }

    pub fn fail_user_fetch(&self, fail: Fail) {
        *self.user_fetch_failure.lock().unwrap() = Some(fail);
    }

    pub fn set_signup(&self, reply: std::result::Result<(String, User), Fail>) {
        *self.signup.lock().unwrap() = Some(reply);
    }

    pub fn set_conversations(&self, reply: std::result::Result<Vec<Conversation>, Fail>) {
        *self.conversations.lock().unwrap() = Some(reply);
    }

    pub fn set_create_or_get(&self, email: &str, reply: std::result::Result<Conversation, Fail>) {
        self.create_or_get.lock().unwrap().insert(email.to_string(), reply);
    }

    pub fn set_history(&self, conversation: &str, messages: Vec<Message>) {
        self.history.lock().unwrap().insert(conversation.to_string(), Ok(messages));
    }

    pub fn fail_history(&self, conversation: &str, status: u16) {
        self.history
            .lock()
            .unwrap()
            .insert(conversation.to_string(), Err(Fail::Status(status)));
    }

    /// Holds the history response for `conversation` until the returned sender fires.
    pub fn hold_history(&self, conversation: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.history_holds.lock().unwrap().insert(conversation.to_string(), rx);
        tx
    }

    pub fn fail_mark_as_read(&self, status: u16) {
        *self.mark_as_read_failure.lock().unwrap() = Some(Fail::Status(status));
    }

    /// Holds read marking for `conversation` until the returned sender fires.
    pub fn hold_mark_as_read(&self, conversation: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.mark_as_read_holds.lock().unwrap().insert(conversation.to_string(), rx);
        tx
    }

    pub fn history_served(&self, conversation: &str) -> bool {
        self.history_served.lock().unwrap().iter().any(|c| c == conversation)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls().into_iter().filter(|c| c.starts_with(prefix)).collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn obtain_token(&self, credentials: &LoginRequest) -> Result<TokenResponse> {
        self.record(format!("obtain_token:{}", credentials.username));
        let key = (credentials.username.clone(), credentials.password.clone());
        match self.accounts.lock().unwrap().get(&key) {
            Some(token) => Ok(TokenResponse {
                access: token.clone(),
                refresh: None,
            }),
            None => Err(ClientError::Unauthorized),
        }
    }

    async fn current_user(&self, token: &str) -> Result<User> {
        self.record(format!("current_user:{token}"));
        if let Some(fail) = *self.user_fetch_failure.lock().unwrap() {
            return Err(fail.error());
        }
        self.users_by_token
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or(ClientError::Unauthorized)
    }

    async fn register(&self, payload: &SignupRequest) -> Result<SignupResponse> {
        self.record(format!("register:{}", payload.username));
        match self.signup.lock().unwrap().clone() {
            Some(Ok((token, user))) => Ok(SignupResponse { token, user }),
            Some(Err(fail)) => Err(fail.error()),
            None => Err(ClientError::from_status(400, "no signup configured")),
        }
    }

    async fn list_conversations(&self, token: &str) -> Result<Vec<Conversation>> {
        self.record(format!("list_conversations:{token}"));
        match self.conversations.lock().unwrap().clone() {
            Some(reply) => reply.map_err(Fail::error),
            None => Ok(Vec::new()),
        }
    }

    async fn create_or_get_conversation(&self, token: &str, email: &str) -> Result<Conversation> {
        self.record(format!("create_or_get:{token}:{email}"));
        match self.create_or_get.lock().unwrap().get(email) {
            Some(reply) => reply.clone().map_err(Fail::error),
            None => Err(ClientError::NotFound),
        }
    }

    async fn list_messages(&self, token: &str, conversation: &ConversationId) -> Result<Vec<Message>> {
        self.record(format!("list_messages:{token}:{conversation}"));
        let hold = self.history_holds.lock().unwrap().remove(conversation.as_str());
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        self.history_served.lock().unwrap().push(conversation.to_string());
        match self.history.lock().unwrap().get(conversation.as_str()) {
            Some(reply) => reply.clone().map_err(Fail::error),
            None => Ok(Vec::new()),
        }
    }

    async fn mark_as_read(&self, token: &str, conversation: &ConversationId) -> Result<()> {
        self.record(format!("mark_as_read:{token}:{conversation}"));
        let hold = self.mark_as_read_holds.lock().unwrap().remove(conversation.as_str());
        if let Some(hold) = hold {
            let _ = hold.await;
        }
        match *self.mark_as_read_failure.lock().unwrap() {
            Some(fail) => Err(fail.error()),
            None => Ok(()),
        }
    }
}

/// Observer of one fake channel.
#[derive(Clone, Default)]
pub struct ChannelRecorder {
    writes: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
}

impl ChannelRecorder {
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

struct FakeChannel {
    recorder: ChannelRecorder,
}

#[async_trait]
impl PushChannel for FakeChannel {
    fn send_text(&mut self, text: String) -> Result<()> {
        self.recorder.writes.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&mut self) {
        self.recorder.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeConnector {
    refuse: bool,
    opened: Mutex<Vec<(String, EventSink, ChannelRecorder)>>,
}

impl FakeConnector {
    pub fn failing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.opened.lock().unwrap().iter().map(|(u, _, _)| u.clone()).collect()
    }

    /// Sink handed to the n-th opened channel; lets a test play the server side.
    pub fn sink(&self, n: usize) -> EventSink {
        self.opened.lock().unwrap()[n].1.clone()
    }

    pub fn channel(&self, n: usize) -> ChannelRecorder {
        self.opened.lock().unwrap()[n].2.clone()
    }
}

#[async_trait]
impl ChannelConnector for FakeConnector {
    async fn connect(&self, url: &Url, sink: EventSink) -> Result<Box<dyn PushChannel>> {
        if self.refuse {
            return Err(ClientError::channel("connection refused"));
        }
        let recorder = ChannelRecorder::default();
        self.opened
            .lock()
            .unwrap()
            .push((url.to_string(), sink, recorder.clone()));
        Ok(Box::new(FakeChannel { recorder }))
    }
}
