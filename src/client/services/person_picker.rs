use std::sync::Arc;

use log::{error, info};

use crate::client::models::app_state::Credentials;
use crate::client::services::api::ChatApi;
use crate::common::error::ClientError;
use crate::common::models::Conversation;

pub const CONVERSATION_CREATED: &str = "New conversation created";

/// Why adding a person did not produce a conversation.
#[derive(Debug)]
pub enum PickerError {
    /// Input was blank; nothing was sent.
    EmptyEmail,
    Remote(ClientError),
}

impl PickerError {
    pub fn user_message(&self) -> &'static str {
        match self {
            PickerError::EmptyEmail => "Enter an email address",
            PickerError::Remote(e) => e.user_message(),
        }
    }
}

/// Starts (or finds) a one-to-one conversation by the other person's email.
pub struct PersonPicker {
    api: Arc<dyn ChatApi>,
    credentials: Credentials,
}

impl PersonPicker {
    pub fn new(api: Arc<dyn ChatApi>, credentials: Credentials) -> Self {
        Self { api, credentials }
    }

    pub async fn add_person(&self, email: &str) -> Result<Conversation, PickerError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(PickerError::EmptyEmail);
        }
        match self
            .api
            .create_or_get_conversation(&self.credentials.token, email)
            .await
        {
            Ok(conversation) => {
                info!("Conversation {} ready", conversation.id);
                Ok(conversation)
            }
            Err(e) => {
                error!("Error adding person: {}", e);
                Err(PickerError::Remote(e))
            }
        }
    }
}
