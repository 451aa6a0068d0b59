use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::client::models::app_state::Credentials;
use crate::client::services::api::ChatApi;
use crate::common::error::Result;
use crate::common::models::{Conversation, ConversationId, Counterpart, User};

/// One rendered row of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub id: ConversationId,
    pub counterpart: User,
    pub preview: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
    pub unread_count: u32,
}

impl DirectoryEntry {
    pub fn preview_text(&self) -> &str {
        self.preview.as_deref().unwrap_or("No messages yet")
    }

    pub fn has_unread(&self) -> bool {
        self.unread_count > 0
    }
}

/// Conversations of the signed-in user, in the order the service returned them.
pub struct ConversationDirectory {
    api: Arc<dyn ChatApi>,
    credentials: Credentials,
    conversations: Vec<Conversation>,
    selected: Option<ConversationId>,
}

impl ConversationDirectory {
    pub fn new(api: Arc<dyn ChatApi>, credentials: Credentials) -> Self {
        Self {
            api,
            credentials,
            conversations: Vec::new(),
            selected: None,
        }
    }

    /// Fetches the list. On failure the current list is kept.
    pub async fn load(&mut self) -> Result<usize> {
        let conversations = self.api.list_conversations(&self.credentials.token).await?;
        info!("Loaded {} conversations", conversations.len());
        self.conversations = conversations;
        Ok(self.conversations.len())
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Rows to show. Conversations without another participant are left out.
    pub fn entries(&self) -> Vec<DirectoryEntry> {
        let me = &self.credentials.user;
        self.conversations
            .iter()
            .filter_map(|conversation| {
                let resolved = conversation.counterpart(me);
                if let Counterpart::Many(others) = &resolved {
                    debug!(
                        "Conversation {} has {} other participants, showing the first",
                        conversation.id,
                        others.len()
                    );
                }
                let counterpart = resolved.primary()?;
                Some(DirectoryEntry {
                    id: conversation.id.clone(),
                    counterpart: counterpart.clone(),
                    preview: conversation.last_message.as_ref().map(|m| m.content.clone()),
                    last_activity: conversation.last_message.as_ref().map(|m| m.timestamp),
                    unread_count: conversation.unread_count,
                })
            })
            .collect()
    }

    /// Marks `id` as the highlighted row and hands it back to the caller.
    pub fn select(&mut self, id: ConversationId) -> ConversationId {
        self.selected = Some(id.clone());
        id
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&ConversationId> {
        self.selected.as_ref()
    }

    /// Resolves a 1-based row number as printed by [`entries`](Self::entries).
    pub fn entry_at(&self, row: usize) -> Option<DirectoryEntry> {
        row.checked_sub(1).and_then(|i| self.entries().into_iter().nth(i))
    }

    /// Adds a conversation created through the person picker. No re-fetch.
    pub fn append(&mut self, conversation: Conversation) {
        self.conversations.push(conversation);
    }
}
