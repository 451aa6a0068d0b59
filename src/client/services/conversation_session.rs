//! Real-time view of one conversation.
//!
//! The session is bound to at most one conversation at a time. Binding a
//! conversation opens its push channel, loads history and marks messages
//! read; switching closes the old channel before anything else happens.
//!
//! Every asynchronous result (history, read marking, channel frames) comes
//! back as a [`SessionEvent`] stamped with the [`ActivationTag`] it was issued
//! for. Events whose tag no longer matches the current activation are dropped,
//! so a slow response or a late frame from a previous conversation can never
//! land in the current message list.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::client::models::app_state::Credentials;
use crate::client::services::api::ChatApi;
use crate::client::services::websocket_client::{channel_url, ChannelConnector, PushChannel};
use crate::common::error::Result;
use crate::common::models::{ConversationId, Message, OutgoingChatMessage};

/// Identifies one activation of one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationTag {
    pub conversation: ConversationId,
    pub epoch: u64,
}

#[derive(Debug)]
pub enum SessionEvent {
    Frame { tag: ActivationTag, text: String },
    ChannelClosed { tag: ActivationTag, reason: Option<String> },
    HistoryLoaded { tag: ActivationTag, result: Result<Vec<Message>> },
    MarkedRead { tag: ActivationTag, result: Result<()> },
}

impl SessionEvent {
    pub fn tag(&self) -> &ActivationTag {
        match self {
            SessionEvent::Frame { tag, .. }
            | SessionEvent::ChannelClosed { tag, .. }
            | SessionEvent::HistoryLoaded { tag, .. }
            | SessionEvent::MarkedRead { tag, .. } => tag,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            SessionEvent::Frame { .. } => "frame",
            SessionEvent::ChannelClosed { .. } => "channel close",
            SessionEvent::HistoryLoaded { .. } => "history",
            SessionEvent::MarkedRead { .. } => "read marking",
        }
    }
}

/// Where a push channel reports inbound traffic. Stamps everything with its activation.
#[derive(Debug, Clone)]
pub struct EventSink {
    tag: ActivationTag,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn tag(&self) -> &ActivationTag {
        &self.tag
    }

    /// Returns false once the session is gone.
    pub fn frame(&self, text: String) -> bool {
        self.tx
            .send(SessionEvent::Frame {
                tag: self.tag.clone(),
                text,
            })
            .is_ok()
    }

    pub fn closed(&self, reason: Option<String>) {
        let _ = self.tx.send(SessionEvent::ChannelClosed {
            tag: self.tag.clone(),
            reason,
        });
    }
}

/// What applying an event did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    MessageAppended(Message),
    HistoryReplaced { count: usize },
    HistoryFailed,
    MarkedRead,
    /// Read marking failed; logged only.
    MarkReadFailed,
    ChannelClosed { reason: Option<String> },
    /// Issued for an activation that is no longer current.
    Discarded,
    /// Malformed frame; logged only.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Blank after trimming; nothing written.
    Empty,
    NoConversation,
    /// Conversation selected but its channel is not open.
    ChannelUnavailable,
    /// The write itself failed. Logged, never retried.
    Dropped,
}

enum State {
    Idle,
    Active {
        tag: ActivationTag,
        channel: Option<Box<dyn PushChannel>>,
    },
}

pub struct ConversationSession {
    api: Arc<dyn ChatApi>,
    connector: Arc<dyn ChannelConnector>,
    credentials: Credentials,
    ws_base_url: String,
    state: State,
    messages: Vec<Message>,
    epoch: u64,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl ConversationSession {
    pub fn new(
        api: Arc<dyn ChatApi>,
        connector: Arc<dyn ChannelConnector>,
        credentials: Credentials,
        ws_base_url: impl Into<String>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            api,
            connector,
            credentials,
            ws_base_url: ws_base_url.into(),
            state: State::Idle,
            messages: Vec::new(),
            epoch: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn active_conversation(&self) -> Option<&ConversationId> {
        self.active_tag().map(|t| &t.conversation)
    }

    pub fn active_tag(&self) -> Option<&ActivationTag> {
        match &self.state {
            State::Active { tag, .. } => Some(tag),
            State::Idle => None,
        }
    }

    pub fn is_channel_open(&self) -> bool {
        matches!(&self.state, State::Active { channel: Some(_), .. })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Binds the session to `selection`. `None` is the "nothing selected" state.
    pub async fn select(&mut self, selection: Option<ConversationId>) {
        match selection {
            Some(id) if self.active_conversation() == Some(&id) => {
                debug!("Conversation {} already active", id);
            }
            Some(id) => {
                self.teardown().await;
                self.activate(id).await;
            }
            None => {
                self.teardown().await;
                self.messages.clear();
            }
        }
    }

    async fn activate(&mut self, id: ConversationId) {
        self.messages.clear();
        self.epoch += 1;
        let tag = ActivationTag {
            conversation: id.clone(),
            epoch: self.epoch,
        };

        let sink = EventSink {
            tag: tag.clone(),
            tx: self.events_tx.clone(),
        };
        let channel = match channel_url(&self.ws_base_url, &id, &self.credentials.token) {
            Ok(url) => match self.connector.connect(&url, sink).await {
                Ok(channel) => Some(channel),
                Err(e) => {
                    error!("Push channel for conversation {} failed to open: {}", id, e);
                    None
                }
            },
            Err(e) => {
                error!("Invalid push channel address for conversation {}: {}", id, e);
                None
            }
        };
        self.state = State::Active {
            tag: tag.clone(),
            channel,
        };

        let api = self.api.clone();
        let token = self.credentials.token.clone();
        let tx = self.events_tx.clone();
        let history_tag = tag.clone();
        tokio::spawn(async move {
            let result = api.list_messages(&token, &history_tag.conversation).await;
            let _ = tx.send(SessionEvent::HistoryLoaded {
                tag: history_tag,
                result,
            });
        });

        let api = self.api.clone();
        let token = self.credentials.token.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = api.mark_as_read(&token, &tag.conversation).await;
            let _ = tx.send(SessionEvent::MarkedRead { tag, result });
        });

        info!("Conversation {} active (activation {})", id, self.epoch);
    }

    async fn teardown(&mut self) {
        if let State::Active { tag, channel } = std::mem::replace(&mut self.state, State::Idle) {
            if let Some(mut channel) = channel {
                channel.close().await;
            }
            info!("Closed conversation {}", tag.conversation);
        }
    }

    /// Waits for the next asynchronous result and applies it.
    pub async fn next_event(&mut self) -> Option<SessionUpdate> {
        let event = self.events_rx.recv().await?;
        Some(self.apply(event))
    }

    pub fn apply(&mut self, event: SessionEvent) -> SessionUpdate {
        if self.active_tag() != Some(event.tag()) {
            debug!(
                "Discarding stale {} for conversation {} (activation {})",
                event.kind(),
                event.tag().conversation,
                event.tag().epoch
            );
            return SessionUpdate::Discarded;
        }

        match event {
            SessionEvent::Frame { text, .. } => match serde_json::from_str::<Message>(&text) {
                Ok(message) => {
                    self.messages.push(message.clone());
                    SessionUpdate::MessageAppended(message)
                }
                Err(e) => {
                    warn!("Unparseable frame on push channel: {}", e);
                    SessionUpdate::Ignored
                }
            },
            SessionEvent::HistoryLoaded { result: Ok(history), .. } => {
                let count = history.len();
                self.messages = history;
                SessionUpdate::HistoryReplaced { count }
            }
            SessionEvent::HistoryLoaded { tag, result: Err(e) } => {
                error!("Error fetching messages for conversation {}: {}", tag.conversation, e);
                SessionUpdate::HistoryFailed
            }
            SessionEvent::MarkedRead { result: Ok(()), .. } => SessionUpdate::MarkedRead,
            SessionEvent::MarkedRead { tag, result: Err(e) } => {
                error!("Error marking messages as read in {}: {}", tag.conversation, e);
                SessionUpdate::MarkReadFailed
            }
            SessionEvent::ChannelClosed { tag, reason } => {
                info!(
                    "Push channel for conversation {} closed ({})",
                    tag.conversation,
                    reason.as_deref().unwrap_or("no reason")
                );
                if let State::Active { channel, .. } = &mut self.state {
                    channel.take();
                }
                SessionUpdate::ChannelClosed { reason }
            }
        }
    }

    /// Writes a chat frame to the open channel. The message shows up in the list
    /// only when the service echoes it back.
    pub fn send(&mut self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Empty;
        }
        let State::Active { tag, channel } = &mut self.state else {
            return SendOutcome::NoConversation;
        };
        let Some(channel) = channel.as_mut() else {
            return SendOutcome::ChannelUnavailable;
        };

        let frame = OutgoingChatMessage::new(text, &self.credentials.user, &tag.conversation);
        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize outgoing message: {}", e);
                return SendOutcome::Dropped;
            }
        };
        match channel.send_text(json) {
            Ok(()) => SendOutcome::Sent,
            Err(e) => {
                warn!("Message for conversation {} not delivered: {}", tag.conversation, e);
                SendOutcome::Dropped
            }
        }
    }

    /// Closes the channel, if any, and returns to the idle state.
    pub async fn close(&mut self) {
        self.teardown().await;
        self.messages.clear();
    }
}
