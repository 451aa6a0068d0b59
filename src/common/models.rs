// Wire models shared by the services and the terminal front-end
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Type tag of frames written to the push channel.
pub const CHAT_MESSAGE_TYPE: &str = "chat_message";

/// Spelling of the "no conversation selected" sentinel.
pub const NO_CONVERSATION: &str = "default";

/// The service emits identifiers either as JSON strings or as numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WireId {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    Ok(match WireId::deserialize(deserializer)? {
        WireId::Text(s) => s,
        WireId::Int(n) => n.to_string(),
        WireId::Uint(n) => n.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads a user supplied selection. Blank input and the sentinel mean "nothing selected".
    pub fn parse_selection(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw == NO_CONVERSATION {
            None
        } else {
            Some(Self::new(raw))
        }
    }
}

impl<'de> Deserialize<'de> for ConversationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        string_or_number(deserializer).map(Self)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastMessage {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(default)]
    pub participants: Vec<User>,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub unread_count: u32,
}

/// Who a conversation is "with", seen from one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Counterpart<'a> {
    /// Only the current user takes part, or the participant list is empty.
    Missing,
    One(&'a User),
    /// More than one other participant, in server order.
    Many(Vec<&'a User>),
}

impl<'a> Counterpart<'a> {
    /// The participant a row is rendered for, if any.
    pub fn primary(&self) -> Option<&'a User> {
        match self {
            Counterpart::Missing => None,
            Counterpart::One(user) => Some(*user),
            Counterpart::Many(users) => users.first().copied(),
        }
    }
}

impl Conversation {
    pub fn counterpart(&self, me: &User) -> Counterpart<'_> {
        let mut others: Vec<&User> = self.participants.iter().filter(|p| p.id != me.id).collect();
        match others.len() {
            0 => Counterpart::Missing,
            1 => Counterpart::One(others.remove(0)),
            _ => Counterpart::Many(others),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub content: String,
    pub sender: User,
    pub timestamp: DateTime<Utc>,
}

/// Frame written to the push channel when the user sends a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutgoingChatMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub message: String,
    pub sender_id: String,
    pub sender_username: String,
    pub conversation_id: ConversationId,
}

impl OutgoingChatMessage {
    pub fn new(message: &str, sender: &User, conversation_id: &ConversationId) -> Self {
        Self {
            message_type: CHAT_MESSAGE_TYPE.to_string(),
            message: message.to_string(),
            sender_id: sender.id.clone(),
            sender_username: sender.username.clone(),
            conversation_id: conversation_id.clone(),
        }
    }
}

/// Formats a timestamp as a 12-hour clock ("3:07 PM") in local time.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    format_timestamp_in(timestamp, &Local)
}

pub fn format_timestamp_in<Tz: TimeZone>(timestamp: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    timestamp.with_timezone(tz).format("%-I:%M %p").to_string()
}
