//! Error type shared by every client component.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Bad credentials or a bearer token the service no longer accepts.
    #[error("authentication rejected by the service")]
    Unauthorized,

    #[error("resource not found")]
    NotFound,

    /// Any other non-success response.
    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("push channel error: {0}")]
    Channel(String),

    #[error("token store error: {0}")]
    TokenStore(String),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel(message.into())
    }

    pub fn token_store(message: impl Into<String>) -> Self {
        Self::TokenStore(message.into())
    }

    /// Maps an HTTP status that is not a success onto the error taxonomy.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound,
            _ => Self::Status {
                status,
                body: body.into(),
            },
        }
    }

    /// Text shown to the user when adding a person fails.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound => "User does not exist",
            Self::Unauthorized | Self::Status { .. } => "Failed to add person",
            _ => "An error occurred while adding the person",
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Channel(e.to_string())
    }
}
