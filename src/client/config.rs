use std::env;
use std::path::PathBuf;
use std::time::Duration;

use log::info;
use url::Url;

use crate::common::error::{ClientError, Result};

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_WS_BASE_URL: &str = "ws://127.0.0.1:8000/ws";
pub const DEFAULT_TOKEN_FILE: &str = "data/session_token.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TokenStoreKind {
    /// OS keyring, optionally falling back to `TOKEN_FILE`
    Keyring,
    File,
    /// Nothing survives the process; useful for throwaway sessions
    Memory,
}

impl TokenStoreKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "keyring" => Some(Self::Keyring),
            "file" => Some(Self::File),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub ws_base_url: String,
    pub token_store: TokenStoreKind,
    pub token_file: PathBuf,
    pub keyring_fallback: bool,
    pub http_timeout: Duration,
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ws_base_url: DEFAULT_WS_BASE_URL.to_string(),
            token_store: TokenStoreKind::Keyring,
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            keyring_fallback: false,
            http_timeout: Duration::from_secs(15),
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            api_base_url: env::var("API_BASE_URL").unwrap_or(defaults.api_base_url),
            ws_base_url: env::var("WS_BASE_URL").unwrap_or(defaults.ws_base_url),
            token_store: env::var("TOKEN_STORE")
                .ok()
                .and_then(|v| TokenStoreKind::parse(&v))
                .unwrap_or(defaults.token_store),
            token_file: env::var("TOKEN_FILE").map(PathBuf::from).unwrap_or(defaults.token_file),
            keyring_fallback: env::var("KEYRING_FALLBACK").map(|v| v == "true" || v == "1").unwrap_or(false),
            http_timeout: env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    /// Checks that both base URLs parse and use a scheme the transports understand.
    pub fn validate(&self) -> Result<()> {
        let api = Url::parse(&self.api_base_url)?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "API_BASE_URL must be http(s), got {}",
                api.scheme()
            )));
        }
        let ws = Url::parse(&self.ws_base_url)?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            return Err(ClientError::Config(format!(
                "WS_BASE_URL must be ws(s), got {}",
                ws.scheme()
            )));
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        info!("Client configuration loaded:");
        info!("  API base: {}", self.api_base_url);
        info!("  Push channel base: {}", self.ws_base_url);
        info!("  Token store: {:?}", self.token_store);
    }
}
