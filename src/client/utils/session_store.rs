use std::path::{Path, PathBuf};
use std::sync::Mutex;

use keyring::Entry;
use log::warn;

use crate::client::config::{ClientConfig, TokenStoreKind};
use crate::common::error::{ClientError, Result};

const SERVICE: &str = "palaver";
const USER: &str = "session_token";

/// Persistent home of the bearer token. One token per process, under a fixed key.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Builds the store selected by configuration.
pub fn from_config(config: &ClientConfig) -> Box<dyn TokenStore> {
    match config.token_store {
        TokenStoreKind::Keyring => {
            let fallback = config.keyring_fallback.then(|| config.token_file.clone());
            Box::new(KeyringTokenStore::new(fallback))
        }
        TokenStoreKind::File => Box::new(FileTokenStore::new(config.token_file.clone())),
        TokenStoreKind::Memory => Box::new(MemoryTokenStore::default()),
    }
}

/// OS keyring. When a fallback path is configured, a keyring failure writes the file instead.
pub struct KeyringTokenStore {
    fallback: Option<FileTokenStore>,
}

impl KeyringTokenStore {
    pub fn new(fallback: Option<PathBuf>) -> Self {
        Self {
            fallback: fallback.map(FileTokenStore::new),
        }
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Option<String> {
        let entry = Entry::new(SERVICE, USER);
        match entry.get_password() {
            Ok(t) => non_blank(&t),
            Err(_e) => self.fallback.as_ref().and_then(|f| f.load()),
        }
    }

    fn save(&self, token: &str) -> Result<()> {
        let entry = Entry::new(SERVICE, USER);
        match entry.set_password(token) {
            Ok(()) => Ok(()),
            Err(e) => match &self.fallback {
                Some(file) => {
                    // never log the token itself
                    warn!("Keyring unavailable ({}), persisting token to fallback file", e);
                    file.save(token)
                }
                None => Err(ClientError::token_store("keyring unavailable and file fallback disabled")),
            },
        }
    }

    fn clear(&self) -> Result<()> {
        let entry = Entry::new(SERVICE, USER);
        let _ = entry.delete_password();
        if let Some(file) = &self.fallback {
            file.clear()?;
        }
        Ok(())
    }
}

pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<String> {
        std::fs::read_to_string(&self.path).ok().and_then(|s| non_blank(&s))
    }

    fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ClientError::token_store(e.to_string()))?;
            }
        }
        std::fs::write(&self.path, token).map_err(|e| ClientError::token_store(e.to_string()))
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::token_store(e.to_string())),
        }
    }
}

#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    fn save(&self, token: &str) -> Result<()> {
        let mut guard = self
            .token
            .lock()
            .map_err(|_| ClientError::token_store("token lock poisoned"))?;
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .token
            .lock()
            .map_err(|_| ClientError::token_store("token lock poisoned"))?;
        *guard = None;
        Ok(())
    }
}

fn non_blank(raw: &str) -> Option<String> {
    let t = raw.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}
