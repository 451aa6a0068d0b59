use std::sync::Arc;

use log::{error, info, warn};

use crate::client::models::app_state::{AuthState, Credentials, View};
use crate::client::services::api::{ChatApi, LoginRequest, SignupRequest};
use crate::client::utils::session_store::TokenStore;
use crate::common::error::Result;
use crate::common::models::User;

/// Owns the authentication state of the process and the persisted bearer token.
pub struct SessionStore {
    api: Arc<dyn ChatApi>,
    tokens: Box<dyn TokenStore>,
    state: AuthState,
    persisted: bool,
}

impl SessionStore {
    pub fn new(api: Arc<dyn ChatApi>, tokens: Box<dyn TokenStore>) -> Self {
        Self {
            api,
            tokens,
            state: AuthState::Loading,
            persisted: false,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.state.credentials()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated()
    }

    pub fn landing_view(&self, requested: View) -> View {
        self.state.landing_view(requested)
    }

    /// False when the current session lives only in memory because the token store refused it.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    fn persist(&mut self, token: &str) {
        self.persisted = match self.tokens.save(token) {
            Ok(()) => true,
            Err(e) => {
                warn!("[SESSION] Could not persist session token, the session will not survive a restart: {}", e);
                false
            }
        };
    }

    /// Validates a token left over from a previous run.
    pub async fn restore(&mut self) -> &AuthState {
        let Some(token) = self.tokens.load() else {
            self.state = AuthState::Unauthenticated;
            return &self.state;
        };
        info!("[SESSION] Found saved session token (redacted), validating");
        match self.api.current_user(&token).await {
            Ok(user) => {
                info!("[SESSION] Restored session for {}", user.username);
                self.persisted = true;
                self.state = AuthState::Authenticated(Credentials { token, user });
            }
            Err(e) => {
                warn!("[SESSION] Saved session rejected: {}", e);
                self.state = AuthState::Unauthenticated;
            }
        }
        &self.state
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<User> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let token = self
            .api
            .obtain_token(&request)
            .await
            .map_err(|e| {
                error!("Login error: {}", e);
                e
            })?
            .access;
        self.persist(&token);

        let user = match self.api.current_user(&token).await {
            Ok(user) => user,
            Err(e) => {
                error!("Login error while fetching user: {}", e);
                if self.persisted {
                    if let Err(clear_err) = self.tokens.clear() {
                        warn!("Failed to drop token after aborted login: {}", clear_err);
                    }
                    self.persisted = false;
                }
                return Err(e);
            }
        };
        info!("[SESSION] Logged in as {}", user.username);
        self.state = AuthState::Authenticated(Credentials {
            token,
            user: user.clone(),
        });
        Ok(user)
    }

    /// Registers a new account and signs it in. Returns the view to move to.
    pub async fn signup(&mut self, payload: SignupRequest) -> Result<View> {
        let response = self.api.register(&payload).await.map_err(|e| {
            error!("Signup error: {}", e);
            e
        })?;
        self.persist(&response.token);
        info!("[SESSION] Registered and logged in as {}", response.user.username);
        self.state = AuthState::Authenticated(Credentials {
            token: response.token,
            user: response.user,
        });
        Ok(View::Home)
    }

    /// Forgets the token. Returns the view to move to.
    pub fn logout(&mut self) -> View {
        if let Err(e) = self.tokens.clear() {
            warn!("[SESSION] Failed to clear stored token: {}", e);
        }
        self.state = AuthState::Unauthenticated;
        self.persisted = false;
        info!("[SESSION] Logged out");
        View::Login
    }
}
