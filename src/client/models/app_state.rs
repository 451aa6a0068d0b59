use crate::common::models::User;

/// Screens the front-end can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Login,
    Signup,
    Home,
}

/// Bearer token plus the user it belongs to. Handed to every component that talks to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Stored token not validated yet.
    #[default]
    Loading,
    Unauthenticated,
    Authenticated(Credentials),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            AuthState::Authenticated(c) => Some(c),
            _ => None,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.credentials().map(|c| &c.user)
    }

    /// Where a request for `requested` actually lands.
    pub fn landing_view(&self, requested: View) -> View {
        match (self.is_authenticated(), requested) {
            (true, View::Login | View::Signup) => View::Home,
            (false, View::Home) => View::Login,
            (_, view) => view,
        }
    }
}
