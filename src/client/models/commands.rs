use crate::common::models::{ConversationId, NO_CONVERSATION};

pub const HELP: &str = "\
Commands:
  /login <username> <password>
  /signup <username> <email> <password> [<password again>]
  /logout
  /chats                 reload the conversation list
  /open <n>              open row n of the list
  /open @<id>            open a conversation by identifier
  /open default, /close  leave the current conversation
  /add <email>           start a conversation with someone
  /help
  /quit
Anything else is sent to the open conversation.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenTarget {
    Row(usize),
    Id(ConversationId),
    Nothing,
}

/// One line of user input, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { username: String, password: String },
    Signup { username: String, email: String, password: String, password2: Option<String> },
    Logout,
    Chats,
    Open(OpenTarget),
    Add { email: String },
    Help,
    Quit,
    /// Text for the open conversation, exactly as typed.
    Say(String),
    /// Recognised command with wrong arguments; carries the usage line.
    Usage(&'static str),
    Unknown(String),
}

impl Command {
    /// Returns `None` for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }
        if !line.trim_start().starts_with('/') {
            return Some(Command::Say(line.to_string()));
        }

        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or("");
        let args: Vec<&str> = parts.collect();

        let parsed = match (command, args.as_slice()) {
            ("/login", [username, password]) => Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            },
            ("/login", _) => Command::Usage("/login <username> <password>"),
            ("/signup", [username, email, password]) => Command::Signup {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                password2: None,
            },
            ("/signup", [username, email, password, password2]) => Command::Signup {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                password2: Some(password2.to_string()),
            },
            ("/signup", _) => Command::Usage("/signup <username> <email> <password> [<password again>]"),
            ("/logout", []) => Command::Logout,
            ("/chats", []) => Command::Chats,
            ("/close", []) => Command::Open(OpenTarget::Nothing),
            ("/open", [target]) => match Self::open_target(target) {
                Some(target) => Command::Open(target),
                None => Command::Usage("/open <n> | /open @<id> | /open default"),
            },
            ("/open", _) => Command::Usage("/open <n> | /open @<id> | /open default"),
            ("/add", [email]) => Command::Add {
                email: email.to_string(),
            },
            ("/add", _) => Command::Usage("/add <email>"),
            ("/help", _) => Command::Help,
            ("/quit", _) => Command::Quit,
            (other, _) => Command::Unknown(other.to_string()),
        };
        Some(parsed)
    }

    fn open_target(raw: &str) -> Option<OpenTarget> {
        if raw == NO_CONVERSATION {
            return Some(OpenTarget::Nothing);
        }
        if let Some(id) = raw.strip_prefix('@') {
            return ConversationId::parse_selection(id).map(OpenTarget::Id);
        }
        raw.parse().ok().map(OpenTarget::Row)
    }

    pub fn needs_login(&self) -> bool {
        matches!(
            self,
            Command::Logout | Command::Chats | Command::Open(_) | Command::Add { .. } | Command::Say(_)
        )
    }
}
