use std::sync::Arc;

use log::{error, info, warn};
use tokio::io::{stdin, AsyncBufReadExt, BufReader};

use crate::client::config::ClientConfig;
use crate::client::models::app_state::{AuthState, Credentials, View};
use crate::client::models::commands::{Command, OpenTarget, HELP};
use crate::client::services::api::{ChatApi, HttpApi, SignupRequest};
use crate::client::services::auth_service::SessionStore;
use crate::client::services::conversation_session::{ConversationSession, SendOutcome, SessionUpdate};
use crate::client::services::directory::{ConversationDirectory, DirectoryEntry};
use crate::client::services::person_picker::{PersonPicker, CONVERSATION_CREATED};
use crate::client::services::websocket_client::{ChannelConnector, TungsteniteConnector};
use crate::client::utils::session_store::{self, TokenStore};
use crate::common::error::ClientError;
use crate::common::models::{format_timestamp, ConversationId, Message, User};

/// Components that only exist while someone is signed in.
struct Home {
    directory: ConversationDirectory,
    picker: PersonPicker,
    conversation: ConversationSession,
}

pub struct App {
    api: Arc<dyn ChatApi>,
    connector: Arc<dyn ChannelConnector>,
    ws_base_url: String,
    session: SessionStore,
    view: View,
    home: Option<Home>,
}

impl App {
    pub fn new(
        api: Arc<dyn ChatApi>,
        connector: Arc<dyn ChannelConnector>,
        tokens: Box<dyn TokenStore>,
        ws_base_url: impl Into<String>,
    ) -> Self {
        Self {
            session: SessionStore::new(api.clone(), tokens),
            api,
            connector,
            ws_base_url: ws_base_url.into(),
            view: View::default(),
            home: None,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn conversation(&self) -> Option<&ConversationSession> {
        self.home.as_ref().map(|h| &h.conversation)
    }

    /// Resolves the startup view from a saved token.
    pub async fn start(&mut self) {
        let restored = matches!(self.session.restore().await, AuthState::Authenticated(_));
        self.view = self.session.landing_view(View::Home);
        if restored {
            if let Some(user) = self.session.credentials().map(|c| c.user.username.clone()) {
                println!("[CLIENT] Welcome back, {}", user);
            }
            self.mount_home().await;
        } else {
            println!("[CLIENT] Log in with /login <username> <password> or create an account with /signup");
        }
    }

    /// Handles one input line. Returns false when the user asked to quit.
    pub async fn handle_line(&mut self, line: &str) -> bool {
        let Some(command) = Command::parse(line) else {
            return true;
        };
        if command.needs_login() && !self.session.is_authenticated() {
            println!("[CLIENT] You need to log in first (/login <username> <password>)");
            return true;
        }

        match command {
            Command::Login { username, password } => self.login(&username, &password).await,
            Command::Signup {
                username,
                email,
                password,
                password2,
            } => {
                self.signup(SignupRequest {
                    username,
                    email,
                    password,
                    password2,
                })
                .await
            }
            Command::Logout => self.logout().await,
            Command::Chats => self.reload_directory().await,
            Command::Open(target) => self.open(target).await,
            Command::Add { email } => self.add_person(&email).await,
            Command::Say(text) => self.say(&text),
            Command::Help => println!("{}", HELP),
            Command::Usage(usage) => println!("[CLIENT] Usage: {}", usage),
            Command::Unknown(other) => println!("[CLIENT] Unknown command {} (try /help)", other),
            Command::Quit => {
                self.shutdown().await;
                return false;
            }
        }
        true
    }

    async fn login(&mut self, username: &str, password: &str) {
        if let Some(user) = self.session.credentials().map(|c| c.user.username.clone()) {
            println!("[CLIENT] Already logged in as {} (use /logout first)", user);
            return;
        }
        match self.session.login(username, password).await {
            Ok(user) => {
                println!("[CLIENT] Logged in as {}", user.username);
                self.warn_if_not_persisted();
                self.view = self.session.landing_view(View::Home);
                self.mount_home().await;
            }
            Err(ClientError::Unauthorized) => {
                println!("[CLIENT] Login failed, check your username and password")
            }
            Err(e) => println!("[CLIENT] Login failed: {}", e),
        }
    }

    async fn signup(&mut self, request: SignupRequest) {
        if self.session.is_authenticated() {
            println!("[CLIENT] Log out before creating another account");
            return;
        }
        match self.session.signup(request).await {
            Ok(view) => {
                if let Some(user) = self.session.credentials().map(|c| c.user.username.clone()) {
                    println!("[CLIENT] Account created, logged in as {}", user);
                }
                self.warn_if_not_persisted();
                self.view = view;
                self.mount_home().await;
            }
            Err(e) => println!("[CLIENT] Signup failed: {}", e),
        }
    }

    fn warn_if_not_persisted(&self) {
        if !self.session.is_persisted() {
            println!("[CLIENT] Could not save the session, you will have to log in again next time");
        }
    }

    async fn logout(&mut self) {
        if let Some(mut home) = self.home.take() {
            home.conversation.close().await;
        }
        self.view = self.session.logout();
        println!("[CLIENT] Logged out");
    }

    async fn shutdown(&mut self) {
        if let Some(home) = self.home.as_mut() {
            home.conversation.close().await;
        }
        info!("[CLIENT] Bye");
    }

    /// Builds the signed-in components and loads the conversation list.
    async fn mount_home(&mut self) {
        let Some(credentials) = self.session.credentials().cloned() else {
            warn!("[CLIENT] Home requested without credentials");
            return;
        };
        self.home = Some(self.build_home(credentials));
        self.reload_directory().await;
    }

    fn build_home(&self, credentials: Credentials) -> Home {
        Home {
            directory: ConversationDirectory::new(self.api.clone(), credentials.clone()),
            picker: PersonPicker::new(self.api.clone(), credentials.clone()),
            conversation: ConversationSession::new(
                self.api.clone(),
                self.connector.clone(),
                credentials,
                self.ws_base_url.clone(),
            ),
        }
    }

    async fn reload_directory(&mut self) {
        let Some(home) = self.home.as_mut() else { return };
        if let Err(e) = home.directory.load().await {
            error!("Error fetching chats: {}", e);
            println!("[CLIENT] Could not refresh the chat list");
        }
        print_directory(&home.directory.entries(), home.directory.selected());
    }

    async fn open(&mut self, target: OpenTarget) {
        let Some(home) = self.home.as_mut() else { return };
        let id = match target {
            OpenTarget::Nothing => {
                home.directory.clear_selection();
                home.conversation.select(None).await;
                println!("[CLIENT] Select a chat to start messaging");
                return;
            }
            OpenTarget::Id(id) => id,
            OpenTarget::Row(row) => match home.directory.entry_at(row) {
                Some(entry) => entry.id,
                None => {
                    println!("[CLIENT] No chat at row {} (see /chats)", row);
                    return;
                }
            },
        };

        let id = home.directory.select(id);
        let reopening = home.conversation.active_conversation() == Some(&id);
        if reopening && !home.conversation.is_channel_open() {
            // same id is a no-op for the session, so leave first to force a new channel
            home.conversation.select(None).await;
        }
        home.conversation.select(Some(id.clone())).await;
        println!("[CLIENT] Chat with {}", chat_title(&home.directory.entries(), &id));
        if !home.conversation.is_channel_open() {
            println!("[CLIENT] Live updates are unavailable for this chat");
        }
    }

    async fn add_person(&mut self, email: &str) {
        let Some(home) = self.home.as_mut() else { return };
        match home.picker.add_person(email).await {
            Ok(conversation) => {
                home.directory.append(conversation);
                println!("[CLIENT] {}", CONVERSATION_CREATED);
                print_directory(&home.directory.entries(), home.directory.selected());
            }
            Err(e) => println!("[CLIENT] {}", e.user_message()),
        }
    }

    fn say(&mut self, text: &str) {
        let Some(home) = self.home.as_mut() else { return };
        match home.conversation.send(text) {
            SendOutcome::Sent | SendOutcome::Empty | SendOutcome::Dropped => {}
            SendOutcome::NoConversation => println!("[CLIENT] Select a chat to start messaging"),
            SendOutcome::ChannelUnavailable => {
                println!("[CLIENT] Not connected to this chat, open it again to reconnect")
            }
        }
    }

    /// Waits for the open conversation to produce something. Pending forever while idle.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        match self.home.as_mut() {
            Some(home) => home.conversation.next_event().await,
            None => std::future::pending().await,
        }
    }

    pub fn render_update(&self, update: &SessionUpdate) {
        let Some(home) = self.home.as_ref() else { return };
        let me = &home.conversation.credentials().user;
        match update {
            SessionUpdate::MessageAppended(message) => println!("{}", message_line(message, me)),
            SessionUpdate::HistoryReplaced { count } => {
                println!("[CLIENT] --- {} earlier messages ---", count);
                for message in home.conversation.messages() {
                    println!("{}", message_line(message, me));
                }
            }
            SessionUpdate::HistoryFailed => println!("[CLIENT] Could not load earlier messages"),
            SessionUpdate::ChannelClosed { .. } => {
                println!("[CLIENT] Connection to this chat closed, open it again to reconnect")
            }
            SessionUpdate::MarkedRead
            | SessionUpdate::MarkReadFailed
            | SessionUpdate::Discarded
            | SessionUpdate::Ignored => {}
        }
    }
}

/// `[3:07 PM] bob: see you`. Own messages are tagged.
pub fn message_line(message: &Message, me: &User) -> String {
    let own = if message.sender.id == me.id { " (you)" } else { "" };
    format!(
        "[{}] {}{}: {}",
        format_timestamp(&message.timestamp),
        message.sender.username,
        own,
        message.content
    )
}

pub fn directory_row(row: usize, entry: &DirectoryEntry, selected: bool) -> String {
    let marker = if selected { '>' } else { ' ' };
    let when = entry
        .last_activity
        .as_ref()
        .map(format_timestamp)
        .unwrap_or_default();
    let unread = if entry.has_unread() {
        format!(" ({})", entry.unread_count)
    } else {
        String::new()
    };
    format!(
        "{}{:>3}. {}{} {} {}",
        marker,
        row,
        entry.counterpart.username,
        unread,
        when,
        entry.preview_text()
    )
}

fn print_directory(entries: &[DirectoryEntry], selected: Option<&ConversationId>) {
    if entries.is_empty() {
        println!("[CLIENT] No chats yet, start one with /add <email>");
        return;
    }
    for (i, entry) in entries.iter().enumerate() {
        println!("{}", directory_row(i + 1, entry, selected == Some(&entry.id)));
    }
}

fn chat_title(entries: &[DirectoryEntry], id: &ConversationId) -> String {
    entries
        .iter()
        .find(|e| &e.id == id)
        .map(|e| e.counterpart.username.clone())
        .unwrap_or_else(|| format!("conversation {}", id))
}

enum Input {
    Line(std::io::Result<Option<String>>),
    Session(SessionUpdate),
}

/// Runs the interactive client until `/quit` or end of input.
pub async fn run(config: ClientConfig) -> anyhow::Result<()> {
    config.log_summary();
    let api: Arc<dyn ChatApi> = Arc::new(HttpApi::new(&config)?);
    let connector: Arc<dyn ChannelConnector> = Arc::new(TungsteniteConnector);
    let tokens = session_store::from_config(&config);
    let mut app = App::new(api, connector, tokens, config.ws_base_url.clone());

    println!("[CLIENT] Welcome! Type /help for the list of commands.");
    app.start().await;

    let mut lines = BufReader::new(stdin()).lines();
    loop {
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line),
            Some(update) = app.next_update() => Input::Session(update),
        };
        match input {
            Input::Line(Ok(Some(line))) => {
                if !app.handle_line(&line).await {
                    break;
                }
            }
            Input::Line(Ok(None)) => {
                app.shutdown().await;
                break;
            }
            Input::Line(Err(e)) => {
                app.shutdown().await;
                return Err(e.into());
            }
            Input::Session(update) => app.render_update(&update),
        }
    }
    Ok(())
}
