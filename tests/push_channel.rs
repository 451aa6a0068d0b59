use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message as WsMessage;

use palaver::client::models::app_state::Credentials;
use palaver::client::services::api::{ChatApi, LoginRequest, SignupRequest, SignupResponse, TokenResponse};
use palaver::client::services::conversation_session::{ConversationSession, SendOutcome, SessionUpdate};
use palaver::client::services::websocket_client::TungsteniteConnector;
use palaver::common::error::{ClientError, Result};
use palaver::common::models::{Conversation, ConversationId, Message, User};

/// Service with no history; only the push channel matters here.
struct QuietApi;

#[async_trait]
impl ChatApi for QuietApi {
    async fn obtain_token(&self, _: &LoginRequest) -> Result<TokenResponse> {
        Err(ClientError::Unauthorized)
    }
    async fn current_user(&self, _: &str) -> Result<User> {
        Err(ClientError::Unauthorized)
    }
    async fn register(&self, _: &SignupRequest) -> Result<SignupResponse> {
        Err(ClientError::Unauthorized)
    }
    async fn list_conversations(&self, _: &str) -> Result<Vec<Conversation>> {
        Ok(Vec::new())
    }
    async fn create_or_get_conversation(&self, _: &str, _: &str) -> Result<Conversation> {
        Err(ClientError::NotFound)
    }
    async fn list_messages(&self, _: &str, _: &ConversationId) -> Result<Vec<Message>> {
        Ok(Vec::new())
    }
    async fn mark_as_read(&self, _: &str, _: &ConversationId) -> Result<()> {
        Ok(())
    }
}

fn alice() -> Credentials {
    Credentials {
        token: "T".to_string(),
        user: User {
            id: "1".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
        },
    }
}

/// Server side of one accepted connection, as seen by the test.
struct Peer {
    uri: String,
    from_client: mpsc::UnboundedReceiver<WsMessage>,
    to_client: mpsc::UnboundedSender<WsMessage>,
}

async fn serve_once() -> (String, tokio::task::JoinHandle<Peer>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (uri_tx, uri_rx) = std::sync::mpsc::channel();
        let ws = tokio_tungstenite::accept_hdr_async(stream, move |req: &Request, resp: Response| -> std::result::Result<Response, ErrorResponse> {
            let _ = uri_tx.send(req.uri().to_string());
            Ok(resp)
        })
        .await
        .unwrap();
        let uri = uri_rx.recv().unwrap();

        let (mut sink, mut stream) = ws.split();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WsMessage>();
        tokio::spawn(async move {
            while let Some(Ok(frame)) = stream.next().await {
                if in_tx.send(frame).is_err() {
                    break;
                }
            }
        });
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if sink.send(frame).await.is_err() {
                    break;
                }
            }
        });
        Peer {
            uri,
            from_client: in_rx,
            to_client: out_tx,
        }
    });
    (format!("ws://{}/ws", addr), handle)
}

async fn next_message(session: &mut ConversationSession) -> Message {
    loop {
        let update = timeout(Duration::from_secs(5), session.next_event())
            .await
            .expect("session event")
            .expect("event channel open");
        if let SessionUpdate::MessageAppended(message) = update {
            return message;
        }
    }
}

#[tokio::test]
async fn frames_flow_both_ways() {
    let (ws_base, server) = serve_once().await;
    let mut session = ConversationSession::new(
        Arc::new(QuietApi),
        Arc::new(TungsteniteConnector),
        alice(),
        ws_base,
    );

    session.select(Some(ConversationId::new("42"))).await;
    assert!(session.is_channel_open());
    let mut peer = timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
    assert_eq!(peer.uri, "/ws/chat/42/?token=T");

    let inbound = json!({
        "id": 9,
        "content": "hi alice",
        "sender": {"id": 2, "username": "bob"},
        "timestamp": "2024-05-01T10:15:00Z"
    });
    peer.to_client.send(WsMessage::Text(inbound.to_string())).unwrap();
    let message = next_message(&mut session).await;
    assert_eq!(message.content, "hi alice");
    assert_eq!(message.sender.username, "bob");

    assert_eq!(session.send("hello bob"), SendOutcome::Sent);
    let frame = timeout(Duration::from_secs(5), peer.from_client.recv())
        .await
        .unwrap()
        .unwrap();
    let WsMessage::Text(text) = frame else {
        panic!("expected a text frame, got {frame:?}");
    };
    let sent: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(sent["type"], "chat_message");
    assert_eq!(sent["message"], "hello bob");
    assert_eq!(sent["sender_id"], "1");
    assert_eq!(sent["conversation_id"], "42");

    session.select(None).await;
    let closing = timeout(Duration::from_secs(5), peer.from_client.recv()).await.unwrap();
    assert!(matches!(closing, Some(WsMessage::Close(_)) | None));
}

#[tokio::test]
async fn server_close_is_reported_once() {
    let (ws_base, server) = serve_once().await;
    let mut session = ConversationSession::new(
        Arc::new(QuietApi),
        Arc::new(TungsteniteConnector),
        alice(),
        ws_base,
    );
    session.select(Some(ConversationId::new("7"))).await;
    let peer = timeout(Duration::from_secs(5), server).await.unwrap().unwrap();

    peer.to_client.send(WsMessage::Close(None)).unwrap();
    loop {
        let update = timeout(Duration::from_secs(5), session.next_event())
            .await
            .unwrap()
            .unwrap();
        if let SessionUpdate::ChannelClosed { .. } = update {
            break;
        }
    }
    assert!(!session.is_channel_open());
    assert_eq!(session.send("anyone?"), SendOutcome::ChannelUnavailable);
}

#[tokio::test]
async fn unreachable_server_leaves_session_without_channel() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut session = ConversationSession::new(
        Arc::new(QuietApi),
        Arc::new(TungsteniteConnector),
        alice(),
        format!("ws://{}/ws", addr),
    );
    session.select(Some(ConversationId::new("1"))).await;
    assert_eq!(session.active_conversation().map(|c| c.as_str()), Some("1"));
    assert!(!session.is_channel_open());
}
