use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::client::services::conversation_session::EventSink;
use crate::common::error::{ClientError, Result};
use crate::common::models::ConversationId;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Address of the push channel for one conversation: `{ws-base}/chat/{id}/?token={bearer}`.
/// The conversation id is percent-encoded as a single path segment.
pub fn channel_url(ws_base_url: &str, conversation: &ConversationId, token: &str) -> Result<Url> {
    let mut url = Url::parse(ws_base_url)?;
    url.path_segments_mut()
        .map_err(|_| ClientError::Config(format!("{} cannot carry a path", ws_base_url)))?
        .pop_if_empty()
        .push("chat")
        .push(conversation.as_str())
        .push("");
    url.set_query(None);
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}

/// Opens push channels. Inbound traffic is reported through the given sink.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self, url: &Url, sink: EventSink) -> Result<Box<dyn PushChannel>>;
}

/// Writable half of an open push channel.
#[async_trait]
pub trait PushChannel: Send {
    fn send_text(&mut self, text: String) -> Result<()>;

    /// Closes the connection and stops inbound delivery. Later calls are no-ops.
    async fn close(&mut self);
}

enum Outbound {
    Text(String),
    Close,
}

/// `tokio-tungstenite` implementation of [`ChannelConnector`].
#[derive(Debug, Default, Clone)]
pub struct TungsteniteConnector;

#[async_trait]
impl ChannelConnector for TungsteniteConnector {
    async fn connect(&self, url: &Url, sink: EventSink) -> Result<Box<dyn PushChannel>> {
        // the query carries the bearer token, keep it out of the logs
        info!("[WS:CLIENT] Connecting to {}", url.path());
        let (ws_stream, _) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url.as_str()))
            .await
            .map_err(|_| ClientError::channel("connection timed out"))??;
        info!("[WS:CLIENT] Connection established for conversation {}", sink.tag().conversation);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Outbound>();

        let writer = tokio::spawn(async move {
            while let Some(outbound) = outgoing_rx.recv().await {
                match outbound {
                    Outbound::Text(text) => {
                        if let Err(e) = ws_sender.send(Message::Text(text)).await {
                            warn!("[WS:CLIENT] Failed to send frame: {}", e);
                            break;
                        }
                    }
                    Outbound::Close => {
                        let _ = ws_sender.send(Message::Close(None)).await;
                        let _ = ws_sender.close().await;
                        break;
                    }
                }
            }
            debug!("[WS:CLIENT] Outgoing handler ended");
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = ws_receiver.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if !sink.frame(text) {
                            // session dropped
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        sink.closed(frame.map(|f| f.reason.to_string()));
                        return;
                    }
                    Ok(_) => {
                        // binary, ping, pong
                    }
                    Err(e) => {
                        warn!("[WS:CLIENT] WebSocket error: {}", e);
                        sink.closed(Some(e.to_string()));
                        return;
                    }
                }
            }
            sink.closed(None);
        });

        Ok(Box::new(WebSocketChannel {
            outgoing: Some(outgoing_tx),
            writer: Some(writer),
            reader: Some(reader),
        }))
    }
}

pub struct WebSocketChannel {
    outgoing: Option<mpsc::UnboundedSender<Outbound>>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

#[async_trait]
impl PushChannel for WebSocketChannel {
    fn send_text(&mut self, text: String) -> Result<()> {
        let sender = self
            .outgoing
            .as_ref()
            .ok_or_else(|| ClientError::channel("channel already closed"))?;
        sender
            .send(Outbound::Text(text))
            .map_err(|_| ClientError::channel("outgoing handler stopped"))
    }

    async fn close(&mut self) {
        // stop inbound delivery first so nothing trickles in while the close handshake runs
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(outgoing) = self.outgoing.take() {
            let _ = outgoing.send(Outbound::Close);
        }
        if let Some(writer) = self.writer.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, writer).await.is_err() {
                warn!("[WS:CLIENT] Close handshake did not finish in {:?}", CLOSE_TIMEOUT);
            }
        }
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}
