//! WebSocket transport
//!
//! Opens the single client connection to the realtime broker and bridges it to
//! a pair of channels:
//! - outbound [`ClientFrame`]s are serialized and written by a send loop
//! - inbound text frames are parsed into [`ServerFrame`]s by a read loop
//!
//! When a token is available the connection authenticates before the link is
//! handed out: an `auth` frame is sent and the broker must answer
//! `authenticated` within the handshake timeout.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::spawn;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use tungstenite::protocol::Message as WsMessage;
use url::Url;

use crate::transport::message::{ClientFrame, ServerFrame};
use crate::utils::error::{ClientError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An open, authenticated connection seen as two channels.
///
/// Dropping `outbound` closes the socket once queued frames are written.
pub struct Link {
    pub outbound: UnboundedSender<ClientFrame>,
    pub inbound: UnboundedReceiver<ServerFrame>,
    /// Read loop of the connection, aborted on disconnect.
    pub io_task: Option<JoinHandle<()>>,
}

/// Opens realtime connections. The manager is the only caller.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, user_id: i64, token: Option<&str>) -> Result<Link>;
}

#[derive(Debug, Clone)]
pub struct WebsocketConnector {
    url: String,
    handshake_timeout: Duration,
}

impl WebsocketConnector {
    pub fn new(url: impl Into<String>, handshake_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            handshake_timeout,
        }
    }

    /// The configured endpoint scoped to `user_id` through a query parameter.
    pub fn endpoint(&self, user_id: i64) -> Result<Url> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| ClientError::Config(format!("invalid realtime url {}: {e}", self.url)))?;
        url.query_pairs_mut()
            .append_pair("userId", &user_id.to_string());
        Ok(url)
    }

    async fn authenticate(&self, ws: &mut WsStream, token: &str) -> Result<()> {
        let auth = ClientFrame::Auth {
            token: token.to_string(),
        };
        ws.send(WsMessage::text(serde_json::to_string(&auth)?))
            .await?;

        loop {
            let next = timeout(self.handshake_timeout, ws.next())
                .await
                .map_err(|_| ClientError::Realtime("authentication timed out".to_string()))?;
            match next {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<ServerFrame>(text.as_str()) {
                        Ok(ServerFrame::Authenticated {}) => return Ok(()),
                        Ok(ServerFrame::Error { message }) => {
                            return Err(ClientError::Realtime(format!(
                                "authentication rejected: {message}"
                            )));
                        }
                        Ok(other) => debug!("ignoring frame before authentication: {other:?}"),
                        Err(e) => warn!("invalid frame during handshake: {e}"),
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    return Err(ClientError::Realtime(
                        "connection closed during authentication".to_string(),
                    ));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl Connector for WebsocketConnector {
    async fn open(&self, user_id: i64, token: Option<&str>) -> Result<Link> {
        let url = self.endpoint(user_id)?;
        let (mut ws, _response) = timeout(self.handshake_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| ClientError::Realtime(format!("connecting to {url} timed out")))??;

        if let Some(token) = token {
            self.authenticate(&mut ws, token).await?;
        }
        debug!(%url, "realtime connection open");

        let (mut ws_sender, mut ws_receiver) = ws.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<ServerFrame>();

        // manager → broker
        spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to serialize frame: {e}");
                        continue;
                    }
                };
                if let Err(e) = ws_sender.send(WsMessage::text(text)).await {
                    warn!("Failed to send realtime frame: {e}");
                    break;
                }
            }
            let _ = ws_sender.close().await;
            debug!("realtime send loop closed");
        });

        // broker → manager
        let io_task = spawn(async move {
            while let Some(message) = ws_receiver.next().await {
                match message {
                    Ok(WsMessage::Text(text)) => {
                        match serde_json::from_str::<ServerFrame>(text.as_str()) {
                            Ok(frame) => {
                                if in_tx.send(frame).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!(
                                "Invalid server frame: {e} | {}",
                                text.as_str().chars().take(100).collect::<String>()
                            ),
                        }
                    }
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("realtime read failed: {e}");
                        break;
                    }
                }
            }
            debug!("realtime read loop closed");
        });

        Ok(Link {
            outbound: out_tx,
            inbound: in_rx,
            io_task: Some(io_task),
        })
    }
}
