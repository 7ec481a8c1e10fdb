//! WebSocket transport.
//!
//! [`Transport`] dials, [`Connection`] is one live socket. The supervisor
//! only sees these traits, so tests can script connections without a server.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::errors::{GatewayError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens connections to the gateway.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dial `url`.
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>>;
}

/// One live duplex socket.
#[async_trait]
pub trait Connection: Send {
    /// Send one text frame.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Next text frame. `None` once the peer closed the socket.
    async fn receive(&mut self) -> Option<Result<String>>;

    /// Close the socket. Closing twice is not an error.
    async fn close(&mut self) -> Result<()>;
}

/// [`Transport`] over `tokio-tungstenite`, with TLS for `wss://`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TungsteniteTransport;

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn connect(&self, url: &str) -> Result<Box<dyn Connection>> {
        let (ws, response) = connect_async(url)
            .await
            .map_err(|e| GatewayError::Connect {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        debug!(url, status = %response.status(), "websocket handshake complete");
        Ok(Box::new(TungsteniteConnection { ws, closed: false }))
    }
}

/// [`Connection`] over a `tokio-tungstenite` stream.
pub struct TungsteniteConnection {
    ws: WsStream,
    closed: bool,
}

#[async_trait]
impl Connection for TungsteniteConnection {
    async fn send(&mut self, text: String) -> Result<()> {
        if self.closed {
            return Err(GatewayError::Closed);
        }
        self.ws
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))
    }

    async fn receive(&mut self) -> Option<Result<String>> {
        if self.closed {
            return None;
        }
        while let Some(frame) = self.ws.next().await {
            match frame {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => {
                    return Some(
                        String::from_utf8(bytes.to_vec())
                            .map_err(|e| GatewayError::Transport(format!("non-UTF-8 binary frame: {e}"))),
                    );
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "peer closed websocket");
                    self.closed = true;
                    return None;
                }
                // tungstenite answers pings itself
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {
                    trace!("control frame");
                }
                Err(e) => {
                    self.closed = true;
                    return Some(Err(GatewayError::Transport(e.to_string())));
                }
            }
        }
        self.closed = true;
        None
    }

    async fn close(&mut self) -> Result<()> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        match self.ws.close(None).await {
            Ok(()) | Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(GatewayError::Transport(e.to_string())),
        }
    }
}

impl std::fmt::Debug for TungsteniteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TungsteniteConnection")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
