//! Long-lived WebSocket session to the attestation sink.

use async_trait::async_trait;
use futures::SinkExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::error::ChannelError;

#[async_trait]
pub trait PublishChannel: Send {
    /// Opens the session. Calling it while connected replaces the session.
    async fn connect(&mut self) -> Result<(), ChannelError>;

    /// Delivers one text frame.
    async fn send(&mut self, payload: &str) -> Result<(), ChannelError>;

    /// Idempotent.
    async fn close(&mut self);

    fn endpoint(&self) -> &str;
}

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WsPublishChannel {
    url: String,
    connect_timeout: Duration,
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
}

impl WsPublishChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            stream: None,
        }
    }

    /// Caps TCP connect plus the WebSocket handshake.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

#[async_trait]
impl PublishChannel for WsPublishChannel {
    async fn connect(&mut self) -> Result<(), ChannelError> {
        self.close().await;
        let handshake = connect_async(self.url.as_str());
        let (stream, _response) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| ChannelError::Connect {
                url: self.url.clone(),
                reason: format!("handshake timed out after {:?}", self.connect_timeout),
            })?
            .map_err(|e| ChannelError::Connect {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;
        info!("🔌 Connected to {}", self.url);
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, payload: &str) -> Result<(), ChannelError> {
        let stream = self.stream.as_mut().ok_or(ChannelError::NotConnected)?;
        let result = stream.send(Message::Text(payload.to_string())).await;
        if let Err(e) = result {
            // The session is unusable after a failed write
            self.stream = None;
            return Err(ChannelError::Send(e.to_string()));
        }
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                debug!("Close handshake with {} failed: {}", self.url, e);
            }
        }
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
