use crate::config::PeerConfig;
use crate::error::NetworkError;
use crate::network::messages::{Message, MessageBody};
use crate::network::pool::WorkerPool;
use async_trait::async_trait;
use log::{debug, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Point-to-point delivery of one encoded message. No delivery confirmation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, to: SocketAddr, bytes: Vec<u8>) -> Result<(), NetworkError>;
}

/// One connection per message: connect, write, close.
#[derive(Clone, Debug)]
pub struct TcpTransport {
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, to: SocketAddr, bytes: Vec<u8>) -> Result<(), NetworkError> {
        let mut stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(to))
            .await
            .map_err(|_| NetworkError::PeerUnreachable(format!("{} (connect timed out)", to)))?
            .map_err(|e| NetworkError::ConnectionFailed(format!("{}: {}", to, e)))?;

        stream.write_all(&bytes).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

/// Encodes messages with this peer's identity and sends them on the worker pool.
#[derive(Clone)]
pub struct Outbox {
    version: String,
    peer_id: u32,
    transport: Arc<dyn Transport>,
    pool: WorkerPool,
}

impl Outbox {
    pub fn new(config: &PeerConfig, transport: Arc<dyn Transport>, pool: WorkerPool) -> Self {
        Self {
            version: config.version.clone(),
            peer_id: config.peer_id,
            transport,
            pool,
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn message(&self, body: MessageBody) -> Message {
        Message::new(self.version.clone(), self.peer_id, body)
    }

    /// Fire-and-forget: failures are logged and the message is dropped.
    pub fn send(&self, to: SocketAddr, body: MessageBody) {
        let message = self.message(body);
        let transport = self.transport.clone();
        let what = format!("{} to {}", message.body.kind(), to);

        self.pool.submit(&what.clone(), async move {
            match transport.send(to, message.encode()).await {
                Ok(()) => debug!("Sent {}", what),
                Err(e) => warn!("Failed to send {}: {}", what, e),
            }
        });
    }
}
