use crate::error::NetworkError;
use crate::network::node::ChordPeer;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

pub async fn bind(address: SocketAddr) -> Result<TcpListener, NetworkError> {
    TcpListener::bind(address)
        .await
        .map_err(|e| NetworkError::BindFailed(format!("{}: {}", address, e)))
}

/// Accepts one message per connection and hands it to the peer on the worker pool.
pub async fn serve(listener: TcpListener, peer: Arc<ChordPeer>) {
    match listener.local_addr() {
        Ok(addr) => info!("Listening for peers on {}", addr),
        Err(e) => warn!("Listening on unknown address: {}", e),
    }

    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let handler = peer.clone();
        peer.pool().submit("inbound message", async move {
            let config = handler.config();
            match read_message(stream, config.max_message_size, config.read_timeout).await {
                Ok(bytes) => handler.dispatch(&bytes).await,
                Err(e) => debug!("Dropping message from {}: {}", remote, e),
            }
        });
    }
}

/// Reads until the sender closes its half. Gives up after `limit` so an idle client
/// cannot hold a worker forever.
async fn read_message(
    stream: TcpStream,
    max: usize,
    limit: Duration,
) -> Result<Vec<u8>, NetworkError> {
    let mut bytes = Vec::new();
    timeout(limit, stream.take(max as u64 + 1).read_to_end(&mut bytes))
        .await
        .map_err(|_| NetworkError::Timeout(format!("no complete message within {:?}", limit)))??;
    if bytes.len() > max {
        return Err(NetworkError::ConnectionFailed(format!(
            "message larger than {} bytes",
            max
        )));
    }
    Ok(bytes)
}
