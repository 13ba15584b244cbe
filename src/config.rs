use crate::chord::SUCCESSOR_LIST_SIZE;
use std::net::SocketAddr;
use std::time::Duration;

pub const PROTOCOL_VERSION: &str = "1.0";

/// Runtime settings of one peer.
#[derive(Clone, Debug)]
pub struct PeerConfig {
    pub version: String,
    pub peer_id: u32,
    pub address: SocketAddr,
    pub successor_list_size: usize,
    pub stabilize_interval: Duration,
    pub fix_fingers_interval: Duration,
    pub successor_list_interval: Duration,
    pub report_interval: Duration,
    pub max_workers: usize,
    pub max_queued: usize,
    pub connect_timeout: Duration,
    /// Longest an inbound connection may take to deliver its message.
    pub read_timeout: Duration,
    pub max_message_size: usize,
}

impl PeerConfig {
    pub fn new(peer_id: u32, address: SocketAddr) -> Self {
        Self {
            peer_id,
            address,
            ..Self::default()
        }
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            peer_id: 0,
            address: SocketAddr::from(([127, 0, 0, 1], 0)),
            successor_list_size: SUCCESSOR_LIST_SIZE,
            stabilize_interval: Duration::from_secs(2),
            fix_fingers_interval: Duration::from_millis(500),
            successor_list_interval: Duration::from_secs(10),
            report_interval: Duration::from_secs(30),
            max_workers: 50,
            max_queued: 1024,
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(5),
            // one 64 000 byte chunk plus its header
            max_message_size: 65_536,
        }
    }
}
