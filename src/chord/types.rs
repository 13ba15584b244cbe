use crate::chord::key::{generate_key, Key};
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;

/// NodeInfo identifies a ring member by its position and where to reach it.
///
/// Two descriptors are equal only if both the id and the address match.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeInfo {
    pub id: Key,
    pub address: SocketAddr,
}

impl NodeInfo {
    pub fn new(id: Key, address: SocketAddr) -> Self {
        Self { id, address }
    }

    /// Derives the ring position from the textual `host:port` form of the address
    pub fn from_address(address: SocketAddr) -> Self {
        let input = format!("{}:{}", address.ip(), address.port());
        Self::new(generate_key(input.as_bytes()), address)
    }
}

impl fmt::Debug for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeInfo({} @ {})", self.id, self.address)
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

/// Local ring-membership procedure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RingState {
    /// Not part of any ring yet: neither created nor joined.
    Detached,
    /// Creating a new ring: self-pointing fingers, no predecessor.
    Forming,
    /// Waiting for the contact peer to resolve our successor.
    Joining,
    /// Periodic stabilize/notify cycle is running.
    Stable,
}

impl fmt::Display for RingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RingState::Detached => "detached",
            RingState::Forming => "forming",
            RingState::Joining => "joining",
            RingState::Stable => "stable",
        };
        f.write_str(name)
    }
}
