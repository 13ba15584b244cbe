use thiserror::Error;

#[derive(Error, Debug)]
pub enum PeerError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Chord protocol error: {0}")]
    Chord(#[from] ChordError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Peer unreachable: {0}")]
    PeerUnreachable(String),

    #[error("Failed to bind {0}")]
    BindFailed(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ChordError {
    #[error("Node has not joined a ring yet")]
    NotJoined,

    #[error("Failed to join ring: {0}")]
    JoinFailed(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Chunk not found: {0}")]
    ChunkNotFound(String),

    #[error("Invalid replication degree {0}, expected 1..=9")]
    InvalidReplicationDegree(u32),

    #[error("File too large: {0} bytes")]
    FileTooLarge(u64),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MessageError {
    #[error("Missing header/body separator")]
    MissingSeparator,

    #[error("Header is not valid UTF-8")]
    InvalidEncoding,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("{kind} has the wrong number of header fields ({found})")]
    FieldCount { kind: String, found: usize },

    #[error("Invalid field {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Worker pool queue is full")]
    Saturated,
}
