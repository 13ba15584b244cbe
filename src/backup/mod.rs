//! Chunk replication on top of the ring.
//!
//! Files are split into fixed-size chunks. Each chunk is hashed onto the ring and placed
//! at the peer that owns its key, which stores it and forwards it along the successor
//! chain until the requested replication degree is met. The initiator keeps, per chunk,
//! the set of peers that acknowledged a copy.
//!
//! ## Submodules
//! - **`types`**: chunk identifiers, file metadata and chunking helpers.
//! - **`store`**: the chunk storage seam and its in-memory implementation.
//! - **`replication`**: the coordinator driving placement, restore and delete.
//! - **`handlers`**: reactions to the chunk-level wire messages.

pub mod handlers;
pub mod replication;
pub mod store;
pub mod types;
