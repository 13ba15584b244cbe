pub mod memory;
pub mod messages;
pub mod node;
pub mod pool;
pub mod server;
pub mod transport;
