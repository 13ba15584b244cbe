pub mod finger;
pub mod key;
pub mod node;
pub mod routing;
pub mod tasks;
pub mod types;
pub mod workers;

#[cfg(test)]
mod tests;

// Chord configuration
pub const KEY_BITS: u32 = 16;
pub const RING_SIZE: u64 = 1 << KEY_BITS;
pub const FINGER_TABLE_SIZE: usize = KEY_BITS as usize;
pub const SUCCESSOR_LIST_SIZE: usize = 4;

// Lookups forwarded more often than this are assumed to be looping on inconsistent fingers.
pub const MAX_LOOKUP_HOPS: u32 = 2 * KEY_BITS;
