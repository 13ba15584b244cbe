use crate::chord::{KEY_BITS, RING_SIZE};
use sha2::{Digest, Sha256};

/// Ring keys live in `[0, 2^KEY_BITS)`.
pub type Key = u64;

const KEY_MASK: u64 = RING_SIZE - 1;

/// Hashes arbitrary bytes onto the ring.
///
/// The key is the `KEY_BITS` least significant bits of the SHA-256 digest, reading the
/// digest as a big-endian number: the last digest byte becomes the lowest key byte.
pub fn generate_key(input: &[u8]) -> Key {
    let digest = Sha256::digest(input);
    let key_bytes = (KEY_BITS as usize).div_ceil(8);

    let mut key: u64 = 0;
    for i in 0..key_bytes {
        let byte = digest[digest.len() - 1 - i];
        key |= u64::from(byte) << (8 * i);
    }

    key & KEY_MASK
}

/// Clockwise distance from `from` to `to`.
pub fn distance(from: Key, to: Key) -> u64 {
    to.wrapping_sub(from) & KEY_MASK
}

/// Key at `base + 2^index`, the start of finger interval `index`.
pub fn finger_start(base: Key, index: usize) -> Key {
    (base + (1u64 << index)) & KEY_MASK
}

/// Whether `key` lies on the clockwise arc from `start` to `end`.
///
/// When `start == end` the arc covers the whole ring, so any key other than the shared
/// endpoint is inside and the endpoint itself is inside if either bound is inclusive.
pub fn is_key_between(
    key: Key,
    start: Key,
    end: Key,
    start_inclusive: bool,
    end_inclusive: bool,
) -> bool {
    let offset = distance(start, key);
    let span = match distance(start, end) {
        0 => RING_SIZE,
        span => span,
    };

    if offset == 0 {
        return start_inclusive || (start == end && end_inclusive);
    }
    if offset == span {
        return end_inclusive;
    }
    offset < span
}

/// Exclusive on both ends, the form used by notify and closest-preceding-node.
pub fn is_strictly_between(key: Key, start: Key, end: Key) -> bool {
    is_key_between(key, start, end, false, false)
}

/// If `to - from` is an exact power of two, the finger index it corresponds to.
pub fn finger_index_for(from: Key, to: Key) -> Option<usize> {
    let diff = distance(from, to);
    if diff.is_power_of_two() {
        Some(diff.trailing_zeros() as usize)
    } else {
        None
    }
}
