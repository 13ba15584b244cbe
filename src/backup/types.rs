use crate::chord::key::{generate_key, Key};
use bytes::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

pub const CHUNK_MAX_SIZE: usize = 64_000;
pub const FILE_MAX_SIZE: u64 = CHUNK_MAX_SIZE as u64 * 1_000_000;
pub const MAX_REPLICATION_DEGREE: u32 = 9;

/// A chunk of a backed-up file.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChunkIdentifier {
    pub file_id: String,
    pub chunk_number: u32,
}

impl ChunkIdentifier {
    pub fn new(file_id: impl Into<String>, chunk_number: u32) -> Self {
        Self {
            file_id: file_id.into(),
            chunk_number,
        }
    }

    /// Ring key of the chunk, hashed from `<fileId>_<chunkNumber>`.
    pub fn key(&self) -> Key {
        generate_key(self.to_string().as_bytes())
    }
}

impl fmt::Display for ChunkIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.file_id, self.chunk_number)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileInformation {
    pub file_id: String,
    pub replication_degree: u32,
    pub num_chunks: u32,
}

impl FileInformation {
    pub fn chunks(&self) -> impl Iterator<Item = ChunkIdentifier> + '_ {
        (0..self.num_chunks).map(|n| ChunkIdentifier::new(self.file_id.clone(), n))
    }
}

/// Hex SHA-256 over the file name, its size and its contents.
pub fn file_id(name: &str, contents: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update((contents.len() as u64).to_be_bytes());
    hasher.update(contents);
    hex::encode(hasher.finalize())
}

/// Splits `contents` into `len / CHUNK_MAX_SIZE + 1` chunks. A file whose size is a
/// multiple of the chunk size ends with an empty chunk, marking the end of the file.
pub fn split_chunks(contents: &[u8]) -> Vec<Bytes> {
    let count = contents.len() / CHUNK_MAX_SIZE + 1;
    (0..count)
        .map(|i| {
            let start = i * CHUNK_MAX_SIZE;
            let end = (start + CHUNK_MAX_SIZE).min(contents.len());
            Bytes::copy_from_slice(&contents[start..end])
        })
        .collect()
}
