//! Content hashing for deduplication and resume.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// SHA-256 content addressing over raw file bytes.
///
/// The digest is the only identity used for dedup and resume; file names and
/// modification times are never consulted.
pub struct Hasher;

impl Hasher {
    /// Hash a file's contents without loading it into memory at once.
    pub fn content_hash(path: &Path) -> std::io::Result<String> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut hasher = Sha256::new();

        let mut buffer = [0u8; 65536];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Hash an in-memory byte buffer.
    pub fn content_hash_from_bytes(data: &[u8]) -> String {
        format!("{:x}", Sha256::digest(data))
    }
}
