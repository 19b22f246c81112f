//! Content and path hashing.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Number of digest bytes kept for path keys (32 hex characters).
const PATH_KEY_BYTES: usize = 16;

/// SHA-256 of `data`, lowercase hex encoded.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Stable storage key for a path.
///
/// Callers are expected to pass a canonical absolute path; the same path always
/// produces the same key across process restarts.
pub fn path_key(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    hex::encode(&digest[..PATH_KEY_BYTES])
}
