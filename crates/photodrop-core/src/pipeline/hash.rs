//! Content hashing for submitted assets.

use blake3::Hasher as Blake3Hasher;

/// BLAKE3 content hashing. The hash of the submitted bytes is stored with
/// every metadata record so duplicates can be found downstream.
pub struct Hasher;

impl Hasher {
    /// Hash an in-memory buffer.
    pub fn content_hash(data: &[u8]) -> String {
        let mut hasher = Blake3Hasher::new();
        hasher.update(data);
        hasher.finalize().to_hex().to_string()
    }
}
