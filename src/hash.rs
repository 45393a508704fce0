use hex::encode;
use sha2::{Digest, Sha256};

pub struct Hash;

impl Hash {
    /// SHA-256 of a script's text, hex encoded. This is what gets recorded
    /// in the journal and recomputed later for drift detection.
    pub fn checksum(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        encode(hasher.finalize())
    }

    pub fn short(checksum: &str) -> &str {
        &checksum[..checksum.len().min(8)]
    }
}
