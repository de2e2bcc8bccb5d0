pub mod checkout;
pub mod config;
pub mod error;
pub mod logger;
pub mod money;
pub mod pricing;
pub mod state;
pub mod storage;

pub use money::Money;

use sha2::{Digest, Sha256};

/// Get current Unix timestamp
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Calculate SHA256 digest
pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// SHA256 of data as lowercase hex.
pub fn hex_digest(data: &[u8]) -> String {
    hex::encode(sha256_digest(data))
}
