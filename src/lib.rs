pub mod config;
pub mod error;
pub mod gateway;
pub mod hook;
pub mod logger;
pub mod stage;
pub mod state;
pub mod storage;
pub mod workflow;

use sha2::{Digest, Sha256};

/// Epoch milliseconds; all persisted timestamps use this representation.
pub type TimestampMs = i64;

pub const HOUR_MS: i64 = 3600 * 1000;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Get current Unix timestamp in milliseconds
pub fn current_timestamp_ms() -> TimestampMs {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// Calculate SHA256 digest
pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Random 16-byte token as lowercase hex (tracking and design-review links).
pub fn new_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash of a public token, stored alongside it for audit.
pub fn token_hash(token: &str) -> String {
    hex::encode(sha256_digest(token.as_bytes()))
}
