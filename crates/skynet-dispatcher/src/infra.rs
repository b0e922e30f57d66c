use sha2::{Digest, Sha256};

/// `"msg:" + channel + ":" + message_id"`.
pub fn idempotency_key(channel: &str, message_id: &str) -> String {
    format!("msg:{channel}:{message_id}")
}

/// `H(channel, message_id, body)` — a stable content hash so two deliveries
/// of the same message id with different bodies are not silently collapsed.
pub fn request_hash(channel: &str, message_id: &str, body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(channel.as_bytes());
    hasher.update([0]);
    hasher.update(message_id.as_bytes());
    hasher.update([0]);
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

/// `"user:" + channel + ":" + sender"`.
pub fn rate_bucket(channel: &str, sender: &str) -> String {
    format!("user:{channel}:{sender}")
}

/// Sliding-window rate limit parameters.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub window_ms: i64,
    pub cap: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { window_ms: 60_000, cap: 20 }
    }
}

/// Idempotency TTL — long enough to absorb at-least-once redelivery from a
/// channel adapter's retry logic without keeping the table growing forever.
pub const IDEMPOTENCY_TTL_MS: i64 = 10 * 60 * 1000;
