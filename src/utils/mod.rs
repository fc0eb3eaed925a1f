use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns a fresh random identifier for connections, messages and materials.
pub fn fresh_id() -> u64 {
    rand::rng().random::<u64>()
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
