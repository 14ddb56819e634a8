use serde::{Deserialize, Serialize};

/// A single price observation. Lives for one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    /// Price in the smallest unit we attest (integer-truncated).
    pub value: u64,
    /// Unix seconds at fetch time
    pub observed_at: u64,
}

impl Quote {
    pub fn new(symbol: impl Into<String>, value: u64) -> Self {
        Self {
            symbol: symbol.into(),
            value,
            observed_at: current_unix_timestamp(),
        }
    }
}

pub fn current_unix_timestamp() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
