//! Cache Entry Module
//!
//! Defines a single local tier entry with write-time and access-time expiry.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde_json::Value;

// == Cache Entry ==
/// A value held by the local tier together with its timing metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value, `Value::Null` being a cached null
    pub value: Value,
    /// Write timestamp (Unix milliseconds)
    pub stored_at: u64,
    /// Monotonic write instant, drives expire-after-write
    written: Instant,
    /// Monotonic last access instant, drives expire-after-access
    accessed: Instant,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    pub fn new(value: Value) -> Self {
        let now = Instant::now();
        Self {
            value,
            stored_at: current_timestamp_ms(),
            written: now,
            accessed: now,
        }
    }

    // == Touch ==
    /// Records a read, restarting the access countdown.
    pub fn touch(&mut self) {
        self.accessed = Instant::now();
    }

    // == Is Expired ==
    /// Checks the entry against both expiry policies.
    ///
    /// An entry is expired once either enabled TTL has fully elapsed
    /// (elapsed >= ttl). A `None` TTL disables that policy.
    pub fn is_expired(&self, write_ttl: Option<Duration>, access_ttl: Option<Duration>) -> bool {
        let now = Instant::now();
        let written_out = write_ttl.is_some_and(|ttl| now.duration_since(self.written) >= ttl);
        let accessed_out = access_ttl.is_some_and(|ttl| now.duration_since(self.accessed) >= ttl);
        written_out || accessed_out
    }

    /// Time elapsed since the last write.
    pub fn age(&self) -> Duration {
        self.written.elapsed()
    }

    /// Time elapsed since the last read or write.
    pub fn idle(&self) -> Duration {
        self.accessed.elapsed()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
