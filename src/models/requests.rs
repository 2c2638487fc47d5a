//! Request DTOs for the admin API
//!
//! Defines incoming HTTP request bodies and path validation.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::{MAX_KEY_LENGTH, MAX_NAME_LENGTH};

/// Request body for PUT /caches/:name/entries/:key
///
/// # Fields
/// - `value`: Any JSON value; `null` is a cached null when enabled
/// - `if_absent`: Only write when no tier holds the key
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutEntryRequest {
    pub value: Value,
    #[serde(default)]
    pub if_absent: bool,
}

/// Returns an error message if `name` is not a usable cache name.
pub fn validate_cache_name(name: &str) -> Option<String> {
    if name.is_empty() {
        return Some("Cache name cannot be empty".to_string());
    }
    if name.len() > MAX_NAME_LENGTH {
        return Some(format!(
            "Cache name exceeds maximum length of {} bytes",
            MAX_NAME_LENGTH
        ));
    }
    // The name is the store key prefix, so it cannot contain the separator
    if name.contains(':') {
        return Some("Cache name cannot contain ':'".to_string());
    }
    None
}

/// Returns an error message if `key` is not a usable cache key.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        ));
    }
    None
}
