//! Deletion markers for offline reconciliation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relative directory holding tombstones inside each root
pub const TOMBSTONE_DIR: &str = "tombstones/";

/// Suffix of tombstone objects
pub const TOMBSTONE_SUFFIX: &str = ".json";

/// Record written when a key or prefix is deleted
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    /// When the deletion happened
    pub deleted_at: DateTime<Utc>,
    /// Key (or prefix) that was deleted, relative to the caller's root
    pub original_key: String,
}

impl Tombstone {
    /// Create a tombstone for a relative key
    pub fn new(original_key: impl Into<String>, deleted_at: DateTime<Utc>) -> Self {
        Self {
            deleted_at,
            original_key: original_key.into(),
        }
    }
}

/// Default tombstone location for a relative key or prefix
pub fn default_tombstone_key(relative: &str) -> String {
    format!(
        "{}{}{}",
        TOMBSTONE_DIR,
        relative.trim_end_matches('/'),
        TOMBSTONE_SUFFIX
    )
}

/// Whether a relative key lives in the tombstone directory
pub fn is_tombstone_key(relative: &str) -> bool {
    relative.starts_with(TOMBSTONE_DIR)
}

/// Original key recorded by a default-located tombstone
pub fn original_key_of(relative_tombstone: &str) -> Option<&str> {
    relative_tombstone
        .strip_prefix(TOMBSTONE_DIR)?
        .strip_suffix(TOMBSTONE_SUFFIX)
        .filter(|k| !k.is_empty())
}
