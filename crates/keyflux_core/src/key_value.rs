use std::fmt;

use serde::{Deserialize, Serialize};

/// TTL sentinel for a key that exists without an expiry.
pub const TTL_NO_EXPIRY: i64 = -1;

/// TTL sentinel for a key that vanished or whose expiry could not be read.
pub const TTL_MISSING: i64 = -2;

/// Data type of a key as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    String,
    List,
    Set,
    Hash,
    ZSet,
    Stream,
    Unknown,
}

impl KeyType {
    /// Parses the type name returned by the store's `TYPE` command.
    ///
    /// Anything unrecognised (including `none` for a vanished key) maps to
    /// [`KeyType::Unknown`].
    pub fn parse(type_name: &str) -> Self {
        let normalized = type_name.trim().to_ascii_lowercase();

        match normalized.as_str() {
            "string" => KeyType::String,
            "list" => KeyType::List,
            "set" => KeyType::Set,
            "hash" => KeyType::Hash,
            "zset" => KeyType::ZSet,
            "stream" => KeyType::Stream,
            _ => KeyType::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeyType::String => "string",
            KeyType::List => "list",
            KeyType::Set => "set",
            KeyType::Hash => "hash",
            KeyType::ZSet => "zset",
            KeyType::Stream => "stream",
            KeyType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type predicate applied by the filter engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TypeFilter {
    #[default]
    All,
    Only(KeyType),
}

impl TypeFilter {
    /// Parses a filter label. `"all"` and `"All Types"` select every type.
    pub fn parse(label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("all")
            || trimmed.eq_ignore_ascii_case("all types")
        {
            return TypeFilter::All;
        }

        TypeFilter::Only(KeyType::parse(trimmed))
    }

    pub fn matches(self, key_type: KeyType) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Only(expected) => expected == key_type,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TypeFilter::All => "All Types",
            TypeFilter::Only(key_type) => key_type.as_str(),
        }
    }
}

/// A key together with the metadata resolved during a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRecord {
    pub key: String,
    pub key_type: KeyType,
    /// Seconds until expiry, or one of [`TTL_NO_EXPIRY`] / [`TTL_MISSING`].
    pub ttl_seconds: i64,
}

impl KeyRecord {
    pub fn new(key: impl Into<String>, key_type: KeyType, ttl_seconds: i64) -> Self {
        Self {
            key: key.into(),
            key_type,
            ttl_seconds,
        }
    }

    pub fn has_expiry(&self) -> bool {
        self.ttl_seconds >= 0
    }

    pub fn is_missing(&self) -> bool {
        self.ttl_seconds == TTL_MISSING
    }
}

/// One step of cursor-based key enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyScanRequest {
    pub cursor: u64,
    pub pattern: String,
    pub count: u32,
}

impl KeyScanRequest {
    pub fn new(pattern: impl Into<String>, count: u32) -> Self {
        Self {
            cursor: 0,
            pattern: pattern.into(),
            count,
        }
    }

    pub fn with_cursor(mut self, cursor: u64) -> Self {
        self.cursor = cursor;
        self
    }
}

/// A batch of key names and the cursor to continue from. A `next_cursor`
/// of `0` means the enumeration wrapped back to its start.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyScanPage {
    pub keys: Vec<String>,
    pub next_cursor: u64,
}
