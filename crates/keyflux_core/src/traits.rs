use crate::{DbError, KeyScanPage, KeyScanRequest, KeyType};

/// Store operations the key browser consumes.
///
/// Implementations are shared across the control thread and fetch workers,
/// so they must be `Send + Sync` and handle their own connection locking.
pub trait KeyValueApi: Send + Sync {
    /// One `SCAN` step: a batch of matching key names plus the next cursor.
    fn scan_keys(&self, request: &KeyScanRequest) -> Result<KeyScanPage, DbError>;

    /// Resolves the data type of a key.
    fn key_type(&self, key: &str) -> Result<KeyType, DbError>;

    /// Remaining TTL in seconds, `-1` for no expiry, `-2` for a missing key.
    fn key_ttl(&self, key: &str) -> Result<i64, DbError>;

    /// Deletes a key. Returns `true` if it existed.
    fn delete_key(&self, key: &str) -> Result<bool, DbError>;

    /// Creates `key` holding an empty placeholder value of `key_type`.
    ///
    /// Hashes get a single `field` member and sorted sets a zero-scored
    /// member, since the store drops empty containers. Existing keys are
    /// written through, not replaced.
    fn create_key(&self, _key: &str, key_type: KeyType) -> Result<(), DbError> {
        Err(DbError::NotSupported(format!("creating {} keys", key_type)))
    }

    /// Switches the logical database used by all later calls.
    ///
    /// The default returns [`DbError::NotSupported`] for stores with a
    /// single keyspace.
    fn select_database(&self, database: u32) -> Result<(), DbError> {
        Err(DbError::NotSupported(format!("selecting database {}", database)))
    }

    fn ping(&self) -> Result<(), DbError> {
        Ok(())
    }
}
