use std::collections::HashSet;
use std::sync::Arc;

use crate::{DbError, KeyRecord, KeyScanRequest, KeyType, KeyValueApi, TTL_MISSING};

/// Default `SCAN COUNT` hint when the fetch limit doesn't call for less.
pub const DEFAULT_SCAN_COUNT: u32 = 100;

/// Pages through the keyspace and resolves type and TTL for each key.
#[derive(Clone)]
pub struct KeyFetcher {
    api: Arc<dyn KeyValueApi>,
    scan_count: u32,
}

impl KeyFetcher {
    pub fn new(api: Arc<dyn KeyValueApi>) -> Self {
        Self {
            api,
            scan_count: DEFAULT_SCAN_COUNT,
        }
    }

    pub fn with_scan_count(mut self, scan_count: u32) -> Self {
        self.scan_count = if scan_count == 0 {
            DEFAULT_SCAN_COUNT
        } else {
            scan_count
        };
        self
    }

    /// Batch size hint for a fetch capped at `limit` records (`0` = no cap).
    pub fn batch_size(&self, limit: usize) -> u32 {
        if limit > 0 && limit < self.scan_count as usize {
            limit as u32
        } else {
            self.scan_count
        }
    }

    /// Collects up to `limit` distinct records matching `pattern`, in scan
    /// order.
    ///
    /// Only a failing `SCAN` aborts the fetch. A failed type or TTL lookup
    /// is logged and replaced by `Unknown` / `-2`.
    pub fn fetch_all(&self, pattern: &str, limit: usize) -> Result<Vec<KeyRecord>, DbError> {
        let pattern = if pattern.is_empty() { "*" } else { pattern };
        let count = self.batch_size(limit);

        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = 0u64;

        loop {
            let request = KeyScanRequest::new(pattern, count).with_cursor(cursor);
            let page = self.api.scan_keys(&request)?;

            for key in page.keys {
                // SCAN may return a key more than once across batches.
                if !seen.insert(key.clone()) {
                    continue;
                }

                records.push(self.resolve(key));

                if limit > 0 && records.len() >= limit {
                    return Ok(records);
                }
            }

            cursor = page.next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(records)
    }

    fn resolve(&self, key: String) -> KeyRecord {
        let key_type = match self.api.key_type(&key) {
            Ok(key_type) => key_type,
            Err(e) => {
                log::warn!("Failed to get type for key {}: {}", key, e);
                KeyType::Unknown
            }
        };

        let ttl_seconds = match self.api.key_ttl(&key) {
            Ok(ttl) => ttl,
            Err(e) => {
                log::warn!("Failed to get TTL for key {}: {}", key, e);
                TTL_MISSING
            }
        };

        KeyRecord {
            key,
            key_type,
            ttl_seconds,
        }
    }
}
