use crate::FakeKeyStore;
use keyflux_core::{KeyRecord, KeyType, TTL_NO_EXPIRY};

pub fn record(key: impl Into<String>, key_type: KeyType, ttl_seconds: i64) -> KeyRecord {
    KeyRecord::new(key, key_type, ttl_seconds)
}

pub fn string_record(key: impl Into<String>) -> KeyRecord {
    record(key, KeyType::String, TTL_NO_EXPIRY)
}

/// Three user keys split over two user ids.
pub fn user_records() -> Vec<KeyRecord> {
    vec![
        record("user:1:name", KeyType::String, TTL_NO_EXPIRY),
        record("user:1:age", KeyType::String, TTL_NO_EXPIRY),
        record("user:2:name", KeyType::String, 3600),
    ]
}

/// A mixed keyspace with several types, expiring keys and an undelimited key.
pub fn mixed_records() -> Vec<KeyRecord> {
    vec![
        record("user:1:name", KeyType::String, TTL_NO_EXPIRY),
        record("user:1:age", KeyType::String, TTL_NO_EXPIRY),
        record("user:2:name", KeyType::String, 3600),
        record("user:2:tags", KeyType::Set, TTL_NO_EXPIRY),
        record("session:abc", KeyType::Hash, 900),
        record("session:def", KeyType::Hash, 120),
        record("queue:jobs", KeyType::List, TTL_NO_EXPIRY),
        record("leaderboard", KeyType::ZSet, TTL_NO_EXPIRY),
        record("events:orders", KeyType::Stream, TTL_NO_EXPIRY),
    ]
}

pub fn store_with(records: &[KeyRecord]) -> FakeKeyStore {
    let store = FakeKeyStore::new();
    for record in records {
        store.insert_key(record.key.clone(), record.key_type, record.ttl_seconds);
    }
    store
}

/// `count` string keys named `prefix:0000`, `prefix:0001`, ...
pub fn numbered_store(prefix: &str, count: usize) -> FakeKeyStore {
    let store = FakeKeyStore::new();
    for i in 0..count {
        store.insert_key(format!("{}:{:04}", prefix, i), KeyType::String, TTL_NO_EXPIRY);
    }
    store
}
