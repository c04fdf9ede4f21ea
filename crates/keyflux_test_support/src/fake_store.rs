use indexmap::IndexMap;
use keyflux_core::{DbError, KeyScanPage, KeyScanRequest, KeyType, KeyValueApi, TTL_NO_EXPIRY};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct FakeKeyStoreStats {
    pub scan_requests: Vec<KeyScanRequest>,
    pub type_calls: usize,
    pub ttl_calls: usize,
    pub deleted_keys: Vec<String>,
    pub created_keys: Vec<(String, KeyType)>,
    pub selected_databases: Vec<u32>,
}

impl FakeKeyStoreStats {
    pub fn scan_calls(&self) -> usize {
        self.scan_requests.len()
    }
}

/// Order in which scans return matching keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanOrder {
    /// Lexicographic, so paging is deterministic across inserts.
    #[default]
    Sorted,
    /// The order keys were inserted, like a server that does not sort.
    Insertion,
}

type Keyspace = IndexMap<String, (KeyType, i64)>;

#[derive(Default)]
struct ScanGate {
    closed: Mutex<bool>,
    opened: Condvar,
}

#[derive(Default)]
struct FakeKeyStoreState {
    databases: RwLock<HashMap<u32, Keyspace>>,
    database: AtomicU32,
    scan_order: RwLock<ScanOrder>,
    page_size: RwLock<Option<usize>>,
    overlap: RwLock<usize>,
    scan_error: RwLock<Option<String>>,
    failing_scans: AtomicUsize,
    type_errors: RwLock<HashSet<String>>,
    ttl_errors: RwLock<HashSet<String>>,
    ping_error: RwLock<Option<String>>,
    scan_requests: Mutex<Vec<KeyScanRequest>>,
    deleted_keys: Mutex<Vec<String>>,
    created_keys: Mutex<Vec<(String, KeyType)>>,
    selected_databases: Mutex<Vec<u32>>,
    type_calls: AtomicUsize,
    ttl_calls: AtomicUsize,
    blocked_scans: AtomicUsize,
    gate: ScanGate,
}

/// In-memory keyspaces with cursor-paged scans and injectable failures.
///
/// Each logical database has its own keyspace; database `0` is selected
/// initially. The cursor is the offset of the next page in scan order.
/// Scans can be held at a gate to observe a fetch while it is in flight.
#[derive(Clone, Default)]
pub struct FakeKeyStore {
    state: Arc<FakeKeyStoreState>,
}

impl FakeKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(self, key: impl Into<String>, key_type: KeyType, ttl_seconds: i64) -> Self {
        self.insert_key(key, key_type, ttl_seconds);
        self
    }

    pub fn with_keys<'a>(self, keys: impl IntoIterator<Item = (&'a str, KeyType, i64)>) -> Self {
        for (key, key_type, ttl) in keys {
            self.insert_key(key, key_type, ttl);
        }
        self
    }

    /// Adds a key to a database other than the selected one.
    pub fn with_database_key(
        self,
        database: u32,
        key: impl Into<String>,
        key_type: KeyType,
        ttl_seconds: i64,
    ) -> Self {
        rwlock_write(&self.state.databases)
            .entry(database)
            .or_default()
            .insert(key.into(), (key_type, ttl_seconds));
        self
    }

    pub fn with_scan_order(self, order: ScanOrder) -> Self {
        *rwlock_write(&self.state.scan_order) = order;
        self
    }

    /// Caps each scan page regardless of the requested count.
    pub fn with_page_size(self, page_size: usize) -> Self {
        *rwlock_write(&self.state.page_size) = Some(page_size.max(1));
        self
    }

    /// Repeats the last `overlap` keys of the previous page at the start of
    /// the next one, as a rehashing server may.
    pub fn with_scan_overlap(self, overlap: usize) -> Self {
        *rwlock_write(&self.state.overlap) = overlap;
        self
    }

    pub fn with_scan_error(self, message: impl Into<String>) -> Self {
        self.set_scan_error(Some(message.into()));
        self
    }

    pub fn with_type_error(self, key: impl Into<String>) -> Self {
        rwlock_write(&self.state.type_errors).insert(key.into());
        self
    }

    pub fn with_ttl_error(self, key: impl Into<String>) -> Self {
        rwlock_write(&self.state.ttl_errors).insert(key.into());
        self
    }

    pub fn with_ping_error(self, message: impl Into<String>) -> Self {
        *rwlock_write(&self.state.ping_error) = Some(message.into());
        self
    }

    pub fn insert_key(&self, key: impl Into<String>, key_type: KeyType, ttl_seconds: i64) {
        let database = self.database();
        rwlock_write(&self.state.databases)
            .entry(database)
            .or_default()
            .insert(key.into(), (key_type, ttl_seconds));
    }

    pub fn remove_key(&self, key: &str) -> bool {
        let database = self.database();
        rwlock_write(&self.state.databases)
            .get_mut(&database)
            .and_then(|keyspace| keyspace.shift_remove(key))
            .is_some()
    }

    /// Number of keys in the selected database.
    pub fn key_count(&self) -> usize {
        self.with_keyspace(|keyspace| keyspace.len())
    }

    pub fn database(&self) -> u32 {
        self.state.database.load(Ordering::SeqCst)
    }

    pub fn set_scan_error(&self, message: Option<String>) {
        *rwlock_write(&self.state.scan_error) = message;
    }

    /// Fails the next `count` scans, then behaves normally again.
    pub fn fail_next_scans(&self, count: usize) {
        self.state.failing_scans.store(count, Ordering::SeqCst);
    }

    /// Blocks every scan until [`FakeKeyStore::release_scans`] is called.
    pub fn hold_scans(&self) {
        *mutex_lock(&self.state.gate.closed) = true;
    }

    pub fn release_scans(&self) {
        *mutex_lock(&self.state.gate.closed) = false;
        self.state.gate.opened.notify_all();
    }

    /// Number of scans currently parked at the gate.
    pub fn blocked_scans(&self) -> usize {
        self.state.blocked_scans.load(Ordering::SeqCst)
    }

    /// Waits until at least one scan is parked at the gate.
    pub fn wait_for_blocked_scan(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while self.blocked_scans() == 0 {
            if std::time::Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        true
    }

    pub fn stats(&self) -> FakeKeyStoreStats {
        FakeKeyStoreStats {
            scan_requests: mutex_lock(&self.state.scan_requests).clone(),
            type_calls: self.state.type_calls.load(Ordering::Relaxed),
            ttl_calls: self.state.ttl_calls.load(Ordering::Relaxed),
            deleted_keys: mutex_lock(&self.state.deleted_keys).clone(),
            created_keys: mutex_lock(&self.state.created_keys).clone(),
            selected_databases: mutex_lock(&self.state.selected_databases).clone(),
        }
    }

    pub fn as_api_arc(self) -> Arc<dyn KeyValueApi> {
        Arc::new(self)
    }

    fn with_keyspace<R>(&self, f: impl FnOnce(&Keyspace) -> R) -> R {
        let databases = rwlock_read(&self.state.databases);
        match databases.get(&self.database()) {
            Some(keyspace) => f(keyspace),
            None => f(&Keyspace::new()),
        }
    }

    fn lookup(&self, key: &str) -> Option<(KeyType, i64)> {
        self.with_keyspace(|keyspace| keyspace.get(key).copied())
    }

    fn wait_at_gate(&self) {
        let mut closed = mutex_lock(&self.state.gate.closed);
        if !*closed {
            return;
        }

        self.state.blocked_scans.fetch_add(1, Ordering::SeqCst);
        while *closed {
            closed = match self.state.gate.opened.wait(closed) {
                Ok(guard) => guard,
                Err(poison_error) => poison_error.into_inner(),
            };
        }
        self.state.blocked_scans.fetch_sub(1, Ordering::SeqCst);
    }

    fn take_scan_failure(&self) -> Option<String> {
        if let Some(message) = rwlock_read(&self.state.scan_error).clone() {
            return Some(message);
        }

        let failing = &self.state.failing_scans;
        let mut remaining = failing.load(Ordering::SeqCst);
        while remaining > 0 {
            match failing.compare_exchange(
                remaining,
                remaining - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Some("injected scan failure".to_string()),
                Err(current) => remaining = current,
            }
        }

        None
    }
}

impl KeyValueApi for FakeKeyStore {
    fn scan_keys(&self, request: &KeyScanRequest) -> Result<KeyScanPage, DbError> {
        mutex_lock(&self.state.scan_requests).push(request.clone());
        self.wait_at_gate();

        if let Some(message) = self.take_scan_failure() {
            return Err(DbError::query_failed(message));
        }

        let mut matching: Vec<String> = self.with_keyspace(|keyspace| {
            keyspace
                .keys()
                .filter(|key| glob_matches(&request.pattern, key))
                .cloned()
                .collect()
        });
        if *rwlock_read(&self.state.scan_order) == ScanOrder::Sorted {
            matching.sort();
        }

        let page_size = rwlock_read(&self.state.page_size)
            .unwrap_or(request.count.max(1) as usize);
        let overlap = *rwlock_read(&self.state.overlap);

        let offset = request.cursor as usize;
        let start = if offset > 0 {
            offset.saturating_sub(overlap)
        } else {
            0
        };
        let end = (offset + page_size).min(matching.len());
        let start = start.min(end);

        let next_cursor = if end >= matching.len() { 0 } else { end as u64 };

        Ok(KeyScanPage {
            keys: matching[start..end].to_vec(),
            next_cursor,
        })
    }

    fn key_type(&self, key: &str) -> Result<KeyType, DbError> {
        self.state.type_calls.fetch_add(1, Ordering::Relaxed);

        if rwlock_read(&self.state.type_errors).contains(key) {
            return Err(DbError::query_failed(format!("TYPE {} failed", key)));
        }

        Ok(self
            .lookup(key)
            .map(|(key_type, _)| key_type)
            .unwrap_or(KeyType::Unknown))
    }

    fn key_ttl(&self, key: &str) -> Result<i64, DbError> {
        self.state.ttl_calls.fetch_add(1, Ordering::Relaxed);

        if rwlock_read(&self.state.ttl_errors).contains(key) {
            return Err(DbError::query_failed(format!("TTL {} failed", key)));
        }

        Ok(self
            .lookup(key)
            .map(|(_, ttl)| ttl)
            .unwrap_or(keyflux_core::TTL_MISSING))
    }

    fn delete_key(&self, key: &str) -> Result<bool, DbError> {
        let removed = self.remove_key(key);
        if removed {
            mutex_lock(&self.state.deleted_keys).push(key.to_string());
        }
        Ok(removed)
    }

    /// Strings are overwritten like `SET`; other types are appended to and
    /// fail with `WRONGTYPE` when the key holds something else.
    fn create_key(&self, key: &str, key_type: KeyType) -> Result<(), DbError> {
        if matches!(key_type, KeyType::Stream | KeyType::Unknown) {
            return Err(DbError::NotSupported(format!("creating {} keys", key_type)));
        }

        match self.lookup(key) {
            Some((existing, _)) if key_type != KeyType::String && existing != key_type => {
                return Err(DbError::query_failed(format!(
                    "WRONGTYPE {} holds a {}",
                    key, existing
                )));
            }
            Some((_, ttl)) if key_type != KeyType::String => self.insert_key(key, key_type, ttl),
            _ => self.insert_key(key, key_type, TTL_NO_EXPIRY),
        }

        mutex_lock(&self.state.created_keys).push((key.to_string(), key_type));
        Ok(())
    }

    fn select_database(&self, database: u32) -> Result<(), DbError> {
        self.state.database.store(database, Ordering::SeqCst);
        mutex_lock(&self.state.selected_databases).push(database);
        Ok(())
    }

    fn ping(&self) -> Result<(), DbError> {
        match rwlock_read(&self.state.ping_error).clone() {
            Some(message) => Err(DbError::connection_failed(message)),
            None => Ok(()),
        }
    }
}

/// Minimal `SCAN MATCH` glob: `*` and `?` only.
fn glob_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, k));
                p += 1;
            }
            Some('?') => {
                p += 1;
                k += 1;
            }
            Some(c) if *c == key[k] => {
                p += 1;
                k += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    k = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

fn rwlock_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

fn rwlock_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

fn mutex_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}
