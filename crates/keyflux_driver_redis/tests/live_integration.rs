use keyflux_core::{
    BrowserConfig, DbError, KeyBrowser, KeyFetcher, KeyType, KeyValueApi, TTL_NO_EXPIRY,
};
use keyflux_driver_redis::{RedisKeyStore, RedisParams};
use keyflux_test_support::containers;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn seed(uri: &str) -> Result<(), DbError> {
    let client = redis::Client::open(uri).map_err(|e| DbError::connection_failed(e.to_string()))?;
    let mut conn = client
        .get_connection()
        .map_err(|e| DbError::connection_failed(e.to_string()))?;

    let mut pipe = redis::pipe();
    pipe.cmd("SET").arg("user:1:name").arg("ada").ignore();
    pipe.cmd("SET").arg("user:1:age").arg("36").ignore();
    pipe.cmd("SET").arg("user:2:name").arg("grace").ignore();
    pipe.cmd("EXPIRE").arg("user:2:name").arg(3600).ignore();
    pipe.cmd("HSET").arg("session:abc").arg("user").arg("1").ignore();
    pipe.cmd("RPUSH").arg("queue:jobs").arg("a").arg("b").ignore();
    pipe.cmd("ZADD").arg("leaderboard").arg(10).arg("ada").ignore();
    pipe.query::<()>(&mut conn)
        .map_err(|e| DbError::query_failed(e.to_string()))
}

#[test]
#[ignore = "requires Docker daemon"]
fn redis_live_scan_resolve_and_delete() -> Result<(), DbError> {
    containers::with_redis_url(|uri| {
        let store = containers::retry_db_operation(Duration::from_secs(30), || {
            let store = RedisKeyStore::connect_uri(&uri)?;
            store.ping()?;
            Ok(store)
        })?;
        assert_eq!(store.database(), Some(0));

        seed(&uri)?;
        let store: Arc<dyn KeyValueApi> = Arc::new(store);

        let records = KeyFetcher::new(store.clone())
            .with_scan_count(2)
            .fetch_all("*", 0)?;
        assert_eq!(records.len(), 6);

        let find = |key: &str| records.iter().find(|r| r.key == key).cloned();
        let expiring = find("user:2:name").expect("user:2:name");
        assert_eq!(expiring.key_type, KeyType::String);
        assert!(expiring.ttl_seconds > 0 && expiring.ttl_seconds <= 3600);
        assert_eq!(find("session:abc").map(|r| r.key_type), Some(KeyType::Hash));
        assert_eq!(find("queue:jobs").map(|r| r.key_type), Some(KeyType::List));
        assert_eq!(
            find("leaderboard").map(|r| (r.key_type, r.ttl_seconds)),
            Some((KeyType::ZSet, TTL_NO_EXPIRY))
        );

        let limited = KeyFetcher::new(store.clone()).fetch_all("user:*", 2)?;
        assert_eq!(limited.len(), 2);

        let mut browser = KeyBrowser::new(BrowserConfig::default());
        browser.set_client(Some(store.clone()));
        assert!(browser.load_keys());

        let deadline = Instant::now() + Duration::from_secs(10);
        while browser.is_loading() {
            browser.process_completions();
            assert!(Instant::now() < deadline, "load did not finish in time");
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(browser.status_line(), "6 keys");

        browser.set_scope("user");
        assert_eq!(browser.filtered_view().len(), 3);

        assert!(store.delete_key("user:1:age")?);
        assert!(!store.delete_key("user:1:age")?);
        assert_eq!(store.key_type("user:1:age")?, KeyType::Unknown);
        assert_eq!(store.key_ttl("user:1:age")?, keyflux_core::TTL_MISSING);

        Ok(())
    })
}

/// Port of a `redis://127.0.0.1:PORT/0` container URL.
fn port_of(uri: &str) -> u16 {
    uri.rsplit(':')
        .next()
        .and_then(|tail| tail.split('/').next())
        .and_then(|port| port.parse().ok())
        .expect("container url has a port")
}

#[test]
#[ignore = "requires Docker daemon"]
fn redis_live_create_keys_and_switch_database() -> Result<(), DbError> {
    containers::with_redis_url(|uri| {
        let params = RedisParams::new("127.0.0.1", port_of(&uri)).with_database(1);
        let store = containers::retry_db_operation(Duration::from_secs(30), || {
            RedisKeyStore::connect(&params)
        })?;
        assert_eq!(store.database(), Some(1));

        for (key, key_type) in [
            ("new:string", KeyType::String),
            ("new:list", KeyType::List),
            ("new:set", KeyType::Set),
            ("new:hash", KeyType::Hash),
            ("new:zset", KeyType::ZSet),
        ] {
            store.create_key(key, key_type)?;
            assert_eq!(store.key_type(key)?, key_type);
            assert_eq!(store.key_ttl(key)?, TTL_NO_EXPIRY);
        }
        assert!(matches!(
            store.create_key("new:stream", KeyType::Stream),
            Err(DbError::NotSupported(_))
        ));

        let store = Arc::new(store);
        let api: Arc<dyn KeyValueApi> = store.clone();
        let mut browser = KeyBrowser::new(BrowserConfig::default());
        browser.set_client(Some(api));

        browser.select_database(0)?;
        assert_eq!(store.database(), Some(0));
        let deadline = Instant::now() + Duration::from_secs(10);
        while browser.is_loading() {
            browser.process_completions();
            assert!(Instant::now() < deadline, "load did not finish in time");
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(browser.status_line(), "0 keys");

        Ok(())
    })
}

#[test]
fn unreachable_server_reports_connection_failure() {
    let result = RedisKeyStore::connect_uri("redis://127.0.0.1:1/0");
    assert!(matches!(result, Err(DbError::ConnectionFailed(_))));
}
