use keyflux_core::{
    BrowserConfig, DbError, KeyBrowser, KeyType, RefreshPolicy, TTL_NO_EXPIRY, TypeFilter,
    ViewMode, ROOT,
};
use keyflux_test_support::{FakeKeyStore, ScanOrder};
use keyflux_test_support::fixtures::{mixed_records, store_with, user_records};
use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

fn connected(store: &FakeKeyStore) -> KeyBrowser {
    connected_with(store, BrowserConfig::default())
}

fn connected_with(store: &FakeKeyStore, config: BrowserConfig) -> KeyBrowser {
    let mut browser = KeyBrowser::new(config);
    browser.set_client(Some(store.clone().as_api_arc()));
    browser
}

fn wait_for_load(browser: &mut KeyBrowser) {
    let deadline = Instant::now() + WAIT;
    while browser.is_loading() {
        browser.process_completions();
        assert!(Instant::now() < deadline, "load did not finish in time");
        thread::sleep(Duration::from_millis(2));
    }
}

fn drain_completions(browser: &mut KeyBrowser, expected: usize) {
    let deadline = Instant::now() + WAIT;
    let mut applied = 0;
    while applied < expected {
        applied += browser.process_completions();
        assert!(Instant::now() < deadline, "completion did not arrive in time");
        thread::sleep(Duration::from_millis(2));
    }
}

fn loaded(store: &FakeKeyStore) -> KeyBrowser {
    let mut browser = connected(store);
    assert!(browser.load_keys());
    wait_for_load(&mut browser);
    browser
}

fn view_keys(browser: &KeyBrowser) -> Vec<String> {
    browser
        .filtered_view()
        .iter()
        .map(|record| record.key.clone())
        .collect()
}

#[test]
fn tree_groups_keys_by_delimiter() {
    let mut browser = loaded(&store_with(&user_records()));
    assert_eq!(browser.toggle_view_mode(), ViewMode::Tree);

    let tree = browser.tree().expect("tree in tree mode");
    let top: Vec<&str> = tree.children(ROOT).map(|node| node.name.as_str()).collect();
    assert_eq!(top, vec!["user"]);

    let user = tree.find("user").expect("user folder");
    assert!(user.is_folder());
    assert!(!user.is_leaf());
    assert_eq!(user.leaf_count(), 3);

    let one = tree.find("user:1").expect("user:1");
    assert_eq!(one.leaf_count(), 2);
    let one_children: Vec<&str> = tree
        .children(tree.find_id("user:1").expect("id"))
        .map(|node| node.name.as_str())
        .collect();
    assert_eq!(one_children, vec!["age", "name"]);

    let two_name = tree.find("user:2:name").expect("leaf");
    assert_eq!(tree.find("user:2").expect("user:2").leaf_count(), 1);
    assert_eq!(two_name.record.as_ref().map(|r| r.ttl_seconds), Some(3600));
}

#[test]
fn clearing_scope_restores_the_view() {
    let mut browser = loaded(&store_with(&mixed_records()));
    browser.set_type_filter(TypeFilter::Only(KeyType::String));
    let before = browser.filtered_view().clone();

    browser.set_scope("user:1");
    assert_eq!(view_keys(&browser), vec!["user:1:age", "user:1:name"]);

    browser.clear_scope();
    assert_eq!(browser.filtered_view(), &before);
    assert_eq!(browser.scope(), None);
}

#[test]
fn failed_load_surfaces_error_then_recovers() {
    let store = store_with(&user_records());
    store.fail_next_scans(1);

    let errors = Rc::new(RefCell::new(Vec::new()));
    let mut browser = connected(&store);
    {
        let errors = errors.clone();
        browser.set_on_load_error(move |error| errors.borrow_mut().push(error.to_string()));
    }

    assert!(browser.load_keys());
    wait_for_load(&mut browser);

    assert!(browser.snapshot().is_empty());
    assert_eq!(errors.borrow().len(), 1);
    assert_eq!(browser.status_line(), "Error");

    assert!(browser.load_keys());
    wait_for_load(&mut browser);

    assert_eq!(browser.snapshot().len(), 3);
    assert_eq!(browser.filtered_view().len(), 3);
    assert_eq!(browser.status_line(), "3 keys");
    assert_eq!(errors.borrow().len(), 1);
}

#[test]
fn only_one_fetch_runs_at_a_time() {
    let store = store_with(&user_records());
    let mut browser = connected(&store);

    store.hold_scans();
    assert!(browser.load_keys());
    assert!(store.wait_for_blocked_scan(WAIT));

    assert!(browser.is_loading());
    assert!(browser.progress_visible());
    assert_eq!(browser.status_line(), "Loading...");
    assert!(!browser.load_keys());
    assert!(!browser.load_keys_silent());

    store.release_scans();
    wait_for_load(&mut browser);

    assert_eq!(store.stats().scan_calls(), 1);
    assert_eq!(browser.snapshot().len(), 3);
    assert!(!browser.progress_visible());
}

#[test]
fn search_edits_are_debounced() {
    let mut browser = loaded(&store_with(&mixed_records()));
    let revision = browser.view_revision();
    let start = Instant::now();

    for (i, text) in ["u", "us", "use", "user:2"].iter().enumerate() {
        browser.set_search_pattern_at(*text, start + Duration::from_millis(50 * i as u64));
    }
    assert_eq!(browser.pending_search(), Some("user:2"));

    browser.tick(start + Duration::from_millis(200));
    assert_eq!(browser.view_revision(), revision);
    assert_eq!(browser.filtered_view().len(), mixed_records().len());

    browser.tick(start + Duration::from_millis(500));
    assert_eq!(browser.view_revision(), revision + 1);
    assert_eq!(browser.search_pattern(), "user:2");
    assert_eq!(view_keys(&browser), vec!["user:2:name", "user:2:tags"]);

    browser.tick(start + Duration::from_secs(2));
    assert_eq!(browser.view_revision(), revision + 1);
}

#[test]
fn search_is_case_insensitive_and_flushable() {
    let mut browser = loaded(&store_with(&mixed_records()));

    browser.set_search_pattern("SESSION");
    browser.flush_search();

    assert_eq!(browser.pending_search(), None);
    assert_eq!(view_keys(&browser), vec!["session:abc", "session:def"]);
}

#[test]
fn result_from_previous_connection_is_ignored() {
    let old_store = store_with(&user_records());
    let mut browser = connected(&old_store);

    old_store.hold_scans();
    assert!(browser.load_keys());
    assert!(old_store.wait_for_blocked_scan(WAIT));

    let new_store = store_with(&mixed_records());
    browser.set_client(Some(new_store.as_api_arc()));
    assert!(!browser.is_loading());

    old_store.release_scans();
    drain_completions(&mut browser, 1);

    assert!(browser.snapshot().is_empty());
    assert_eq!(browser.status_line(), "0 keys");

    assert!(browser.load_keys());
    wait_for_load(&mut browser);
    assert_eq!(browser.snapshot().len(), mixed_records().len());
}

#[test]
fn switching_database_discards_in_flight_load() {
    let store = store_with(&user_records())
        .with_database_key(1, "orders:1", KeyType::Hash, TTL_NO_EXPIRY)
        .with_database_key(1, "orders:2", KeyType::Hash, 60);
    let mut browser = loaded(&store);
    browser.select_list_index(0);

    store.hold_scans();
    assert!(browser.load_keys());
    assert!(store.wait_for_blocked_scan(WAIT));

    browser.select_database(1).expect("switch database");
    assert!(browser.snapshot().is_empty());
    assert!(browser.selected_path().is_none());
    assert!(browser.is_loading());

    store.release_scans();
    wait_for_load(&mut browser);

    assert_eq!(view_keys(&browser), vec!["orders:1", "orders:2"]);
    assert_eq!(store.stats().selected_databases, vec![1]);
    assert!(!browser.load_failed());
}

#[test]
fn switching_database_requires_a_client() {
    let mut browser = KeyBrowser::new(BrowserConfig::default());
    assert!(matches!(
        browser.select_database(3),
        Err(DbError::NotConnected)
    ));
    assert!(!browser.is_loading());
}

#[test]
fn loading_without_client_clears_keys() {
    let store = store_with(&user_records());
    let mut browser = loaded(&store);
    assert_eq!(browser.snapshot().len(), 3);

    browser.set_client(None);
    assert!(!browser.load_keys());
    assert!(browser.snapshot().is_empty());
    assert!(!browser.is_connected());
    assert_eq!(browser.status_line(), "0 keys");
}

#[test]
fn selecting_a_row_notifies_listener() {
    let mut browser = loaded(&store_with(&mixed_records()));
    let selected = Rc::new(RefCell::new(Vec::new()));
    {
        let selected = selected.clone();
        browser.set_on_key_selected(move |record| selected.borrow_mut().push(record.key.clone()));
    }

    let index = browser
        .filtered_view()
        .position("queue:jobs")
        .expect("queue key");
    let record = browser.select_list_index(index).expect("record");

    assert_eq!(record.key_type, KeyType::List);
    assert_eq!(selected.borrow().as_slice(), ["queue:jobs".to_string()]);
    assert!(browser.select_list_index(999).is_none());
    assert_eq!(selected.borrow().len(), 1);
}

#[test]
fn selection_follows_the_view() {
    let mut browser = loaded(&store_with(&mixed_records()));
    let index = browser.filtered_view().position("leaderboard").expect("key");
    browser.select_list_index(index);

    browser.set_type_filter(TypeFilter::Only(KeyType::Hash));
    assert!(browser.selected_key().is_none());

    browser.set_type_filter(TypeFilter::All);
    assert_eq!(
        browser.selected_key().map(|record| record.key.as_str()),
        Some("leaderboard")
    );
}

#[test]
fn scope_from_list_selection_uses_parent_path() {
    let mut browser = loaded(&store_with(&mixed_records()));
    let index = browser.filtered_view().position("user:2:tags").expect("key");
    browser.select_list_index(index);

    assert_eq!(browser.set_scope_from_selection().as_deref(), Some("user:2"));
    assert_eq!(view_keys(&browser), vec!["user:2:name", "user:2:tags"]);

    let index = browser.filtered_view().position("user:2:name").expect("key");
    browser.select_list_index(index);
    browser.clear_scope();

    let index = browser.filtered_view().position("leaderboard").expect("key");
    browser.select_list_index(index);
    assert_eq!(browser.set_scope_from_selection(), None);
    assert_eq!(browser.scope(), None);
}

#[test]
fn scope_from_selection_ignores_filtered_out_key() {
    let mut browser = loaded(&store_with(&mixed_records()));
    let index = browser.filtered_view().position("user:2:tags").expect("key");
    browser.select_list_index(index);

    browser.set_type_filter(TypeFilter::Only(KeyType::Hash));
    assert!(browser.selected_key().is_none());

    assert_eq!(browser.set_scope_from_selection(), None);
    assert_eq!(browser.scope(), None);
    assert_eq!(view_keys(&browser), vec!["session:abc", "session:def"]);
}

#[test]
fn scope_from_tree_selection() {
    let mut browser = loaded(&store_with(&mixed_records()));
    browser.toggle_view_mode();

    assert!(browser.select_tree_path("user:1").is_none());
    assert_eq!(browser.set_scope_from_selection().as_deref(), Some("user:1"));
    assert_eq!(view_keys(&browser), vec!["user:1:age", "user:1:name"]);

    browser.clear_scope();
    assert!(browser.select_tree_path("session:abc").is_some());
    assert_eq!(browser.set_scope_from_selection().as_deref(), Some("session"));
    assert_eq!(browser.tree().map(|tree| tree.root().leaf_count()), Some(2));
}

#[test]
fn deleting_a_key_notifies_and_reloads() {
    let store = store_with(&mixed_records());
    let mut browser = loaded(&store);
    let deleted = Rc::new(RefCell::new(Vec::new()));
    {
        let deleted = deleted.clone();
        browser.set_on_key_deleted(move |key| deleted.borrow_mut().push(key.to_string()));
    }

    let index = browser.filtered_view().position("session:abc").expect("key");
    browser.select_list_index(index);

    let removed = browser.delete_selected_key().expect("delete");
    assert_eq!(removed.as_deref(), Some("session:abc"));
    assert_eq!(deleted.borrow().as_slice(), ["session:abc".to_string()]);
    assert_eq!(store.stats().deleted_keys, vec!["session:abc".to_string()]);
    assert!(browser.selected_path().is_none());
    assert!(browser.is_loading());

    wait_for_load(&mut browser);
    assert!(browser.filtered_view().find("session:abc").is_none());
    assert_eq!(browser.snapshot().len(), mixed_records().len() - 1);
}

#[test]
fn creating_a_key_reloads_with_it() {
    let store = store_with(&user_records());
    let mut browser = loaded(&store);

    browser
        .create_key("user:3:tags", KeyType::Set)
        .expect("create key");
    assert!(browser.is_loading());
    wait_for_load(&mut browser);

    let created = browser.filtered_view().find("user:3:tags").expect("new key");
    assert_eq!(created.key_type, KeyType::Set);
    assert_eq!(created.ttl_seconds, TTL_NO_EXPIRY);
    assert_eq!(
        store.stats().created_keys,
        vec![("user:3:tags".to_string(), KeyType::Set)]
    );
}

#[test]
fn invalid_key_creation_does_not_reload() {
    let store = store_with(&user_records());
    let mut browser = loaded(&store);
    let generation = browser.snapshot().generation();

    assert!(matches!(
        browser.create_key("  ", KeyType::String),
        Err(DbError::InvalidKey(_))
    ));
    assert!(matches!(
        browser.create_key("events", KeyType::Stream),
        Err(DbError::NotSupported(_))
    ));

    assert!(!browser.is_loading());
    assert_eq!(browser.snapshot().generation(), generation);
    assert!(store.stats().created_keys.is_empty());
}

#[test]
fn view_keeps_scan_order() {
    let store = FakeKeyStore::new()
        .with_scan_order(ScanOrder::Insertion)
        .with_keys([
            ("zeta", KeyType::String, TTL_NO_EXPIRY),
            ("user:2:name", KeyType::String, TTL_NO_EXPIRY),
            ("alpha", KeyType::Hash, TTL_NO_EXPIRY),
            ("user:1:name", KeyType::String, TTL_NO_EXPIRY),
        ]);
    let mut browser = loaded(&store);

    assert_eq!(
        view_keys(&browser),
        vec!["zeta", "user:2:name", "alpha", "user:1:name"]
    );

    browser.set_search_pattern("user");
    browser.flush_search();
    assert_eq!(view_keys(&browser), vec!["user:2:name", "user:1:name"]);
}

#[test]
fn folders_cannot_be_deleted() {
    let store = store_with(&mixed_records());
    let mut browser = loaded(&store);
    browser.toggle_view_mode();
    browser.select_tree_path("user");

    assert!(matches!(browser.delete_selected_key(), Ok(None)));
    assert!(store.stats().deleted_keys.is_empty());
    assert!(!browser.is_loading());
}

#[test]
fn auto_refresh_loads_silently() {
    let store = store_with(&user_records());
    let config = BrowserConfig::default().with_refresh_policy(RefreshPolicy::Interval { every_secs: 5 });
    let mut browser = connected_with(&store, config);
    let start = Instant::now();

    let errors = Rc::new(RefCell::new(0));
    {
        let errors = errors.clone();
        browser.set_on_load_error(move |_| *errors.borrow_mut() += 1);
    }

    browser.tick(start + Duration::from_secs(1));
    assert!(!browser.is_loading());

    store.insert_key("user:3:name", KeyType::String, TTL_NO_EXPIRY);
    browser.tick(start + Duration::from_secs(6));
    assert!(browser.is_loading());
    assert!(!browser.progress_visible());
    assert_eq!(browser.status_line(), "0 keys");

    wait_for_load(&mut browser);
    assert_eq!(browser.filtered_view().len(), 4);
    assert_eq!(
        browser.last_task().map(|task| task.kind.label()),
        Some("Auto Refresh")
    );

    store.fail_next_scans(1);
    browser.tick(start + Duration::from_secs(12));
    wait_for_load(&mut browser);

    assert_eq!(*errors.borrow(), 0);
    assert_eq!(browser.status_line(), "Error");
    assert_eq!(browser.snapshot().len(), 4);
}

#[test]
fn manual_policy_never_refreshes() {
    let store = store_with(&user_records());
    let mut browser = connected(&store);
    let start = Instant::now();

    browser.tick(start + Duration::from_secs(60));
    browser.tick(start + Duration::from_secs(600));

    assert!(!browser.is_loading());
    assert_eq!(store.stats().scan_calls(), 0);
}

#[test]
fn delimiter_change_rebuilds_tree() {
    let store = FakeKeyStore::new()
        .with_key("app/cache/a", KeyType::String, TTL_NO_EXPIRY)
        .with_key("app/cache/b", KeyType::String, TTL_NO_EXPIRY)
        .with_key("app:other", KeyType::String, TTL_NO_EXPIRY);
    let mut browser = loaded(&store);
    browser.toggle_view_mode();

    assert_eq!(browser.tree().map(|tree| tree.root().children().len()), Some(3));

    browser.apply_config(BrowserConfig::default().with_delimiter("/"));
    let tree = browser.tree().expect("tree");
    assert_eq!(tree.find("app").map(|node| node.leaf_count()), Some(2));
    assert!(tree.find("app:other").is_some());

    browser.toggle_view_mode();
    assert!(browser.tree().is_none());
}

#[test]
fn clear_drops_keys_and_scope() {
    let mut browser = loaded(&store_with(&mixed_records()));
    browser.set_scope("session");
    browser.clear();

    assert!(browser.snapshot().is_empty());
    assert_eq!(browser.scope(), None);
    assert!(browser.filtered_view().is_empty());
    assert!(browser.is_connected());
}
