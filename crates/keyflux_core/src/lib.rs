mod app_config;
mod browser;
mod debounce;
mod error;
mod fetcher;
mod filter;
mod key_tree;
mod key_value;
mod loader;
mod refresh_policy;
mod selection;
mod task;
mod traits;

pub use app_config::{
    BrowserConfig, ConfigStore, DEFAULT_DELIMITER, DEFAULT_FETCH_LIMIT, DEFAULT_SCAN_PATTERN,
    DEFAULT_SEARCH_DEBOUNCE_MS,
};
pub use browser::{KeyBrowser, KeyDeletedHandler, KeySelectedHandler, LoadErrorHandler};
pub use debounce::{DEFAULT_SEARCH_DEBOUNCE, Debouncer};
pub use error::DbError;
pub use fetcher::{DEFAULT_SCAN_COUNT, KeyFetcher};
pub use filter::{FilterState, FilteredView, filter_records, filter_snapshot};
pub use key_tree::{KeyTree, KeyTreeNode, NodeId, ROOT};
pub use key_value::{
    KeyRecord, KeyScanPage, KeyScanRequest, KeyType, TTL_MISSING, TTL_NO_EXPIRY, TypeFilter,
};
pub use loader::{
    FetchCompletion, FetchJob, FetchTicket, LoadCoordinator, LoadMode, LoadOutcome, LoadState,
    Snapshot,
};
pub use refresh_policy::{RefreshPolicy, RefreshSchedule};
pub use selection::{SelectionState, ViewMode};
pub use task::{Task, TaskId, TaskKind, TaskSnapshot, TaskStatus};
pub use traits::KeyValueApi;
