use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::{
    BrowserConfig, DbError, Debouncer, FetchCompletion, FetchJob, FilterState, FilteredView,
    KeyRecord, KeyTree, KeyType, KeyValueApi, LoadCoordinator, LoadMode, LoadOutcome,
    RefreshSchedule, SelectionState, Snapshot, TaskSnapshot, TypeFilter, ViewMode,
    filter_snapshot,
};

pub type KeySelectedHandler = Box<dyn FnMut(&KeyRecord)>;
pub type KeyDeletedHandler = Box<dyn FnMut(&str)>;
pub type LoadErrorHandler = Box<dyn FnMut(&DbError)>;

/// Control-thread state of the key browser.
///
/// Fetches run on worker threads and report back through a channel; the
/// owner drives the browser by calling [`KeyBrowser::process_completions`]
/// and [`KeyBrowser::tick`] from its event loop. Nothing else touches the
/// snapshot, filter, tree or selection, so none of them need locking.
pub struct KeyBrowser {
    config: BrowserConfig,
    loader: LoadCoordinator,
    filter: FilterState,
    view: FilteredView,
    tree: Option<KeyTree>,
    selection: SelectionState,
    search: Debouncer<String>,
    refresh: RefreshSchedule,
    view_revision: u64,
    load_failed: bool,
    completions_tx: UnboundedSender<FetchCompletion>,
    completions_rx: UnboundedReceiver<FetchCompletion>,
    on_key_selected: Option<KeySelectedHandler>,
    on_key_deleted: Option<KeyDeletedHandler>,
    on_load_error: Option<LoadErrorHandler>,
}

impl KeyBrowser {
    pub fn new(config: BrowserConfig) -> Self {
        let config = config.normalized();
        let (completions_tx, completions_rx) = unbounded_channel();

        Self {
            loader: LoadCoordinator::new(&config),
            filter: FilterState::new(),
            view: FilteredView::empty(),
            tree: None,
            selection: SelectionState::default(),
            search: Debouncer::new(config.search_debounce()),
            refresh: RefreshSchedule::new(config.refresh_policy),
            view_revision: 0,
            load_failed: false,
            completions_tx,
            completions_rx,
            on_key_selected: None,
            on_key_deleted: None,
            on_load_error: None,
            config,
        }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    pub fn apply_config(&mut self, config: BrowserConfig) {
        let config = config.normalized();
        let delimiter_changed = config.delimiter != self.config.delimiter;

        self.loader.apply_config(&config);
        self.search.set_delay(config.search_debounce());
        self.refresh.set_policy(config.refresh_policy);
        self.config = config;

        if delimiter_changed {
            self.recompute();
        }
    }

    // -- Callbacks --

    pub fn set_on_key_selected(&mut self, handler: impl FnMut(&KeyRecord) + 'static) {
        self.on_key_selected = Some(Box::new(handler));
    }

    /// Called after a key was deleted so an attached editor can drop it.
    pub fn set_on_key_deleted(&mut self, handler: impl FnMut(&str) + 'static) {
        self.on_key_deleted = Some(Box::new(handler));
    }

    /// Called once per failed visible load.
    pub fn set_on_load_error(&mut self, handler: impl FnMut(&DbError) + 'static) {
        self.on_load_error = Some(Box::new(handler));
    }

    // -- Session --

    /// Attaches a store connection, or detaches with `None`.
    ///
    /// Starts a new session: keys and selection are cleared and a fetch
    /// still running for the previous connection is ignored when it lands.
    pub fn set_client(&mut self, api: Option<Arc<dyn KeyValueApi>>) {
        self.loader.attach(api);
        self.selection.clear();
        self.load_failed = false;
        self.refresh.reset(Instant::now());
        self.recompute();
    }

    pub fn is_connected(&self) -> bool {
        self.loader.is_attached()
    }

    /// Switches the connected store to another logical database and
    /// reloads.
    ///
    /// A fetch still running against the previous database is discarded
    /// when it lands. On error the current keys are left untouched.
    pub fn select_database(&mut self, database: u32) -> Result<(), DbError> {
        let api = self.loader.api().cloned().ok_or(DbError::NotConnected)?;
        api.select_database(database)?;
        log::info!("Selected database {}", database);

        self.loader.restart_session();
        self.selection.clear();
        self.load_failed = false;
        self.recompute();
        self.load_keys();
        Ok(())
    }

    /// Drops all keys, the selection and the scope.
    pub fn clear(&mut self) {
        self.loader.clear_snapshot();
        self.selection.clear();
        self.filter.clear_scope();
        self.load_failed = false;
        self.recompute();
    }

    // -- Loading --

    /// Starts a visible load. Returns `false` if nothing was started.
    pub fn load_keys(&mut self) -> bool {
        self.load(LoadMode::Visible)
    }

    /// Starts a load without progress indication or error reporting.
    pub fn load_keys_silent(&mut self) -> bool {
        self.load(LoadMode::Silent)
    }

    fn load(&mut self, mode: LoadMode) -> bool {
        if !self.loader.is_attached() {
            self.loader.clear_snapshot();
            self.load_failed = false;
            self.recompute();
            return false;
        }

        match self.begin_load(mode) {
            Some(job) => {
                self.spawn_fetch(job);
                true
            }
            None => false,
        }
    }

    /// Reserves the single fetch slot and hands the job to the caller, who
    /// must run it and pass the result to [`KeyBrowser::apply_completion`].
    pub fn begin_load(&mut self, mode: LoadMode) -> Option<FetchJob> {
        self.loader.begin(mode)
    }

    fn spawn_fetch(&mut self, job: FetchJob) {
        let ticket = job.ticket();
        let tx = self.completions_tx.clone();

        let spawned = thread::Builder::new()
            .name("keyflux-fetch".to_string())
            .spawn(move || {
                if tx.send(job.run()).is_err() {
                    log::debug!("Key browser dropped before fetch completed");
                }
            });

        if let Err(e) = spawned {
            log::error!("Failed to spawn fetch worker: {}", e);
            self.apply_completion(FetchCompletion::failed(ticket, DbError::IoError(e)));
        }
    }

    /// Applies every fetch result that has arrived since the last call.
    pub fn process_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.apply_completion(completion);
            applied += 1;
        }
        applied
    }

    pub fn apply_completion(&mut self, completion: FetchCompletion) {
        match self.loader.complete(completion) {
            LoadOutcome::Installed { .. } => {
                self.load_failed = false;
                self.recompute();
            }
            LoadOutcome::Failed { error, surface } => {
                self.load_failed = true;

                if surface {
                    log::error!("Error loading keys: {}", error);
                    if let Some(handler) = self.on_load_error.as_mut() {
                        handler(&error);
                    }
                } else {
                    log::warn!("Background key refresh failed: {}", error);
                }
            }
            LoadOutcome::Discarded => {}
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_fetching()
    }

    /// Whether the most recent load in this session failed.
    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    /// Whether a progress indicator should be shown.
    pub fn progress_visible(&self) -> bool {
        self.loader.fetching_mode() == Some(LoadMode::Visible)
    }

    pub fn snapshot(&self) -> &Snapshot {
        self.loader.snapshot()
    }

    pub fn last_task(&self) -> Option<TaskSnapshot> {
        self.loader.last_task()
    }

    pub fn status_line(&self) -> String {
        if self.progress_visible() {
            "Loading...".to_string()
        } else if self.load_failed {
            "Error".to_string()
        } else {
            format!("{} keys", self.view.len())
        }
    }

    // -- Timers --

    /// Advances the search debounce and auto-refresh timers to `now`.
    pub fn tick(&mut self, now: Instant) {
        if let Some(pattern) = self.search.poll(now) {
            self.filter.pattern = pattern;
            self.recompute();
        }

        if self.loader.is_attached() && self.refresh.poll(now) {
            self.load_keys_silent();
        }
    }

    // -- Filters --

    pub fn set_search_pattern(&mut self, text: impl Into<String>) {
        self.set_search_pattern_at(text, Instant::now());
    }

    /// Schedules `text` to be applied once no further edit arrives within
    /// the debounce window.
    pub fn set_search_pattern_at(&mut self, text: impl Into<String>, now: Instant) {
        self.search.schedule(text.into(), now);
    }

    /// Applies a pending search edit immediately.
    pub fn flush_search(&mut self) {
        if let Some(pattern) = self.search.cancel() {
            self.filter.pattern = pattern;
            self.recompute();
        }
    }

    pub fn search_pattern(&self) -> &str {
        &self.filter.pattern
    }

    pub fn pending_search(&self) -> Option<&str> {
        self.search.pending().map(String::as_str)
    }

    pub fn set_type_filter(&mut self, type_filter: TypeFilter) {
        self.filter.type_filter = type_filter;
        self.recompute();
    }

    pub fn type_filter(&self) -> TypeFilter {
        self.filter.type_filter
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filter
    }

    // -- Scope --

    pub fn set_scope(&mut self, path: impl Into<String>) {
        self.filter.set_scope(path);
        self.recompute();
    }

    pub fn clear_scope(&mut self) {
        self.filter.clear_scope();
        self.recompute();
    }

    pub fn scope(&self) -> Option<&str> {
        self.filter.scope()
    }

    /// Narrows the scope to the selection: a folder's own path, or the
    /// parent path of a key. Returns the applied scope.
    pub fn set_scope_from_selection(&mut self) -> Option<String> {
        let scope = match self.selection.mode() {
            ViewMode::List => {
                let record = self.selected_key()?;
                parent_path(&record.key, &self.config.delimiter)
            }
            ViewMode::Tree => {
                let path = self.selection.selected_path()?;
                let node = self.tree.as_ref()?.find(path)?;
                if node.is_folder() {
                    Some(node.path.as_str())
                } else {
                    parent_path(path, &self.config.delimiter)
                }
            }
        }?
        .to_string();

        self.set_scope(scope.clone());
        Some(scope)
    }

    // -- View --

    pub fn view_mode(&self) -> ViewMode {
        self.selection.mode()
    }

    /// Switches between list and tree. The tree is built on entry and
    /// dropped on exit.
    pub fn toggle_view_mode(&mut self) -> ViewMode {
        let mode = self.selection.mode().toggled();
        self.selection.set_mode(mode);

        self.tree = match mode {
            ViewMode::Tree => Some(KeyTree::build(&self.view, &self.config.delimiter)),
            ViewMode::List => None,
        };

        mode
    }

    pub fn filtered_view(&self) -> &FilteredView {
        &self.view
    }

    /// The tree index; only present in tree mode.
    pub fn tree(&self) -> Option<&KeyTree> {
        self.tree.as_ref()
    }

    /// Incremented on every recomputation of the filtered view.
    pub fn view_revision(&self) -> u64 {
        self.view_revision
    }

    fn recompute(&mut self) {
        self.view = filter_snapshot(self.loader.snapshot(), &self.filter, &self.config.delimiter);
        self.view_revision += 1;

        if self.selection.mode() == ViewMode::Tree {
            self.tree = Some(KeyTree::build(&self.view, &self.config.delimiter));
        }
    }

    // -- Selection --

    pub fn select_list_index(&mut self, index: usize) -> Option<KeyRecord> {
        let record = self.view.get(index)?.clone();
        self.selection.select(ViewMode::List, record.key.clone());

        if let Some(handler) = self.on_key_selected.as_mut() {
            handler(&record);
        }

        Some(record)
    }

    /// Selects a tree node. Returns the record when the node is a key.
    pub fn select_tree_path(&mut self, path: &str) -> Option<KeyRecord> {
        let node = self.tree.as_ref()?.find(path)?;
        let record = node.record.clone();
        self.selection.select(ViewMode::Tree, path);

        if let (Some(record), Some(handler)) = (record.as_ref(), self.on_key_selected.as_mut()) {
            handler(record);
        }

        record
    }

    pub fn selected_path(&self) -> Option<&str> {
        self.selection.selected_path()
    }

    /// The selected key, if it is still part of the current view.
    pub fn selected_key(&self) -> Option<&KeyRecord> {
        self.view.find(self.selection.selected_path()?)
    }

    /// Creates an empty key of the given type and reloads.
    pub fn create_key(&mut self, key: &str, key_type: KeyType) -> Result<(), DbError> {
        if key.trim().is_empty() {
            return Err(DbError::InvalidKey("key name is empty".to_string()));
        }

        let api = self.loader.api().cloned().ok_or(DbError::NotConnected)?;
        api.create_key(key, key_type)?;
        log::info!("Created {} key {}", key_type, key);

        self.load_keys();
        Ok(())
    }

    /// Deletes the selected key from the store and reloads.
    ///
    /// Returns `Ok(None)` when nothing deletable is selected (e.g. a folder).
    pub fn delete_selected_key(&mut self) -> Result<Option<String>, DbError> {
        let Some(key) = self.selected_key().map(|record| record.key.clone()) else {
            return Ok(None);
        };

        let api = self.loader.api().cloned().ok_or(DbError::NotConnected)?;
        api.delete_key(&key)?;
        log::info!("Deleted key {}", key);

        self.selection.forget(&key);
        if let Some(handler) = self.on_key_deleted.as_mut() {
            handler(&key);
        }

        self.load_keys();
        Ok(Some(key))
    }
}

/// Everything before the last delimiter, if that is non-empty.
fn parent_path<'a>(key: &'a str, delimiter: &str) -> Option<&'a str> {
    if delimiter.is_empty() {
        return None;
    }

    key.rfind(delimiter)
        .filter(|&index| index > 0)
        .map(|index| &key[..index])
}
