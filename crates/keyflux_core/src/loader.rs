use std::sync::Arc;

use crate::{
    BrowserConfig, DbError, KeyFetcher, KeyRecord, KeyValueApi, Task, TaskId, TaskKind,
    TaskSnapshot,
};

/// Immutable result of one successful fetch.
///
/// Cloning is cheap; a new fetch replaces the snapshot instead of mutating
/// it. `generation` increases with every replacement.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    generation: u64,
    records: Arc<[KeyRecord]>,
}

impl Snapshot {
    pub fn new(generation: u64, records: Vec<KeyRecord>) -> Self {
        Self {
            generation,
            records: records.into(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn records(&self) -> &[KeyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// User-initiated: shows progress and surfaces errors.
    Visible,
    /// Auto-refresh: no progress indication, errors are only logged.
    Silent,
}

impl LoadMode {
    fn task_kind(self) -> TaskKind {
        match self {
            LoadMode::Visible => TaskKind::KeyScan,
            LoadMode::Silent => TaskKind::AutoRefresh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Fetching { mode: LoadMode, task_id: TaskId },
}

/// A fetch ready to run off the control thread.
///
/// Running it only reads from the store; the returned [`FetchCompletion`]
/// must be handed back to [`LoadCoordinator::complete`] on the control
/// thread.
pub struct FetchJob {
    ticket: FetchTicket,
    fetcher: KeyFetcher,
    pattern: String,
    limit: usize,
}

/// Identifies which fetch a completion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub session: u64,
    pub task_id: TaskId,
    pub mode: LoadMode,
}

impl FetchJob {
    pub fn ticket(&self) -> FetchTicket {
        self.ticket
    }

    pub fn run(self) -> FetchCompletion {
        let result = self.fetcher.fetch_all(&self.pattern, self.limit);
        FetchCompletion {
            ticket: self.ticket,
            result,
        }
    }
}

pub struct FetchCompletion {
    pub ticket: FetchTicket,
    pub result: Result<Vec<KeyRecord>, DbError>,
}

impl FetchCompletion {
    pub fn failed(ticket: FetchTicket, error: DbError) -> Self {
        Self {
            ticket,
            result: Err(error),
        }
    }
}

/// What applying a completion did to the coordinator.
#[derive(Debug)]
pub enum LoadOutcome {
    /// A new snapshot replaced the previous one.
    Installed { generation: u64, count: usize },
    /// The fetch failed; the previous snapshot is kept. `surface` is set
    /// for visible loads.
    Failed { error: DbError, surface: bool },
    /// The completion belongs to a detached session or an unknown fetch.
    Discarded,
}

/// Owns the authoritative snapshot and enforces single-flight loading.
///
/// All methods run on the control thread. While a fetch is in flight,
/// further load requests are dropped, not queued.
pub struct LoadCoordinator {
    api: Option<Arc<dyn KeyValueApi>>,
    scan_count: u32,
    scan_pattern: String,
    fetch_limit: usize,
    session: u64,
    state: LoadState,
    snapshot: Snapshot,
    next_generation: u64,
    task: Option<Task>,
}

impl LoadCoordinator {
    pub fn new(config: &BrowserConfig) -> Self {
        Self {
            api: None,
            scan_count: config.scan_count,
            scan_pattern: config.scan_pattern.clone(),
            fetch_limit: config.fetch_limit,
            session: 0,
            state: LoadState::Idle,
            snapshot: Snapshot::default(),
            next_generation: 1,
            task: None,
        }
    }

    pub fn apply_config(&mut self, config: &BrowserConfig) {
        self.scan_count = config.scan_count;
        self.scan_pattern = config.scan_pattern.clone();
        self.fetch_limit = config.fetch_limit;
    }

    /// Binds a store connection (or none) and starts a new session.
    ///
    /// The snapshot is cleared and any fetch still running for the old
    /// session will be discarded when it completes. State goes back to
    /// `Idle` without waiting for that worker, so a fetch for the new
    /// session may run alongside the stale one. Single-flight holds per
    /// session only.
    pub fn attach(&mut self, api: Option<Arc<dyn KeyValueApi>>) {
        self.api = api;
        self.restart_session();
    }

    /// Starts a new session on the same connection, e.g. after the store
    /// switched its logical database. Same discard rules as [`attach`].
    ///
    /// [`attach`]: LoadCoordinator::attach
    pub fn restart_session(&mut self) {
        self.session += 1;
        self.state = LoadState::Idle;
        self.task = None;
        self.clear_snapshot();
    }

    pub fn api(&self) -> Option<&Arc<dyn KeyValueApi>> {
        self.api.as_ref()
    }

    pub fn is_attached(&self) -> bool {
        self.api.is_some()
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn is_fetching(&self) -> bool {
        matches!(self.state, LoadState::Fetching { .. })
    }

    pub fn fetching_mode(&self) -> Option<LoadMode> {
        match self.state {
            LoadState::Fetching { mode, .. } => Some(mode),
            LoadState::Idle => None,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The running fetch, or the last one to finish in this session.
    pub fn last_task(&self) -> Option<TaskSnapshot> {
        self.task.as_ref().map(TaskSnapshot::from)
    }

    /// Replaces the snapshot with an empty one.
    pub fn clear_snapshot(&mut self) {
        self.snapshot = Snapshot::new(self.bump_generation(), Vec::new());
    }

    /// Starts a fetch if none is in flight and a store is attached.
    pub fn begin(&mut self, mode: LoadMode) -> Option<FetchJob> {
        if let LoadState::Fetching { mode: running, .. } = self.state {
            log::debug!("Dropping {:?} load request: {:?} fetch in flight", mode, running);
            return None;
        }

        let api = self.api.clone()?;
        let task = Task::start(mode.task_kind(), format!("SCAN {}", self.scan_pattern));
        let ticket = FetchTicket {
            session: self.session,
            task_id: task.id,
            mode,
        };

        self.state = LoadState::Fetching {
            mode,
            task_id: task.id,
        };
        self.task = Some(task);

        Some(FetchJob {
            ticket,
            fetcher: KeyFetcher::new(api).with_scan_count(self.scan_count),
            pattern: self.scan_pattern.clone(),
            limit: self.fetch_limit,
        })
    }

    /// Applies a finished fetch.
    pub fn complete(&mut self, completion: FetchCompletion) -> LoadOutcome {
        let ticket = completion.ticket;
        let expected = LoadState::Fetching {
            mode: ticket.mode,
            task_id: ticket.task_id,
        };

        if ticket.session != self.session || self.state != expected {
            log::debug!(
                "Discarding stale fetch result (session {}, current {})",
                ticket.session,
                self.session
            );
            return LoadOutcome::Discarded;
        }

        self.state = LoadState::Idle;

        match completion.result {
            Ok(records) => {
                if let Some(task) = self.task.as_mut() {
                    task.complete();
                }

                let count = records.len();
                let generation = self.bump_generation();
                self.snapshot = Snapshot::new(generation, records);
                log::info!("Loaded {} keys (generation {})", count, generation);

                LoadOutcome::Installed { generation, count }
            }
            Err(error) => {
                if let Some(task) = self.task.as_mut() {
                    task.fail(error.to_string());
                }

                LoadOutcome::Failed {
                    error,
                    surface: ticket.mode == LoadMode::Visible,
                }
            }
        }
    }

    fn bump_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }
}
