use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_SCAN_COUNT, DbError, RefreshPolicy};

pub const DEFAULT_DELIMITER: &str = ":";
pub const DEFAULT_FETCH_LIMIT: usize = 10_000;
pub const DEFAULT_SCAN_PATTERN: &str = "*";
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;

/// Settings for the key browser, passed in at construction and replaced
/// explicitly through `KeyBrowser::apply_config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Separator used to derive the tree from flat key names.
    pub delimiter: String,

    /// `SCAN COUNT` hint per enumeration step.
    pub scan_count: u32,

    /// Maximum number of keys collected by one fetch.
    pub fetch_limit: usize,

    /// Glob passed to `SCAN MATCH`.
    pub scan_pattern: String,

    /// Quiet period before a search edit is applied.
    pub search_debounce_ms: u64,

    pub refresh_policy: RefreshPolicy,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            scan_count: DEFAULT_SCAN_COUNT,
            fetch_limit: DEFAULT_FETCH_LIMIT,
            scan_pattern: DEFAULT_SCAN_PATTERN.to_string(),
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            refresh_policy: RefreshPolicy::Manual,
        }
    }
}

impl BrowserConfig {
    /// Replaces zero or empty values with their defaults.
    pub fn normalized(mut self) -> Self {
        if self.delimiter.is_empty() {
            self.delimiter = DEFAULT_DELIMITER.to_string();
        }
        if self.scan_count == 0 {
            self.scan_count = DEFAULT_SCAN_COUNT;
        }
        if self.fetch_limit == 0 {
            self.fetch_limit = DEFAULT_FETCH_LIMIT;
        }
        if self.scan_pattern.trim().is_empty() {
            self.scan_pattern = DEFAULT_SCAN_PATTERN.to_string();
        }
        if self.search_debounce_ms == 0 {
            self.search_debounce_ms = DEFAULT_SEARCH_DEBOUNCE_MS;
        }
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

/// Reads and writes `config.json` under the user's config directory.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new() -> Result<Self, DbError> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            DbError::IoError(std::io::Error::other("Could not find config directory"))
        })?;

        let app_dir = config_dir.join("keyflux");
        fs::create_dir_all(&app_dir)?;

        Ok(Self {
            path: app_dir.join("config.json"),
        })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the config, falling back to defaults when the file is missing.
    pub fn load(&self) -> Result<BrowserConfig, DbError> {
        if !self.path.exists() {
            return Ok(BrowserConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let config: BrowserConfig = serde_json::from_str(&content)
            .map_err(|e| DbError::InvalidConfig(format!("{}: {}", self.path.display(), e)))?;

        Ok(config.normalized())
    }

    pub fn save(&self, config: &BrowserConfig) -> Result<(), DbError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(config)
            .map_err(|e| DbError::InvalidConfig(e.to_string()))?;
        fs::write(&self.path, content)?;

        log::info!("Saved browser config to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
