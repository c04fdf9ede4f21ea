#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    List,
    Tree,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::List => ViewMode::Tree,
            ViewMode::Tree => ViewMode::List,
        }
    }
}

/// Current view mode plus the selection remembered for each mode.
///
/// Selections are stored by key or path, never by row index, so they can be
/// resolved again after the view is recomputed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    mode: ViewMode,
    list: Option<String>,
    tree: Option<String>,
}

impl SelectionState {
    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
    }

    /// Selected key (list mode) or node path (tree mode) for the active mode.
    pub fn selected_path(&self) -> Option<&str> {
        self.selected_path_in(self.mode)
    }

    pub fn selected_path_in(&self, mode: ViewMode) -> Option<&str> {
        match mode {
            ViewMode::List => self.list.as_deref(),
            ViewMode::Tree => self.tree.as_deref(),
        }
    }

    pub fn select(&mut self, mode: ViewMode, path: impl Into<String>) {
        let path = Some(path.into());
        match mode {
            ViewMode::List => self.list = path,
            ViewMode::Tree => self.tree = path,
        }
    }

    pub fn clear(&mut self) {
        self.list = None;
        self.tree = None;
    }

    /// Drops `key` from every mode that currently selects it.
    pub fn forget(&mut self, key: &str) {
        if self.list.as_deref() == Some(key) {
            self.list = None;
        }
        if self.tree.as_deref() == Some(key) {
            self.tree = None;
        }
    }
}
