use crate::{KeyRecord, Snapshot, TypeFilter};

/// User-controlled predicates applied to a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    /// Case-insensitive substring to search for in key names.
    pub pattern: String,
    pub type_filter: TypeFilter,
    /// Path prefix restricting the view to a subtree. `None` shows everything.
    pub scope: Option<String>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn with_type_filter(mut self, type_filter: TypeFilter) -> Self {
        self.type_filter = type_filter;
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.set_scope(scope);
        self
    }

    /// Sets the scope; an empty string clears it.
    pub fn set_scope(&mut self, scope: impl Into<String>) {
        let scope = scope.into();
        self.scope = if scope.is_empty() { None } else { Some(scope) };
    }

    pub fn clear_scope(&mut self) {
        self.scope = None;
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }
}

/// Snapshot records that pass the current filter, in snapshot order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredView {
    records: Vec<KeyRecord>,
}

impl FilteredView {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&KeyRecord> {
        self.records.get(index)
    }

    pub fn records(&self) -> &[KeyRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyRecord> {
        self.records.iter()
    }

    pub fn find(&self, key: &str) -> Option<&KeyRecord> {
        self.records.iter().find(|record| record.key == key)
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.records.iter().position(|record| record.key == key)
    }
}

/// Applies scope, type and search predicates to every record in `snapshot`.
pub fn filter_snapshot(snapshot: &Snapshot, state: &FilterState, delimiter: &str) -> FilteredView {
    filter_records(snapshot.records(), state, delimiter)
}

pub fn filter_records(records: &[KeyRecord], state: &FilterState, delimiter: &str) -> FilteredView {
    let needle = state.pattern.to_lowercase();
    let scope_prefix = state
        .scope()
        .map(|scope| format!("{}{}", scope, delimiter));

    let records = records
        .iter()
        .filter(|record| {
            in_scope(&record.key, state.scope(), scope_prefix.as_deref())
                && state.type_filter.matches(record.key_type)
                && (needle.is_empty() || record.key.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect();

    FilteredView { records }
}

fn in_scope(key: &str, scope: Option<&str>, scope_prefix: Option<&str>) -> bool {
    match (scope, scope_prefix) {
        (Some(scope), Some(prefix)) => key == scope || key.starts_with(prefix),
        _ => true,
    }
}
