//! Bound widget instances and the store that owns them

use super::cache::ResponseCache;
use super::retry::RetryPolicy;
use crate::config::InstanceConfig;
use crate::pagination::{PaginationState, SortOrder};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Identity of a bound widget (the render target's id)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for InstanceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to the region an instance renders into
///
/// Held by the instance so rendering never has to rediscover its target.
/// Sinks key renders and attachment on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetHandle {
    /// Render region (a TUI tab, a headless table block)
    pub region: InstanceId,
}

impl TargetHandle {
    pub fn new(region: impl Into<InstanceId>) -> Self {
        Self {
            region: region.into(),
        }
    }
}

impl fmt::Display for TargetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.region, f)
    }
}

/// Where an instance is in its refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePhase {
    #[default]
    Idle,
    Fetching,
    /// Waiting before another attempt after a timeout
    RetryWait,
    Rendering,
    /// Payload was empty or unchanged; nothing rendered
    Skipped,
}

/// One bound table, list or select
#[derive(Debug, Clone)]
pub struct TableInstance {
    pub id: InstanceId,
    pub config: InstanceConfig,
    pub state: PaginationState,
    /// `None` for instances that never poll
    pub reload_delay_minutes: Option<u32>,
    /// Last successful load
    pub last_update: DateTime<Utc>,
    pub retry: RetryPolicy,
    pub cache: ResponseCache,
    pub target: TargetHandle,
    pub phase: CyclePhase,
    /// Direction marker last applied to each sortable column
    pub sort_markers: HashMap<String, SortOrder>,
    /// Supplied payload used instead of fetching
    pub supplied: Option<serde_json::Value>,
}

impl TableInstance {
    pub fn new(id: InstanceId, config: InstanceConfig, target: TargetHandle) -> Self {
        let retry = RetryPolicy::new(config.ajax.max_retries, config.ajax.retry_delay());

        Self {
            state: config.pagination.clone(),
            reload_delay_minutes: config.ajax.reload_delay_minutes,
            last_update: Utc::now(),
            retry,
            cache: ResponseCache::new(),
            target,
            phase: CyclePhase::Idle,
            sort_markers: HashMap::new(),
            supplied: None,
            id,
            config,
        }
    }

    /// Move to `phase`, logging the transition
    pub fn enter(&mut self, phase: CyclePhase) {
        if self.phase != phase {
            tracing::trace!("{}: {:?} -> {:?}", self.id, self.phase, phase);
            self.phase = phase;
        }
    }

    pub fn history_key(&self) -> String {
        self.config.history_key(self.id.as_str())
    }

    /// Apply a header click: flip the column's marker and sort by it
    ///
    /// A column without a marker counts as already descending, so the
    /// first click sorts ascending.
    pub fn toggle_sort(&mut self, column: &str) -> SortOrder {
        let current = self
            .sort_markers
            .get(column)
            .copied()
            .unwrap_or(SortOrder::Desc);
        let next = current.toggled();

        self.sort_markers.insert(column.to_string(), next);
        self.state.order = next;
        self.state.order_by = column.to_string();
        next
    }
}

/// Owner of every bound instance, keyed by id
#[derive(Debug, Default)]
pub struct InstanceStore {
    instances: BTreeMap<InstanceId, TableInstance>,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an instance
    pub fn insert(&mut self, instance: TableInstance) -> Option<TableInstance> {
        self.instances.insert(instance.id.clone(), instance)
    }

    pub fn get(&self, id: &InstanceId) -> Option<&TableInstance> {
        self.instances.get(id)
    }

    pub fn get_mut(&mut self, id: &InstanceId) -> Option<&mut TableInstance> {
        self.instances.get_mut(id)
    }

    pub fn remove(&mut self, id: &InstanceId) -> Option<TableInstance> {
        self.instances.remove(id)
    }

    pub fn ids(&self) -> Vec<InstanceId> {
        self.instances.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableInstance> {
        self.instances.values()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: &str) -> TableInstance {
        TableInstance::new(
            InstanceId::from(id),
            InstanceConfig::default(),
            TargetHandle::new(id),
        )
    }

    #[test]
    fn test_sort_toggle_alternates_from_implicit_desc() {
        let mut table = instance("users");

        assert_eq!(table.toggle_sort("name"), SortOrder::Asc);
        assert_eq!(table.state.order_by, "name");
        assert_eq!(table.toggle_sort("name"), SortOrder::Desc);
        assert_eq!(table.toggle_sort("name"), SortOrder::Asc);

        // Another column starts from its own (absent) marker
        assert_eq!(table.toggle_sort("email"), SortOrder::Asc);
        assert_eq!(table.state.order_by, "email");
        assert_eq!(table.toggle_sort("name"), SortOrder::Desc);
    }

    #[test]
    fn test_new_instance_copies_config() {
        let mut config = InstanceConfig::default();
        config.pagination.limit = 5;
        config.ajax.reload_delay_minutes = Some(3);
        config.ajax.max_retries = 4;
        config.table.prefix = "app_".to_string();

        let table = TableInstance::new(InstanceId::from("t"), config, TargetHandle::new("t"));
        assert_eq!(table.state.limit, 5);
        assert_eq!(table.reload_delay_minutes, Some(3));
        assert_eq!(table.retry.max_retries(), 4);
        assert_eq!(table.phase, CyclePhase::Idle);
        assert_eq!(table.history_key(), "app_t_pagination");
    }

    #[test]
    fn test_store_is_ordered_by_id() {
        let mut store = InstanceStore::new();
        store.insert(instance("b"));
        store.insert(instance("a"));
        assert_eq!(store.ids(), vec![InstanceId::from("a"), InstanceId::from("b")]);

        assert!(store.remove(&InstanceId::from("a")).is_some());
        assert_eq!(store.len(), 1);
        assert!(store.get(&InstanceId::from("a")).is_none());
    }
}
