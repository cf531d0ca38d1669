//! Key/value storage for pagination history
//!
//! Values are opaque strings with a time-to-live in days. Instances store
//! their JSON-serialized pagination state here so a restart picks up on the
//! same page and sort.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Days pagination history is kept
pub const HISTORY_TTL_DAYS: u32 = 365;

pub trait PersistenceStore: Send {
    /// Stored value, `None` when missing or expired
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str, ttl_days: u32) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Entry {
    fn new(value: &str, ttl_days: u32) -> Self {
        Self {
            value: value.to_string(),
            expires_at: Utc::now() + Duration::days(i64::from(ttl_days)),
        }
    }

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File store
// ─────────────────────────────────────────────────────────────────────────────

/// JSON file of `key -> {value, expires_at}`
///
/// The whole file is read and rewritten on every call; history is a handful
/// of small entries.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store at `<dir>/history.json`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("history.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, Entry>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    fn save(&self, entries: &HashMap<String, Entry>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    /// Load, drop expired entries, apply `edit`, save
    fn update(&self, edit: impl FnOnce(&mut HashMap<String, Entry>)) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.load().unwrap_or_else(|e| {
            tracing::warn!("Discarding unreadable history: {:#}", e);
            HashMap::new()
        });

        let now = Utc::now();
        entries.retain(|_, entry| entry.is_live(now));
        edit(&mut entries);
        self.save(&entries)
    }
}

impl PersistenceStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        match self.load() {
            Ok(entries) => entries
                .get(key)
                .filter(|entry| entry.is_live(Utc::now()))
                .map(|entry| entry.value.clone()),
            Err(e) => {
                tracing::warn!("History unavailable: {:#}", e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str, ttl_days: u32) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), Entry::new(value, ttl_days));
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory store
// ─────────────────────────────────────────────────────────────────────────────

/// In-process store; clones share the same entries
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|entry| entry.is_live(Utc::now()))
            .map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: &str, ttl_days: u32) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("history lock poisoned"))?;
        entries.insert(key.to_string(), Entry::new(value, ttl_days));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("history lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("jsontable-test-{}-{}", std::process::id(), name))
            .join("history.json")
    }

    #[test]
    fn test_file_store_round_trip() {
        let path = temp_path("round-trip");
        let store = FileStore::new(&path);

        assert_eq!(store.get("users_pagination"), None);
        store.set("users_pagination", r#"{"page":3}"#, 365).unwrap();
        assert_eq!(
            store.get("users_pagination").as_deref(),
            Some(r#"{"page":3}"#)
        );

        // A second handle on the same file sees the entry
        let reopened = FileStore::new(&path);
        assert!(reopened.get("users_pagination").is_some());

        store.remove("users_pagination").unwrap();
        assert_eq!(reopened.get("users_pagination"), None);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_store_expires_entries() {
        let path = temp_path("expiry");
        let store = FileStore::new(&path);

        store.set("old", "1", 0).unwrap();
        store.set("new", "2", 1).unwrap();
        assert_eq!(store.get("old"), None);
        assert_eq!(store.get("new").as_deref(), Some("2"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_file_store_ignores_corrupt_file() {
        let path = temp_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path);
        assert_eq!(store.get("anything"), None);
        store.set("k", "v", 1).unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_memory_store_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();

        store.set("k", "v", 365).unwrap();
        assert_eq!(other.get("k").as_deref(), Some("v"));

        other.remove("k").unwrap();
        assert_eq!(store.get("k"), None);
    }
}
