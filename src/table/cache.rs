//! Last-response cache for change detection

use serde_json::Value;

/// Whether two snapshots are identical
///
/// Absence on either side (including both) counts as a change so the first
/// payload after bind always renders. Present snapshots are compared by
/// their full serialization; key order matters because field order drives
/// column introspection.
pub fn is_unchanged(previous: Option<&Value>, current: Option<&Value>) -> bool {
    match (previous, current) {
        (Some(previous), Some(current)) => serialize(previous) == serialize(current),
        _ => false,
    }
}

fn serialize(value: &Value) -> String {
    // Serializing a `Value` cannot fail: keys are always strings
    serde_json::to_string(value).unwrap_or_default()
}

/// Holds the last full payload seen by one instance
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    snapshot: Option<Value>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `current` matches the stored snapshot
    pub fn is_unchanged(&self, current: &Value) -> bool {
        is_unchanged(self.snapshot.as_ref(), Some(current))
    }

    /// Replace the stored snapshot
    pub fn store(&mut self, snapshot: Value) {
        self.snapshot = Some(snapshot);
    }

    pub fn snapshot(&self) -> Option<&Value> {
        self.snapshot.as_ref()
    }

    pub fn clear(&mut self) {
        self.snapshot = None;
    }
}
