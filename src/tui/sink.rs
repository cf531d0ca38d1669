//! Render sink shared between the refresh worker and the UI
//!
//! The worker thread writes render instructions; the UI reads the latest one
//! per instance on every redraw. Closing a tab detaches its instance, which
//! the controller notices on its next cycle or scheduler tick.

use crate::table::{InstanceId, RenderInstruction, RenderSink, TargetHandle};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Views {
    latest: HashMap<InstanceId, RenderInstruction>,
    detached: HashSet<InstanceId>,
    /// Bumped on every render so the UI can tell something changed
    generation: u64,
}

/// Latest render per instance, readable from the UI
#[derive(Debug, Clone, Default)]
pub struct SharedViews {
    inner: Arc<Mutex<Views>>,
}

impl SharedViews {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Views> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Most recent instruction rendered for `id`
    pub fn latest(&self, id: &InstanceId) -> Option<RenderInstruction> {
        self.lock().latest.get(id).cloned()
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Remove the instance's render target
    pub fn detach(&self, id: &InstanceId) {
        let mut views = self.lock();
        views.latest.remove(id);
        views.detached.insert(id.clone());
    }

    /// Sink half, handed to the controller
    pub fn sink(&self) -> TuiSink {
        TuiSink {
            views: self.clone(),
        }
    }
}

/// [`RenderSink`] writing into [`SharedViews`]
pub struct TuiSink {
    views: SharedViews,
}

impl RenderSink for TuiSink {
    fn render(&mut self, target: &TargetHandle, instruction: RenderInstruction) {
        let mut views = self.views.lock();
        if views.detached.contains(&target.region) {
            return;
        }
        views.latest.insert(target.region.clone(), instruction);
        views.generation += 1;
    }

    fn is_attached(&self, target: &TargetHandle) -> bool {
        !self.views.lock().detached.contains(&target.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WidgetKind;
    use crate::pagination::PaginationControl;

    fn instruction(summary: &str) -> RenderInstruction {
        RenderInstruction {
            kind: WidgetKind::List,
            header_columns: Vec::new(),
            rows: Vec::new(),
            footer: None,
            pagination: PaginationControl::empty(),
            summary: summary.to_string(),
        }
    }

    #[test]
    fn test_sink_publishes_latest_render() {
        let views = SharedViews::new();
        let mut sink = views.sink();
        let id = InstanceId::from("feed");
        let target = TargetHandle::new(id.clone());

        sink.render(&target, instruction("first"));
        sink.render(&target, instruction("second"));

        assert_eq!(views.generation(), 2);
        assert_eq!(views.latest(&id).map(|i| i.summary), Some("second".to_string()));
    }

    #[test]
    fn test_detached_instance_stops_rendering() {
        let views = SharedViews::new();
        let mut sink = views.sink();
        let id = InstanceId::from("feed");
        let target = TargetHandle::new(id.clone());

        sink.render(&target, instruction("first"));
        views.detach(&id);
        assert!(!sink.is_attached(&target));

        sink.render(&target, instruction("late"));
        assert!(views.latest(&id).is_none());
        assert!(sink.is_attached(&TargetHandle::new("other")));
    }
}
