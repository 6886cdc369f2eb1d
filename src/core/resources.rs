//! Tensor buffer lifecycle tracking.
//!
//! The tensor runtime does not reclaim device-resident buffers on its own, so
//! every buffer created during preprocessing, warm-up, or inference must be
//! registered in a scope and released when the scope ends. A [`TensorScope`]
//! releases everything it holds when dropped, on success and error paths
//! alike. Model parameter buffers live in a long-lived scope owned by the
//! loaded model and are released exactly once on hot-swap or teardown.
//!
//! [`ResourceTracker::live_buffers`] exposes the census so tests can assert
//! that a cycle returns the pipeline to its pre-cycle baseline.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug)]
struct BufferRecord {
    label: String,
    bytes: usize,
}

#[derive(Debug, Default)]
struct TrackerState {
    next_id: u64,
    live: HashMap<u64, BufferRecord>,
}

/// Shared census of live tensor buffers.
///
/// Cloning is cheap; clones observe the same census.
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    inner: Arc<Mutex<TrackerState>>,
}

impl ResourceTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new scope. Buffers registered in it are released when the
    /// scope is dropped.
    pub fn scope(&self, label: impl Into<String>) -> TensorScope {
        TensorScope {
            inner: Arc::clone(&self.inner),
            label: label.into(),
            ids: Vec::new(),
        }
    }

    /// Number of currently live buffers across all scopes.
    pub fn live_buffers(&self) -> usize {
        self.state().live.len()
    }

    /// Total bytes of currently live buffers across all scopes.
    pub fn live_bytes(&self) -> usize {
        self.state().live.values().map(|r| r.bytes).sum()
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A per-cycle (or per-model) collection of tracked buffers.
///
/// Dropping the scope releases every buffer registered in it.
#[derive(Debug)]
pub struct TensorScope {
    inner: Arc<Mutex<TrackerState>>,
    label: String,
    ids: Vec<u64>,
}

impl TensorScope {
    /// Registers a buffer with this scope and returns its id.
    pub fn register(&mut self, label: impl Into<String>, bytes: usize) -> u64 {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = state.next_id;
        state.next_id += 1;
        state.live.insert(
            id,
            BufferRecord {
                label: label.into(),
                bytes,
            },
        );
        self.ids.push(id);
        id
    }

    /// Number of buffers registered in this scope.
    pub fn registered(&self) -> usize {
        self.ids.len()
    }

    /// The label this scope was opened with.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for TensorScope {
    fn drop(&mut self) {
        if self.ids.is_empty() {
            return;
        }
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut released_bytes = 0usize;
        for id in self.ids.drain(..) {
            if let Some(record) = state.live.remove(&id) {
                tracing::trace!(buffer = %record.label, bytes = record.bytes, "released buffer");
                released_bytes += record.bytes;
            }
        }
        debug!(
            scope = %self.label,
            bytes = released_bytes,
            "released tensor scope"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_drop_releases_buffers() {
        let tracker = ResourceTracker::new();
        {
            let mut scope = tracker.scope("frame");
            scope.register("input", 1024);
            scope.register("resized", 2048);
            assert_eq!(tracker.live_buffers(), 2);
            assert_eq!(tracker.live_bytes(), 3072);
        }
        assert_eq!(tracker.live_buffers(), 0);
        assert_eq!(tracker.live_bytes(), 0);
    }

    #[test]
    fn scopes_are_independent() {
        let tracker = ResourceTracker::new();
        let mut model_scope = tracker.scope("model");
        model_scope.register("parameters", 10_000);

        {
            let mut frame_scope = tracker.scope("frame");
            frame_scope.register("tensor", 500);
            assert_eq!(tracker.live_buffers(), 2);
        }

        // Frame scope is gone, model scope survives.
        assert_eq!(tracker.live_buffers(), 1);
        assert_eq!(tracker.live_bytes(), 10_000);

        drop(model_scope);
        assert_eq!(tracker.live_buffers(), 0);
    }

    #[test]
    fn baseline_restored_after_error_path() {
        let tracker = ResourceTracker::new();
        let baseline = tracker.live_buffers();

        let cycle = || -> Result<(), ()> {
            let mut scope = tracker.scope("frame");
            scope.register("tensor", 64);
            Err(())
        };
        assert!(cycle().is_err());
        assert_eq!(tracker.live_buffers(), baseline);
    }

    #[test]
    fn clones_share_the_census() {
        let tracker = ResourceTracker::new();
        let view = tracker.clone();
        let mut scope = tracker.scope("frame");
        scope.register("tensor", 8);
        assert_eq!(view.live_buffers(), 1);
    }
}
