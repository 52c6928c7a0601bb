// src/session/registry.rs

//! Concurrent set of tracked runs.
//!
//! Readers take an immutable snapshot (the list is copy-on-write: writers
//! replace the shared `Arc<Vec<_>>` under a short lock), so iteration never
//! observes a mutation mid-flight and never blocks disposal callbacks
//! removing entries from other tasks.

use std::sync::{Arc, RwLock, Weak};

use tracing::warn;

use crate::process::SharedProcessHandle;
use crate::session::{RunDescriptor, TrackedRun};
use crate::types::ExecutionId;

pub struct RunRegistry {
    runs: RwLock<Arc<Vec<TrackedRun>>>,
    // Handed to disposal hooks so they can remove their entry without
    // keeping the registry alive.
    self_weak: Weak<RunRegistry>,
}

impl RunRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            runs: RwLock::new(Arc::new(Vec::new())),
            self_weak: weak.clone(),
        })
    }

    /// Immutable snapshot of all tracked runs.
    pub fn snapshot(&self) -> Arc<Vec<TrackedRun>> {
        Arc::clone(&self.runs.read().unwrap())
    }

    /// Add a run and hook its removal to the descriptor's disposal.
    ///
    /// Returns `false` (and changes nothing) if the descriptor is already
    /// tracked, so a descriptor appears in the registry at most once and
    /// disposal removes it exactly once.
    pub fn register(&self, run: TrackedRun) -> bool {
        let descriptor = Arc::clone(&run.descriptor);

        {
            let mut guard = self.runs.write().unwrap();
            if guard
                .iter()
                .any(|r| Arc::ptr_eq(&r.descriptor, &run.descriptor))
            {
                warn!(
                    execution_id = %run.descriptor.execution_id(),
                    "descriptor already tracked; ignoring duplicate registration"
                );
                return false;
            }

            let mut next = Vec::with_capacity(guard.len() + 1);
            next.extend(guard.iter().cloned());
            next.push(run);
            *guard = Arc::new(next);
        }

        // Weak references both ways: the hook lives inside the descriptor,
        // so strong captures would keep the pair alive forever.
        let registry = self.self_weak.clone();
        let weak_descriptor = Arc::downgrade(&descriptor);
        descriptor.on_dispose(Box::new(move || {
            if let (Some(registry), Some(descriptor)) =
                (registry.upgrade(), weak_descriptor.upgrade())
            {
                registry.remove(&descriptor);
            }
        }));

        true
    }

    /// Remove the entry owning `descriptor`. Returns `true` if an entry was
    /// removed.
    pub fn remove(&self, descriptor: &Arc<RunDescriptor>) -> bool {
        let mut guard = self.runs.write().unwrap();
        let before = guard.len();
        let next: Vec<TrackedRun> = guard
            .iter()
            .filter(|r| !Arc::ptr_eq(&r.descriptor, descriptor))
            .cloned()
            .collect();
        let removed = next.len() != before;
        if removed {
            *guard = Arc::new(next);
        }
        removed
    }

    /// Runs whose process is live and not already shutting down, filtered
    /// by `pred`.
    pub fn running_matching(
        &self,
        pred: impl Fn(&TrackedRun) -> bool,
    ) -> Vec<TrackedRun> {
        self.snapshot()
            .iter()
            .filter(|r| r.is_running() && pred(r))
            .cloned()
            .collect()
    }

    /// All live process handles across tracked runs.
    pub fn running_processes(&self) -> Vec<SharedProcessHandle> {
        self.snapshot()
            .iter()
            .filter_map(|r| r.descriptor.process().cloned())
            .filter(|h| !h.is_terminated())
            .collect()
    }

    pub fn find_by_execution_id(&self, id: ExecutionId) -> Option<TrackedRun> {
        self.snapshot()
            .iter()
            .find(|r| r.descriptor.execution_id() == id)
            .cloned()
    }

    /// Locate the tracked run owning the given process handle.
    pub fn find_by_process(&self, handle: &SharedProcessHandle) -> Option<TrackedRun> {
        self.snapshot()
            .iter()
            .find(|r| {
                r.descriptor
                    .process()
                    .is_some_and(|h| Arc::ptr_eq(h, handle))
            })
            .cloned()
    }

    /// Remove and return every entry (used at shutdown).
    pub fn drain(&self) -> Vec<TrackedRun> {
        let mut guard = self.runs.write().unwrap();
        let drained = guard.iter().cloned().collect();
        *guard = Arc::new(Vec::new());
        drained
    }

    pub fn len(&self) -> usize {
        self.runs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
