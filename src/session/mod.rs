// src/session/mod.rs

//! Run sessions: descriptors for launched instances and the registry that
//! tracks them.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::debug;

use crate::process::SharedProcessHandle;
use crate::profile::ProfileId;
use crate::types::{ExecutionId, ExecutorKind};

pub mod registry;

pub use registry::RunRegistry;

/// Callback that re-requests a run when no runner can be resolved (used by
/// reusable containers that remember how they were started).
pub type Restarter = Box<dyn Fn() + Send + Sync>;

/// A handle to one launched (or reusable) instance.
///
/// The process handle is optional: a descriptor may represent a container
/// that can be reused for a new launch even though no process is currently
/// attached.
pub struct RunDescriptor {
    execution_id: AtomicU64,
    display_name: String,
    profile: Option<ProfileId>,
    process: Option<SharedProcessHandle>,
    restarter: Option<Restarter>,
    disposed: AtomicBool,
    dispose_hooks: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

impl std::fmt::Debug for RunDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunDescriptor")
            .field("execution_id", &self.execution_id())
            .field("display_name", &self.display_name)
            .field("profile", &self.profile)
            .field("has_process", &self.process.is_some())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl RunDescriptor {
    pub fn new(
        execution_id: ExecutionId,
        display_name: impl Into<String>,
        profile: Option<ProfileId>,
        process: Option<SharedProcessHandle>,
    ) -> Self {
        Self {
            execution_id: AtomicU64::new(execution_id.0),
            display_name: display_name.into(),
            profile,
            process,
            restarter: None,
            disposed: AtomicBool::new(false),
            dispose_hooks: Mutex::new(Vec::new()),
        }
    }

    /// Attach a restarter callback (builder-style).
    pub fn with_restarter(mut self, restarter: Restarter) -> Self {
        self.restarter = Some(restarter);
        self
    }

    pub fn execution_id(&self) -> ExecutionId {
        ExecutionId(self.execution_id.load(Ordering::SeqCst))
    }

    /// Reused containers adopt the new request's execution id before the
    /// launch proceeds.
    pub fn set_execution_id(&self, id: ExecutionId) {
        self.execution_id.store(id.0, Ordering::SeqCst);
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn profile(&self) -> Option<&ProfileId> {
        self.profile.as_ref()
    }

    pub fn process(&self) -> Option<&SharedProcessHandle> {
        self.process.as_ref()
    }

    /// Whether a process is attached and has not fully terminated.
    ///
    /// Note that a *terminating* process still counts as live here; it only
    /// drops out of the stricter [`TrackedRun::is_running`] query.
    pub fn has_live_process(&self) -> bool {
        match &self.process {
            Some(handle) => !handle.is_terminated(),
            None => false,
        }
    }

    /// Invoke the restarter callback, if one is attached.
    ///
    /// Returns `false` when no restarter is present.
    pub fn run_restarter(&self) -> bool {
        match &self.restarter {
            Some(restarter) => {
                restarter();
                true
            }
            None => false,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Register a hook to run when the descriptor is disposed.
    ///
    /// If the descriptor is already disposed the hook runs immediately.
    pub fn on_dispose(&self, hook: Box<dyn FnOnce() + Send>) {
        if self.is_disposed() {
            hook();
            return;
        }

        let mut hooks = self.dispose_hooks.lock().unwrap();
        // Re-check under the lock so a concurrent dispose can't strand the
        // hook in the vector.
        if self.is_disposed() {
            drop(hooks);
            hook();
        } else {
            hooks.push(hook);
        }
    }

    /// Dispose the descriptor, running every registered hook exactly once.
    ///
    /// Subsequent calls are no-ops.
    pub fn dispose(&self) {
        if self
            .disposed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        debug!(execution_id = %self.execution_id(), name = %self.display_name, "disposing run descriptor");

        let hooks = {
            let mut guard = self.dispose_hooks.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        for hook in hooks {
            hook();
        }
    }
}

/// One tracked entry: descriptor plus the profile/executor it was launched
/// under.
#[derive(Clone)]
pub struct TrackedRun {
    pub descriptor: std::sync::Arc<RunDescriptor>,
    pub profile: Option<std::sync::Arc<crate::profile::RunProfile>>,
    pub executor: ExecutorKind,
}

impl std::fmt::Debug for TrackedRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedRun")
            .field("descriptor", &self.descriptor)
            .field("executor", &self.executor)
            .finish()
    }
}

impl TrackedRun {
    /// Strict "running" query: a process is attached and is neither
    /// terminating nor terminated.
    pub fn is_running(&self) -> bool {
        match self.descriptor.process() {
            Some(handle) => !handle.is_terminating() && !handle.is_terminated(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn dispose_runs_hooks_exactly_once() {
        let descriptor = RunDescriptor::new(ExecutionId(1), "a", None, None);
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        descriptor.on_dispose(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        descriptor.dispose();
        descriptor.dispose();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(descriptor.is_disposed());
    }

    #[test]
    fn hook_added_after_dispose_runs_immediately() {
        let descriptor = RunDescriptor::new(ExecutionId(1), "a", None, None);
        descriptor.dispose();

        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        descriptor.on_dispose(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn descriptor_without_process_is_not_live() {
        let descriptor = RunDescriptor::new(ExecutionId(1), "a", None, None);
        assert!(!descriptor.has_live_process());
    }

    #[test]
    fn reused_descriptor_adopts_new_execution_id() {
        let descriptor = RunDescriptor::new(ExecutionId(1), "a", None, None);
        descriptor.set_execution_id(ExecutionId(7));
        assert_eq!(descriptor.execution_id(), ExecutionId(7));
    }
}
