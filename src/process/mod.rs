// src/process/mod.rs

//! Process handle abstraction.
//!
//! The coordinator never touches OS processes directly; it talks to
//! [`ProcessHandle`], which exposes exactly the capability surface the
//! restart logic needs. Production code uses [`local::LocalProcess`];
//! tests can provide their own handle that records calls.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::types::ExecutionId;

pub mod local;

pub use local::LocalProcess;

/// Capability surface of one live (or once-live) process.
///
/// Force-kill is a capability, not a subtype: implementations that support
/// it return `true` from [`ProcessHandle::can_kill`] and accept
/// [`ProcessHandle::kill`] calls; the default implementation supports
/// neither.
pub trait ProcessHandle: Send + Sync {
    /// The process has fully exited (or was detached and is no longer ours).
    fn is_terminated(&self) -> bool;

    /// Termination has been requested but the process has not exited yet.
    fn is_terminating(&self) -> bool;

    /// Whether stopping this process should detach instead of destroy.
    fn detach_is_default(&self) -> bool {
        false
    }

    /// Request graceful termination.
    fn destroy(&self);

    /// Stop tracking the process without terminating it.
    fn detach(&self);

    /// Whether [`ProcessHandle::kill`] is supported.
    fn can_kill(&self) -> bool {
        false
    }

    /// Force-kill. Only meaningful when [`ProcessHandle::can_kill`] is true.
    fn kill(&self) {}
}

/// Stop one process according to its declared capabilities:
///
/// - killable and already terminating → force-kill (the user asked twice);
/// - not yet terminated → detach when that is the handle's default,
///   destroy otherwise;
/// - already terminated → nothing to do.
pub fn stop(handle: &dyn ProcessHandle) {
    if handle.can_kill() && handle.is_terminating() {
        debug!("process already terminating; force-killing");
        handle.kill();
        return;
    }

    if !handle.is_terminated() {
        if handle.detach_is_default() {
            handle.detach();
        } else {
            handle.destroy();
        }
    }
}

/// Lifecycle notifications emitted by process implementations.
///
/// The coordinator converts these into `Terminating` / `Terminated`
/// lifecycle notices and disposes the owning descriptor on termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessEvent {
    /// Termination was requested; the process is shutting down.
    WillTerminate { execution_id: ExecutionId },

    /// The process has fully exited.
    Terminated {
        execution_id: ExecutionId,
        exit_code: Option<i32>,
    },
}

/// Channel process implementations report lifecycle events on.
pub type ProcessEventSender = mpsc::UnboundedSender<ProcessEvent>;

/// Convenience alias for handles shared across tasks.
pub type SharedProcessHandle = Arc<dyn ProcessHandle>;
