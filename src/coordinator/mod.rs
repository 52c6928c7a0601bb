// src/coordinator/mod.rs

//! Run session coordination.
//!
//! This module ties together:
//! - conflict computation against the tracked-run registry (singleton and
//!   must-stop-for policies),
//! - confirmation prompts,
//! - stop-then-wait-then-launch ordering for restarts,
//! - lifecycle notifications per executor.
//!
//! The pure decision logic lives in [`conflicts`]; the async event loop is
//! implemented in [`runtime`], and the termination-wait poller in
//! [`waiter`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::info;

use crate::config::model::SettingsSection;
use crate::launch::runner::ProgramRunner;
use crate::launch::before_run::BeforeStepsOutcome;
use crate::process::ProcessEvent;
use crate::profile::{ProfileId, RunProfile};
use crate::session::RunDescriptor;
use crate::types::{ExecutionId, ExecutorKind};

pub mod conflicts;
pub mod runtime;
pub mod waiter;

pub use runtime::{Coordinator, CoordinatorHandle};

/// Lifecycle stages of one launch attempt / tracked run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Scheduled,
    Starting,
    Started,
    NotStarted,
    Terminating,
    Terminated,
}

/// One published lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleNotice {
    pub executor: ExecutorKind,
    pub event: LifecycleEvent,
    pub execution_id: ExecutionId,
    pub profile: Option<ProfileId>,
}

/// Where lifecycle notices go.
///
/// Publication always happens from the single coordinator task, so
/// implementations receive notices already serialized and must not block.
pub trait LifecycleBus: Send + Sync {
    fn publish(&self, notice: LifecycleNotice);
}

/// Default bus: logs every notice.
pub struct TracingLifecycleBus;

impl LifecycleBus for TracingLifecycleBus {
    fn publish(&self, notice: LifecycleNotice) {
        info!(
            executor = %notice.executor,
            execution_id = %notice.execution_id,
            profile = ?notice.profile,
            event = ?notice.event,
            "lifecycle"
        );
    }
}

/// Bus forwarding notices over a channel (used by embedders and tests).
pub struct ChannelLifecycleBus {
    tx: mpsc::UnboundedSender<LifecycleNotice>,
}

impl ChannelLifecycleBus {
    pub fn new(tx: mpsc::UnboundedSender<LifecycleNotice>) -> Self {
        Self { tx }
    }
}

impl LifecycleBus for ChannelLifecycleBus {
    fn publish(&self, notice: LifecycleNotice) {
        let _ = self.tx.send(notice);
    }
}

/// An execution request: what to run and how.
#[derive(Clone)]
pub struct RunRequest {
    /// The profile to run; `None` for pure container restarts.
    pub profile: Option<Arc<RunProfile>>,

    pub executor: ExecutorKind,

    /// Existing container to reuse for this launch.
    pub reuse: Option<Arc<RunDescriptor>>,

    /// Pre-resolved runner; when `None` one is resolved at launch time.
    pub runner: Option<Arc<dyn ProgramRunner>>,

    /// Assigned by the coordinator when `None`.
    pub execution_id: Option<ExecutionId>,
}

impl std::fmt::Debug for RunRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunRequest")
            .field("profile", &self.profile.as_ref().map(|p| &p.id))
            .field("executor", &self.executor)
            .field("reuse", &self.reuse.as_ref().map(|d| d.execution_id()))
            .field("has_runner", &self.runner.is_some())
            .field("execution_id", &self.execution_id)
            .finish()
    }
}

impl RunRequest {
    pub fn for_profile(profile: Arc<RunProfile>, executor: ExecutorKind) -> Self {
        Self {
            profile: Some(profile),
            executor,
            reuse: None,
            runner: None,
            execution_id: None,
        }
    }
}

/// Events flowing into the coordinator loop.
pub enum CoordinatorEvent {
    /// A run or restart was requested.
    RestartRequested(RunRequest),

    /// The termination wait for this request is satisfied; launch may
    /// proceed.
    WaitSatisfied(RunRequest),

    /// The before-step pipeline for this request finished.
    BeforeStepsDone {
        request: RunRequest,
        runner: Arc<dyn ProgramRunner>,
        outcome: BeforeStepsOutcome,
    },

    /// A process reported a lifecycle change.
    Process(ProcessEvent),

    /// Stop every running instance of the given profile.
    StopProfile(ProfileId),

    /// Dispose all tracked runs and exit the loop.
    Shutdown,
}

impl std::fmt::Debug for CoordinatorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RestartRequested(r) => f.debug_tuple("RestartRequested").field(r).finish(),
            Self::WaitSatisfied(r) => f.debug_tuple("WaitSatisfied").field(r).finish(),
            Self::BeforeStepsDone { request, outcome, .. } => f
                .debug_struct("BeforeStepsDone")
                .field("request", request)
                .field("outcome", outcome)
                .finish(),
            Self::Process(e) => f.debug_tuple("Process").field(e).finish(),
            Self::StopProfile(p) => f.debug_tuple("StopProfile").field(p).finish(),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Tunable coordinator behaviour.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorOptions {
    /// Delay before the first termination-wait check.
    pub wait_initial_delay: Duration,

    /// Delay between termination-wait re-checks.
    pub wait_interval: Duration,

    /// Upper bound on wait checks; `None` polls until satisfied.
    pub max_wait_checks: Option<u32>,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            wait_initial_delay: Duration::from_millis(50),
            wait_interval: Duration::from_millis(100),
            max_wait_checks: None,
        }
    }
}

impl CoordinatorOptions {
    pub fn from_settings(settings: &SettingsSection) -> Self {
        Self {
            wait_initial_delay: Duration::from_millis(settings.wait_initial_delay_ms),
            wait_interval: Duration::from_millis(settings.wait_interval_ms),
            max_wait_checks: settings.max_wait_checks,
        }
    }
}

/// Launches currently in flight, keyed by (executor, profile).
///
/// Entries are counted from the moment a launch is scheduled until its
/// started / not-started notice, so the termination waiter can hold back a
/// new launch while an equivalent one is still starting.
#[derive(Default)]
pub struct StartingSet {
    inner: Mutex<HashMap<(ExecutorKind, ProfileId), usize>>,
}

impl StartingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, executor: ExecutorKind, profile: &ProfileId) {
        let mut guard = self.inner.lock().unwrap();
        *guard.entry((executor, profile.clone())).or_insert(0) += 1;
    }

    pub fn remove(&self, executor: ExecutorKind, profile: &ProfileId) {
        let mut guard = self.inner.lock().unwrap();
        let key = (executor, profile.clone());
        if let Some(count) = guard.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                guard.remove(&key);
            }
        }
    }

    pub fn contains(&self, executor: ExecutorKind, profile: &ProfileId) -> bool {
        self.inner
            .lock()
            .unwrap()
            .contains_key(&(executor, profile.clone()))
    }
}
