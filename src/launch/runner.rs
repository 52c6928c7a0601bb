// src/launch/runner.rs

//! Runner resolution and the production command runner.
//!
//! The coordinator resolves a [`ProgramRunner`] per (executor, profile)
//! through a [`RunnerResolver`]; production code resolves everything to
//! [`CommandRunner`], tests swap in fakes that build descriptors around
//! fake process handles.

use std::sync::Arc;

use crate::errors::Result;
use crate::process::{LocalProcess, ProcessEventSender, SharedProcessHandle};
use crate::profile::RunProfile;
use crate::session::RunDescriptor;
use crate::types::{ExecutionId, ExecutorKind};

/// Everything a runner needs to start one instance.
pub struct LaunchSpec {
    pub profile: Arc<RunProfile>,
    pub executor: ExecutorKind,
    pub execution_id: ExecutionId,

    /// Container being reused for this launch, if any.
    pub reused: Option<Arc<RunDescriptor>>,

    /// Where the spawned process reports its lifecycle.
    pub events: ProcessEventSender,
}

/// Starts a process for a launch spec and wraps it in a descriptor.
///
/// Returning `Ok(None)` means the runner declined to produce an instance;
/// the coordinator then publishes a not-started notification.
pub trait ProgramRunner: Send + Sync {
    fn id(&self) -> &str;

    fn launch(&self, spec: LaunchSpec) -> Result<Option<Arc<RunDescriptor>>>;
}

/// Maps (executor kind, profile) to a runner, or none.
pub trait RunnerResolver: Send + Sync {
    fn resolve(
        &self,
        executor: ExecutorKind,
        profile: &RunProfile,
    ) -> Option<Arc<dyn ProgramRunner>>;
}

/// Production runner: spawns the profile's command as a local process.
pub struct CommandRunner;

impl ProgramRunner for CommandRunner {
    fn id(&self) -> &str {
        "command"
    }

    fn launch(&self, spec: LaunchSpec) -> Result<Option<Arc<RunDescriptor>>> {
        let handle = LocalProcess::spawn(&spec.profile, spec.execution_id, spec.events)?;

        let descriptor = RunDescriptor::new(
            spec.execution_id,
            spec.profile.display_name.clone(),
            Some(spec.profile.id.clone()),
            Some(handle as SharedProcessHandle),
        );

        Ok(Some(Arc::new(descriptor)))
    }
}

/// Resolves every (executor, profile) pair to the same runner.
pub struct SingleRunnerResolver {
    runner: Arc<dyn ProgramRunner>,
}

impl SingleRunnerResolver {
    pub fn new(runner: Arc<dyn ProgramRunner>) -> Self {
        Self { runner }
    }
}

impl RunnerResolver for SingleRunnerResolver {
    fn resolve(
        &self,
        _executor: ExecutorKind,
        _profile: &RunProfile,
    ) -> Option<Arc<dyn ProgramRunner>> {
        Some(Arc::clone(&self.runner))
    }
}
