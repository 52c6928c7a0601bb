// src/coordinator/runtime.rs

//! The async coordinator event loop.
//!
//! Consumes [`CoordinatorEvent`]s from a channel and drives the restart
//! pipeline: conflicts → confirmation → stop → termination wait → launch.
//! Every lifecycle notice is published from this single task, so consumers
//! observe them in order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::coordinator::conflicts::{
    self, ConflictSet, joined_display_names, same_type_confirmation_needed,
};
use crate::coordinator::waiter::spawn_termination_waiter;
use crate::coordinator::{
    CoordinatorEvent, CoordinatorOptions, LifecycleBus, LifecycleEvent, LifecycleNotice,
    RunRequest, StartingSet,
};
use crate::confirm::ConfirmationPolicy;
use crate::errors::{RelaunchError, Result};
use crate::launch::before_run::{BeforeStepProviders, BeforeStepsOutcome, run_before_steps};
use crate::launch::runner::{LaunchSpec, ProgramRunner, RunnerResolver};
use crate::launch::ReadinessGate;
use crate::process::{self, ProcessEvent, ProcessEventSender, SharedProcessHandle};
use crate::profile::{ProfileId, RunProfile};
use crate::session::{RunRegistry, TrackedRun};
use crate::types::{ExecutionId, ExecutorKind};

/// Injected collaborators of the coordinator.
pub struct CoordinatorServices {
    pub resolver: Arc<dyn RunnerResolver>,
    pub policy: Arc<dyn ConfirmationPolicy>,
    pub bus: Arc<dyn LifecycleBus>,
    pub providers: Arc<BeforeStepProviders>,
    pub gate: Arc<dyn ReadinessGate>,
}

/// Cheap clonable handle for talking to a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    events: mpsc::UnboundedSender<CoordinatorEvent>,
    process_events: ProcessEventSender,
    registry: Arc<RunRegistry>,
}

impl CoordinatorHandle {
    /// Request a run/restart of the given target.
    pub fn request_restart(&self, request: RunRequest) -> Result<()> {
        self.events
            .send(CoordinatorEvent::RestartRequested(request))
            .map_err(|_| RelaunchError::ChannelClosed("coordinator".to_string()))
    }

    /// Convenience: restart a profile with no container reuse.
    pub fn restart_profile(
        &self,
        profile: Arc<RunProfile>,
        executor: ExecutorKind,
    ) -> Result<()> {
        self.request_restart(RunRequest::for_profile(profile, executor))
    }

    /// Restart, reusing the container that owns the given process handle.
    ///
    /// Falls back to a plain restart when no tracked run owns the handle.
    pub fn restart_with_process(
        &self,
        profile: Option<Arc<RunProfile>>,
        executor: ExecutorKind,
        handle: &SharedProcessHandle,
    ) -> Result<()> {
        let reuse = self
            .registry
            .find_by_process(handle)
            .map(|run| run.descriptor);
        self.request_restart(RunRequest {
            profile,
            executor,
            reuse,
            runner: None,
            execution_id: None,
        })
    }

    /// Stop every running instance of a profile.
    pub fn stop_profile(&self, profile: ProfileId) -> Result<()> {
        self.events
            .send(CoordinatorEvent::StopProfile(profile))
            .map_err(|_| RelaunchError::ChannelClosed("coordinator".to_string()))
    }

    /// Dispose all tracked runs and stop the coordinator loop.
    pub fn shutdown(&self) -> Result<()> {
        self.events
            .send(CoordinatorEvent::Shutdown)
            .map_err(|_| RelaunchError::ChannelClosed("coordinator".to_string()))
    }

    /// The shared tracked-run registry.
    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    /// All live process handles across tracked runs.
    pub fn running_processes(&self) -> Vec<SharedProcessHandle> {
        self.registry.running_processes()
    }

    /// Sender process implementations report lifecycle events on.
    pub fn process_event_sender(&self) -> ProcessEventSender {
        self.process_events.clone()
    }
}

/// The run session coordinator.
pub struct Coordinator {
    services: CoordinatorServices,
    options: CoordinatorOptions,
    registry: Arc<RunRegistry>,
    starting: Arc<StartingSet>,
    shutting_down: Arc<AtomicBool>,

    events_tx: mpsc::UnboundedSender<CoordinatorEvent>,
    events_rx: mpsc::UnboundedReceiver<CoordinatorEvent>,
    process_tx: ProcessEventSender,
    process_rx: mpsc::UnboundedReceiver<ProcessEvent>,

    next_execution_id: u64,
}

impl Coordinator {
    pub fn new(
        services: CoordinatorServices,
        options: CoordinatorOptions,
    ) -> (Self, CoordinatorHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (process_tx, process_rx) = mpsc::unbounded_channel();
        let registry = RunRegistry::new();

        let handle = CoordinatorHandle {
            events: events_tx.clone(),
            process_events: process_tx.clone(),
            registry: Arc::clone(&registry),
        };

        let coordinator = Self {
            services,
            options,
            registry,
            starting: Arc::new(StartingSet::new()),
            shutting_down: Arc::new(AtomicBool::new(false)),
            events_tx,
            events_rx,
            process_tx,
            process_rx,
            next_execution_id: 0,
        };

        (coordinator, handle)
    }

    /// Main event loop. Runs until [`CoordinatorHandle::shutdown`] or until
    /// every handle is dropped.
    pub async fn run(mut self) -> Result<()> {
        info!("run coordinator started");

        loop {
            let event = tokio::select! {
                e = self.events_rx.recv() => match e {
                    Some(e) => e,
                    None => {
                        info!("coordinator event channel closed; exiting");
                        break;
                    }
                },
                p = self.process_rx.recv() => match p {
                    Some(p) => CoordinatorEvent::Process(p),
                    // Unreachable while we hold a sender clone; bail out
                    // instead of spinning if it ever happens.
                    None => break,
                },
            };

            debug!(?event, "coordinator received event");

            match event {
                CoordinatorEvent::RestartRequested(request) => {
                    self.handle_restart(request).await;
                }
                CoordinatorEvent::WaitSatisfied(request) => {
                    self.proceed_to_launch(request);
                }
                CoordinatorEvent::BeforeStepsDone {
                    request,
                    runner,
                    outcome,
                } => {
                    self.handle_before_steps_done(request, runner, outcome);
                }
                CoordinatorEvent::Process(event) => {
                    self.handle_process_event(event);
                }
                CoordinatorEvent::StopProfile(profile) => {
                    self.handle_stop_profile(&profile);
                }
                CoordinatorEvent::Shutdown => {
                    self.handle_shutdown();
                    break;
                }
            }
        }

        info!("run coordinator exiting");
        Ok(())
    }

    /// Step 1-4 of a restart: conflicts, confirmation, stop, wait.
    async fn handle_restart(&mut self, mut request: RunRequest) {
        if self.shutting_down.load(Ordering::SeqCst) {
            return;
        }

        if request.execution_id.is_none() {
            self.next_execution_id += 1;
            request.execution_id = Some(ExecutionId(self.next_execution_id));
        }

        let snapshot = self.registry.snapshot();
        let conflicts = conflicts::compute_conflicts(
            &snapshot,
            request.profile.as_deref(),
            request.reuse.as_ref(),
        );

        if !conflicts.is_empty() {
            if !self.confirm_stops(&request, &conflicts).await {
                info!(
                    profile = ?request.profile.as_ref().map(|p| &p.id),
                    "restart declined; leaving running instances untouched"
                );
                return;
            }

            for descriptor in conflicts.to_stop() {
                info!(
                    execution_id = %descriptor.execution_id(),
                    name = %descriptor.display_name(),
                    "stopping conflicting run"
                );
                if let Some(handle) = descriptor.process() {
                    process::stop(handle.as_ref());
                }
            }
        }

        spawn_termination_waiter(
            request,
            conflicts.same_type,
            Arc::clone(&self.starting),
            self.options,
            self.events_tx.clone(),
            Arc::clone(&self.shutting_down),
        );
    }

    /// Ask the user about same-type and incompatible conflicts.
    ///
    /// Both prompts are skipped when the request carries no profile (a pure
    /// container restart stops its own process without asking).
    async fn confirm_stops(&self, request: &RunRequest, conflicts: &ConflictSet) -> bool {
        let Some(profile) = &request.profile else {
            return true;
        };

        if same_type_confirmation_needed(&conflicts.same_type, request.reuse.as_ref()) {
            let approved = self
                .services
                .policy
                .confirm_rerun(&profile.display_name, conflicts.same_type.len())
                .await;
            if !approved {
                return false;
            }
        }

        if !conflicts.incompatible.is_empty() {
            let names = joined_display_names(&conflicts.incompatible);
            let approved = self
                .services
                .policy
                .confirm_stop_incompatible(
                    &profile.display_name,
                    &names,
                    conflicts.incompatible.len(),
                )
                .await;
            if !approved {
                return false;
            }
        }

        true
    }

    /// Step 5: the wait is over; resolve a runner and hand off to the
    /// launch path (possibly via before-steps).
    fn proceed_to_launch(&mut self, request: RunRequest) {
        if self.shutting_down.load(Ordering::SeqCst) {
            return;
        }

        let runner = request.runner.clone().or_else(|| {
            request
                .profile
                .as_ref()
                .and_then(|p| self.services.resolver.resolve(request.executor, p))
        });

        let runner = match runner {
            Some(runner) => runner,
            None => {
                match &request.profile {
                    Some(profile) => {
                        // Configuration error: fatal to this attempt, not
                        // retried.
                        error!(
                            profile = %profile.id,
                            executor = %request.executor,
                            "cannot find a runner; aborting launch"
                        );
                    }
                    None => match &request.reuse {
                        Some(container) if container.run_restarter() => {
                            debug!(
                                execution_id = %container.execution_id(),
                                "restarter callback invoked for reused container"
                            );
                        }
                        _ => {
                            warn!("nothing to launch: no runner, no profile, no restarter");
                        }
                    },
                }
                return;
            }
        };

        let Some(execution_id) = request.execution_id else {
            warn!("launch request without execution id; dropping");
            return;
        };

        // In-flight from scheduled until started / not-started, so the
        // termination waiter holds back equivalent launches.
        if let Some(profile) = &request.profile {
            self.starting.insert(request.executor, &profile.id);
        }

        self.publish(
            request.executor,
            LifecycleEvent::Scheduled,
            execution_id,
            request.profile.as_ref().map(|p| p.id.clone()),
        );

        if let Some(container) = &request.reuse {
            container.set_execution_id(execution_id);
        }

        match request.profile.clone() {
            Some(profile) if !profile.before.is_empty() => {
                let providers = Arc::clone(&self.services.providers);
                let gate = Arc::clone(&self.services.gate);
                let shutting_down = Arc::clone(&self.shutting_down);
                let events = self.events_tx.clone();

                tokio::spawn(async move {
                    let outcome =
                        run_before_steps(&profile, &providers, &shutting_down).await;
                    if outcome == BeforeStepsOutcome::Completed {
                        gate.ready().await;
                    }
                    let _ = events.send(CoordinatorEvent::BeforeStepsDone {
                        request,
                        runner,
                        outcome,
                    });
                });
            }
            _ => {
                // No before-steps: launch immediately.
                self.launch_now(request, runner);
            }
        }
    }

    fn handle_before_steps_done(
        &mut self,
        request: RunRequest,
        runner: Arc<dyn ProgramRunner>,
        outcome: BeforeStepsOutcome,
    ) {
        match outcome {
            BeforeStepsOutcome::Completed => {
                self.launch_now(request, runner);
            }
            BeforeStepsOutcome::Failed => {
                // The cancelled launch never started.
                if let Some(execution_id) = request.execution_id {
                    self.publish(
                        request.executor,
                        LifecycleEvent::NotStarted,
                        execution_id,
                        request.profile.as_ref().map(|p| p.id.clone()),
                    );
                }
                self.clear_starting(&request);
            }
            BeforeStepsOutcome::Aborted => {
                // Shutdown mid-pipeline: abandon silently.
                self.clear_starting(&request);
            }
        }
    }

    /// The actual launch: publish `Starting`, invoke the runner, register
    /// the descriptor. Exactly one of `Started` / `NotStarted` is published
    /// per attempt.
    fn launch_now(&mut self, request: RunRequest, runner: Arc<dyn ProgramRunner>) {
        let Some(execution_id) = request.execution_id else {
            return;
        };
        let profile_id = request.profile.as_ref().map(|p| p.id.clone());

        if self.shutting_down.load(Ordering::SeqCst) {
            self.clear_starting(&request);
            return;
        }

        self.publish(
            request.executor,
            LifecycleEvent::Starting,
            execution_id,
            profile_id.clone(),
        );

        let mut started = false;
        if let Some(profile) = request.profile.clone() {
            let spec = LaunchSpec {
                profile,
                executor: request.executor,
                execution_id,
                reused: request.reuse.clone(),
                events: self.process_tx.clone(),
            };

            match runner.launch(spec) {
                Ok(Some(descriptor)) => {
                    self.registry.register(TrackedRun {
                        descriptor: Arc::clone(&descriptor),
                        profile: request.profile.clone(),
                        executor: request.executor,
                    });

                    if descriptor.process().is_some() {
                        started = true;
                        self.publish(
                            request.executor,
                            LifecycleEvent::Started,
                            execution_id,
                            profile_id.clone(),
                        );
                    }
                }
                Ok(None) => {
                    debug!(
                        profile = ?profile_id,
                        %execution_id,
                        "runner produced no instance"
                    );
                }
                Err(e) => {
                    // Launch errors are reported and logged, never fatal to
                    // the coordinator.
                    error!(
                        profile = ?profile_id,
                        %execution_id,
                        error = %e,
                        "launch failed"
                    );
                }
            }
        }

        if !started {
            self.publish(
                request.executor,
                LifecycleEvent::NotStarted,
                execution_id,
                profile_id,
            );
        }
        self.clear_starting(&request);
    }

    fn handle_process_event(&mut self, event: ProcessEvent) {
        match event {
            ProcessEvent::WillTerminate { execution_id } => {
                if let Some(run) = self.registry.find_by_execution_id(execution_id) {
                    self.publish(
                        run.executor,
                        LifecycleEvent::Terminating,
                        execution_id,
                        run.profile.as_ref().map(|p| p.id.clone()),
                    );
                }
            }
            ProcessEvent::Terminated {
                execution_id,
                exit_code,
            } => match self.registry.find_by_execution_id(execution_id) {
                Some(run) => {
                    debug!(%execution_id, ?exit_code, "tracked process terminated");
                    self.publish(
                        run.executor,
                        LifecycleEvent::Terminated,
                        execution_id,
                        run.profile.as_ref().map(|p| p.id.clone()),
                    );
                    run.descriptor.dispose();
                }
                None => {
                    debug!(
                        %execution_id,
                        "termination for an untracked process; ignoring"
                    );
                }
            },
        }
    }

    fn handle_stop_profile(&mut self, profile: &ProfileId) {
        let running = self
            .registry
            .running_matching(|run| run.profile.as_ref().is_some_and(|p| &p.id == profile));

        if running.is_empty() {
            info!(profile = %profile, "no running instances to stop");
            return;
        }

        for run in running {
            info!(
                profile = %profile,
                execution_id = %run.descriptor.execution_id(),
                "stopping run"
            );
            if let Some(handle) = run.descriptor.process() {
                process::stop(handle.as_ref());
            }
        }
    }

    /// Dispose every tracked run. Live processes are stopped first so the
    /// tool does not leave orphans behind (detach-by-default profiles keep
    /// running).
    fn handle_shutdown(&mut self) {
        self.shutting_down.store(true, Ordering::SeqCst);

        let runs = self.registry.drain();
        info!(count = runs.len(), "shutting down; disposing tracked runs");

        for run in runs {
            if let Some(handle) = run.descriptor.process() {
                if !handle.is_terminated() {
                    process::stop(handle.as_ref());
                }
            }
            run.descriptor.dispose();
        }
    }

    fn clear_starting(&self, request: &RunRequest) {
        if let Some(profile) = &request.profile {
            self.starting.remove(request.executor, &profile.id);
        }
    }

    fn publish(
        &self,
        executor: ExecutorKind,
        event: LifecycleEvent,
        execution_id: ExecutionId,
        profile: Option<ProfileId>,
    ) {
        self.services.bus.publish(LifecycleNotice {
            executor,
            event,
            execution_id,
            profile,
        });
    }
}
