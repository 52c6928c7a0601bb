#![allow(dead_code)]

//! Fake backends for coordinator tests.
//!
//! Mirrors the production seams: process handles, runners, the lifecycle
//! bus, and the confirmation policy can all be swapped for recording fakes
//! so no real processes are spawned.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use relaunch::confirm::ConfirmationPolicy;
use relaunch::coordinator::{LifecycleBus, LifecycleNotice};
use relaunch::errors::Result;
use relaunch::launch::runner::{LaunchSpec, ProgramRunner, RunnerResolver};
use relaunch::process::{ProcessEvent, ProcessEventSender, ProcessHandle};
use relaunch::profile::{ProfileId, RunProfile};
use relaunch::session::RunDescriptor;
use relaunch::types::{ExecutionId, ExecutorKind};

/// A manually-driven process handle that records every stop call.
pub struct FakeProcessHandle {
    terminating: AtomicBool,
    terminated: AtomicBool,
    detach_default: AtomicBool,
    killable: AtomicBool,
    /// When set, `destroy` immediately finishes the process (as if it
    /// exited promptly on the termination request).
    auto_exit_on_destroy: AtomicBool,
    calls: Mutex<Vec<&'static str>>,
    wiring: Mutex<Option<(ExecutionId, ProcessEventSender)>>,
}

impl FakeProcessHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            terminating: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            detach_default: AtomicBool::new(false),
            killable: AtomicBool::new(false),
            auto_exit_on_destroy: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            wiring: Mutex::new(None),
        })
    }

    pub fn set_killable(&self, value: bool) {
        self.killable.store(value, Ordering::SeqCst);
    }

    pub fn set_detach_default(&self, value: bool) {
        self.detach_default.store(value, Ordering::SeqCst);
    }

    pub fn set_auto_exit_on_destroy(&self, value: bool) {
        self.auto_exit_on_destroy.store(value, Ordering::SeqCst);
    }

    /// Force the handle into the "termination requested" state.
    pub fn set_terminating(&self) {
        self.terminating.store(true, Ordering::SeqCst);
    }

    /// Connect the handle to the coordinator's process event channel.
    pub fn wire(&self, execution_id: ExecutionId, sender: ProcessEventSender) {
        *self.wiring.lock().unwrap() = Some((execution_id, sender));
    }

    /// Simulate the process exiting.
    pub fn finish(&self, exit_code: Option<i32>) {
        self.terminated.store(true, Ordering::SeqCst);
        if let Some((execution_id, sender)) = self.wiring.lock().unwrap().clone() {
            let _ = sender.send(ProcessEvent::Terminated {
                execution_id,
                exit_code,
            });
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn was_stopped(&self) -> bool {
        !self.calls().is_empty()
    }
}

impl ProcessHandle for FakeProcessHandle {
    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst) && !self.is_terminated()
    }

    fn detach_is_default(&self) -> bool {
        self.detach_default.load(Ordering::SeqCst)
    }

    fn destroy(&self) {
        self.calls.lock().unwrap().push("destroy");
        self.terminating.store(true, Ordering::SeqCst);
        if let Some((execution_id, sender)) = self.wiring.lock().unwrap().clone() {
            let _ = sender.send(ProcessEvent::WillTerminate { execution_id });
        }
        if self.auto_exit_on_destroy.load(Ordering::SeqCst) {
            self.finish(Some(0));
        }
    }

    fn detach(&self) {
        self.calls.lock().unwrap().push("detach");
        self.terminated.store(true, Ordering::SeqCst);
    }

    fn can_kill(&self) -> bool {
        self.killable.load(Ordering::SeqCst)
    }

    fn kill(&self) {
        self.calls.lock().unwrap().push("kill");
        self.finish(None);
    }
}

/// What the fake runner does on the next launches.
#[derive(Debug, Clone)]
pub enum FakeLaunch {
    /// Produce a descriptor with a fake process handle.
    Spawn,
    /// Produce a descriptor with no process attached.
    NoProcess,
    /// Decline to produce an instance.
    NoInstance,
    /// Fail with an error.
    Fail(String),
}

/// A runner that creates descriptors around [`FakeProcessHandle`]s.
pub struct FakeRunner {
    mode: Mutex<FakeLaunch>,
    auto_exit: AtomicBool,
    launched: Mutex<Vec<(ProfileId, ExecutionId)>>,
    handles: Mutex<Vec<Arc<FakeProcessHandle>>>,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(FakeLaunch::Spawn),
            auto_exit: AtomicBool::new(true),
            launched: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
        })
    }

    pub fn set_mode(&self, mode: FakeLaunch) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Whether spawned handles exit as soon as they are destroyed
    /// (default: true).
    pub fn set_auto_exit(&self, value: bool) {
        self.auto_exit.store(value, Ordering::SeqCst);
    }

    pub fn launched(&self) -> Vec<(ProfileId, ExecutionId)> {
        self.launched.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launched.lock().unwrap().len()
    }

    pub fn handles(&self) -> Vec<Arc<FakeProcessHandle>> {
        self.handles.lock().unwrap().clone()
    }

    pub fn last_handle(&self) -> Option<Arc<FakeProcessHandle>> {
        self.handles.lock().unwrap().last().cloned()
    }
}

impl ProgramRunner for FakeRunner {
    fn id(&self) -> &str {
        "fake"
    }

    fn launch(&self, spec: LaunchSpec) -> Result<Option<Arc<RunDescriptor>>> {
        self.launched
            .lock()
            .unwrap()
            .push((spec.profile.id.clone(), spec.execution_id));

        let mode = self.mode.lock().unwrap().clone();
        match mode {
            FakeLaunch::Spawn => {
                let handle = FakeProcessHandle::new();
                handle.set_auto_exit_on_destroy(self.auto_exit.load(Ordering::SeqCst));
                handle.wire(spec.execution_id, spec.events.clone());
                self.handles.lock().unwrap().push(Arc::clone(&handle));

                let descriptor = RunDescriptor::new(
                    spec.execution_id,
                    spec.profile.display_name.clone(),
                    Some(spec.profile.id.clone()),
                    Some(handle),
                );
                Ok(Some(Arc::new(descriptor)))
            }
            FakeLaunch::NoProcess => {
                let descriptor = RunDescriptor::new(
                    spec.execution_id,
                    spec.profile.display_name.clone(),
                    Some(spec.profile.id.clone()),
                    None,
                );
                Ok(Some(Arc::new(descriptor)))
            }
            FakeLaunch::NoInstance => Ok(None),
            FakeLaunch::Fail(message) => Err(anyhow::anyhow!(message).into()),
        }
    }
}

/// Resolves nothing, for configuration-error paths.
pub struct NoRunnerResolver;

impl RunnerResolver for NoRunnerResolver {
    fn resolve(
        &self,
        _executor: ExecutorKind,
        _profile: &RunProfile,
    ) -> Option<Arc<dyn ProgramRunner>> {
        None
    }
}

/// Records lifecycle notices and forwards them over a channel so tests can
/// await specific events.
pub struct RecordingBus {
    notices: Mutex<Vec<LifecycleNotice>>,
    tx: mpsc::UnboundedSender<LifecycleNotice>,
}

impl RecordingBus {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<LifecycleNotice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                notices: Mutex::new(Vec::new()),
                tx,
            }),
            rx,
        )
    }

    pub fn notices(&self) -> Vec<LifecycleNotice> {
        self.notices.lock().unwrap().clone()
    }
}

impl LifecycleBus for RecordingBus {
    fn publish(&self, notice: LifecycleNotice) {
        self.notices.lock().unwrap().push(notice.clone());
        let _ = self.tx.send(notice);
    }
}

/// A confirmation policy with fixed answers that records every question.
pub struct ScriptedConfirmation {
    approve_rerun: AtomicBool,
    approve_incompatible: AtomicBool,
    rerun_calls: Mutex<Vec<(String, usize)>>,
    incompatible_calls: Mutex<Vec<(String, String, usize)>>,
}

impl ScriptedConfirmation {
    pub fn new(approve_rerun: bool, approve_incompatible: bool) -> Arc<Self> {
        Arc::new(Self {
            approve_rerun: AtomicBool::new(approve_rerun),
            approve_incompatible: AtomicBool::new(approve_incompatible),
            rerun_calls: Mutex::new(Vec::new()),
            incompatible_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn rerun_calls(&self) -> Vec<(String, usize)> {
        self.rerun_calls.lock().unwrap().clone()
    }

    pub fn incompatible_calls(&self) -> Vec<(String, String, usize)> {
        self.incompatible_calls.lock().unwrap().clone()
    }

    pub fn total_prompts(&self) -> usize {
        self.rerun_calls().len() + self.incompatible_calls().len()
    }
}

impl ConfirmationPolicy for ScriptedConfirmation {
    fn confirm_rerun(
        &self,
        profile_name: &str,
        running_count: usize,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        self.rerun_calls
            .lock()
            .unwrap()
            .push((profile_name.to_string(), running_count));
        let answer = self.approve_rerun.load(Ordering::SeqCst);
        Box::pin(async move { answer })
    }

    fn confirm_stop_incompatible(
        &self,
        profile_name: &str,
        running_names: &str,
        running_count: usize,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        self.incompatible_calls.lock().unwrap().push((
            profile_name.to_string(),
            running_names.to_string(),
            running_count,
        ));
        let answer = self.approve_incompatible.load(Ordering::SeqCst);
        Box::pin(async move { answer })
    }
}
