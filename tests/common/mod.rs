#![allow(dead_code)]

pub use relaunch_test_utils::init_tracing;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use relaunch::confirm::ConfirmationPolicy;
use relaunch::coordinator::runtime::CoordinatorServices;
use relaunch::coordinator::{
    Coordinator, CoordinatorHandle, CoordinatorOptions, LifecycleBus, LifecycleEvent,
    LifecycleNotice,
};
use relaunch::launch::runner::ProgramRunner;
use relaunch::launch::{AlwaysReady, BeforeStepProviders, SingleRunnerResolver};
use relaunch::process::SharedProcessHandle;
use relaunch::profile::RunProfile;
use relaunch::session::{RunDescriptor, TrackedRun};
use relaunch::types::{ExecutionId, ExecutorKind};
use relaunch_test_utils::fakes::{
    FakeProcessHandle, FakeRunner, RecordingBus, ScriptedConfirmation,
};

/// Everything a coordinator test needs in one place.
pub struct Harness {
    pub handle: CoordinatorHandle,
    pub runner: Arc<FakeRunner>,
    pub policy: Arc<ScriptedConfirmation>,
    pub bus: Arc<RecordingBus>,
    pub notices: mpsc::UnboundedReceiver<LifecycleNotice>,
}

/// Millisecond-scale wait cadence so restarts resolve quickly in tests.
pub fn fast_options() -> CoordinatorOptions {
    CoordinatorOptions {
        wait_initial_delay: Duration::from_millis(1),
        wait_interval: Duration::from_millis(2),
        max_wait_checks: None,
    }
}

pub fn spawn_harness(approve_rerun: bool, approve_incompatible: bool) -> Harness {
    spawn_harness_with_providers(approve_rerun, approve_incompatible, BeforeStepProviders::new())
}

pub fn spawn_harness_with_providers(
    approve_rerun: bool,
    approve_incompatible: bool,
    providers: BeforeStepProviders,
) -> Harness {
    let runner = FakeRunner::new();
    let policy = ScriptedConfirmation::new(approve_rerun, approve_incompatible);
    let (bus, notices) = RecordingBus::new();

    let services = CoordinatorServices {
        resolver: Arc::new(SingleRunnerResolver::new(
            Arc::clone(&runner) as Arc<dyn ProgramRunner>
        )),
        policy: Arc::clone(&policy) as Arc<dyn ConfirmationPolicy>,
        bus: Arc::clone(&bus) as Arc<dyn LifecycleBus>,
        providers: Arc::new(providers),
        gate: Arc::new(AlwaysReady),
    };

    let (coordinator, handle) = Coordinator::new(services, fast_options());
    tokio::spawn(coordinator.run());

    Harness {
        handle,
        runner,
        policy,
        bus,
        notices,
    }
}

/// Await the next notice of the given kind, failing the test after 3s.
pub async fn await_event(
    notices: &mut mpsc::UnboundedReceiver<LifecycleNotice>,
    event: LifecycleEvent,
) -> LifecycleNotice {
    timeout(Duration::from_secs(3), async {
        loop {
            let notice = notices.recv().await.expect("lifecycle bus closed");
            if notice.event == event {
                return notice;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {event:?}"))
}

/// Build a tracked run around a fake handle and register it directly,
/// wiring the handle to the coordinator's process event channel.
pub fn register_running(
    harness: &Harness,
    profile: &Arc<RunProfile>,
    execution_id: u64,
    handle: &Arc<FakeProcessHandle>,
) -> TrackedRun {
    handle.wire(
        ExecutionId(execution_id),
        harness.handle.process_event_sender(),
    );
    let run = TrackedRun {
        descriptor: Arc::new(RunDescriptor::new(
            ExecutionId(execution_id),
            profile.display_name.clone(),
            Some(profile.id.clone()),
            Some(Arc::clone(handle) as SharedProcessHandle),
        )),
        profile: Some(Arc::clone(profile)),
        executor: ExecutorKind::Run,
    };
    assert!(harness.handle.registry().register(run.clone()));
    run
}

/// Let queued coordinator work settle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
