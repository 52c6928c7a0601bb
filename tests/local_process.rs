// tests/local_process.rs

//! End-to-end checks against real OS processes via `LocalProcess` and
//! `CommandRunner`.

mod common;

use crate::common::{await_event, fast_options, init_tracing, settle};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use relaunch::confirm::ConfirmationPolicy;
use relaunch::coordinator::runtime::CoordinatorServices;
use relaunch::coordinator::{Coordinator, LifecycleBus, LifecycleEvent};
use relaunch::launch::runner::ProgramRunner;
use relaunch::launch::{AlwaysReady, BeforeStepProviders, CommandRunner, SingleRunnerResolver};
use relaunch::process::{LocalProcess, ProcessEvent, ProcessHandle};
use relaunch::types::{ExecutionId, ExecutorKind};
use relaunch_test_utils::builders::{ProfileConfigBuilder, run_profile};
use relaunch_test_utils::fakes::{RecordingBus, ScriptedConfirmation};

#[tokio::test]
async fn short_lived_process_reports_termination() {
    init_tracing();

    let profile = run_profile("echoer", ProfileConfigBuilder::new("echo hello"));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = LocalProcess::spawn(&profile, ExecutionId(1), tx).unwrap();

    let event = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no termination event")
        .expect("channel closed");

    assert_eq!(
        event,
        ProcessEvent::Terminated {
            execution_id: ExecutionId(1),
            exit_code: Some(0),
        }
    );
    assert!(handle.is_terminated());
    assert!(!handle.is_terminating());
}

#[tokio::test]
async fn destroy_terminates_a_long_running_process() {
    init_tracing();

    let profile = run_profile("sleeper", ProfileConfigBuilder::new("sleep 30"));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = LocalProcess::spawn(&profile, ExecutionId(7), tx).unwrap();
    assert!(!handle.is_terminated());

    handle.destroy();
    assert!(handle.is_terminating() || handle.is_terminated());

    let first = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no event")
        .expect("channel closed");
    assert_eq!(
        first,
        ProcessEvent::WillTerminate {
            execution_id: ExecutionId(7)
        }
    );

    let second = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no termination event")
        .expect("channel closed");
    assert!(matches!(second, ProcessEvent::Terminated { .. }));
    assert!(handle.is_terminated());
}

#[tokio::test]
async fn singleton_restart_replaces_a_real_process() {
    init_tracing();

    let policy = ScriptedConfirmation::new(true, true);
    let (bus, mut notices) = RecordingBus::new();
    let services = CoordinatorServices {
        resolver: Arc::new(SingleRunnerResolver::new(
            Arc::new(CommandRunner) as Arc<dyn ProgramRunner>
        )),
        policy: Arc::clone(&policy) as Arc<dyn ConfirmationPolicy>,
        bus: Arc::clone(&bus) as Arc<dyn LifecycleBus>,
        providers: Arc::new(BeforeStepProviders::new()),
        gate: Arc::new(AlwaysReady),
    };
    let (coordinator, handle) = Coordinator::new(services, fast_options());
    tokio::spawn(coordinator.run());

    let sleeper = run_profile("sleeper", ProfileConfigBuilder::new("sleep 30").singleton());

    handle
        .restart_profile(Arc::clone(&sleeper), ExecutorKind::Run)
        .unwrap();
    await_event(&mut notices, LifecycleEvent::Started).await;
    let first = handle
        .registry()
        .find_by_execution_id(ExecutionId(1))
        .expect("first run tracked");

    handle
        .restart_profile(Arc::clone(&sleeper), ExecutorKind::Run)
        .unwrap();
    let started = await_event(&mut notices, LifecycleEvent::Started).await;
    assert_eq!(started.execution_id, ExecutionId(2));
    settle().await;

    // The first instance is gone; only the replacement is tracked.
    assert!(first.descriptor.is_disposed());
    assert_eq!(handle.registry().len(), 1);

    handle.shutdown().unwrap();
}
