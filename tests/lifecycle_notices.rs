// tests/lifecycle_notices.rs

//! Exactly one of {Started, NotStarted} per attempt, and termination
//! notices on process exit.

mod common;

use crate::common::{await_event, init_tracing, settle, spawn_harness};

use std::sync::Arc;

use relaunch::coordinator::LifecycleEvent;
use relaunch::types::{ExecutionId, ExecutorKind};
use relaunch_test_utils::builders::{ProfileConfigBuilder, run_profile};
use relaunch_test_utils::fakes::FakeLaunch;

fn count_outcomes(notices: &[relaunch::coordinator::LifecycleNotice]) -> (usize, usize) {
    let started = notices
        .iter()
        .filter(|n| n.event == LifecycleEvent::Started)
        .count();
    let not_started = notices
        .iter()
        .filter(|n| n.event == LifecycleEvent::NotStarted)
        .count();
    (started, not_started)
}

#[tokio::test]
async fn successful_launch_publishes_started_exactly_once() {
    init_tracing();

    let mut h = spawn_harness(true, true);
    let web = run_profile("web", ProfileConfigBuilder::new("echo web"));

    h.handle
        .restart_profile(Arc::clone(&web), ExecutorKind::Run)
        .unwrap();
    await_event(&mut h.notices, LifecycleEvent::Started).await;
    settle().await;

    assert_eq!(count_outcomes(&h.bus.notices()), (1, 0));
}

#[tokio::test]
async fn launch_error_publishes_not_started_exactly_once() {
    init_tracing();

    let mut h = spawn_harness(true, true);
    h.runner
        .set_mode(FakeLaunch::Fail("spawn exploded".to_string()));
    let web = run_profile("web", ProfileConfigBuilder::new("echo web"));

    h.handle
        .restart_profile(Arc::clone(&web), ExecutorKind::Run)
        .unwrap();
    await_event(&mut h.notices, LifecycleEvent::NotStarted).await;
    settle().await;

    assert_eq!(count_outcomes(&h.bus.notices()), (0, 1));
    assert!(h.handle.registry().is_empty());
}

#[tokio::test]
async fn runner_declining_publishes_not_started() {
    init_tracing();

    let mut h = spawn_harness(true, true);
    h.runner.set_mode(FakeLaunch::NoInstance);
    let web = run_profile("web", ProfileConfigBuilder::new("echo web"));

    h.handle
        .restart_profile(Arc::clone(&web), ExecutorKind::Run)
        .unwrap();
    await_event(&mut h.notices, LifecycleEvent::NotStarted).await;

    assert!(h.handle.registry().is_empty());
}

#[tokio::test]
async fn processless_descriptor_is_tracked_but_not_started() {
    init_tracing();

    let mut h = spawn_harness(true, true);
    h.runner.set_mode(FakeLaunch::NoProcess);
    let web = run_profile("web", ProfileConfigBuilder::new("echo web"));

    h.handle
        .restart_profile(Arc::clone(&web), ExecutorKind::Run)
        .unwrap();
    await_event(&mut h.notices, LifecycleEvent::NotStarted).await;

    // A reusable container with no live process: tracked, not "started".
    assert_eq!(h.handle.registry().len(), 1);
}

#[tokio::test]
async fn process_exit_publishes_terminated_and_cleans_up() {
    init_tracing();

    let mut h = spawn_harness(true, true);
    let web = run_profile("web", ProfileConfigBuilder::new("echo web"));

    h.handle
        .restart_profile(Arc::clone(&web), ExecutorKind::Run)
        .unwrap();
    await_event(&mut h.notices, LifecycleEvent::Started).await;
    assert_eq!(h.handle.registry().len(), 1);

    let handle = h.runner.last_handle().expect("spawned handle");
    handle.finish(Some(0));

    let terminated = await_event(&mut h.notices, LifecycleEvent::Terminated).await;
    assert_eq!(terminated.execution_id, ExecutionId(1));
    settle().await;
    assert!(h.handle.registry().is_empty());
}

#[tokio::test]
async fn destroy_publishes_terminating_before_terminated() {
    init_tracing();

    let mut h = spawn_harness(true, true);
    h.runner.set_auto_exit(false);
    let web = run_profile("web", ProfileConfigBuilder::new("echo web"));

    h.handle
        .restart_profile(Arc::clone(&web), ExecutorKind::Run)
        .unwrap();
    await_event(&mut h.notices, LifecycleEvent::Started).await;

    h.handle.stop_profile("web".to_string()).unwrap();
    await_event(&mut h.notices, LifecycleEvent::Terminating).await;

    let handle = h.runner.last_handle().expect("spawned handle");
    handle.finish(Some(0));
    await_event(&mut h.notices, LifecycleEvent::Terminated).await;
}
