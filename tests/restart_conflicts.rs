// tests/restart_conflicts.rs

//! Confirmation gating: declines must leave the world untouched.

mod common;

use crate::common::{
    await_event, init_tracing, register_running, settle, spawn_harness,
};

use std::sync::Arc;

use relaunch::coordinator::LifecycleEvent;
use relaunch::types::ExecutorKind;
use relaunch_test_utils::builders::{ProfileConfigBuilder, run_profile};
use relaunch_test_utils::fakes::FakeProcessHandle;

#[tokio::test]
async fn singleton_decline_has_zero_side_effects() {
    init_tracing();

    let h = spawn_harness(false, true);
    let web = run_profile("web", ProfileConfigBuilder::new("echo web").singleton());

    let handle = FakeProcessHandle::new();
    register_running(&h, &web, 1, &handle);

    h.handle
        .restart_profile(Arc::clone(&web), ExecutorKind::Run)
        .unwrap();
    settle().await;

    // Asked exactly once, with the running-instance count.
    assert_eq!(h.policy.rerun_calls(), vec![("web".to_string(), 1)]);
    // No stop calls, no launch, no notifications (launch never attempted).
    assert!(!handle.was_stopped());
    assert_eq!(h.runner.launch_count(), 0);
    assert!(h.bus.notices().is_empty());
    assert_eq!(h.handle.registry().len(), 1);
}

#[tokio::test]
async fn singleton_prompt_reports_the_number_of_running_instances() {
    init_tracing();

    let h = spawn_harness(false, true);
    let web = run_profile("web", ProfileConfigBuilder::new("echo web").singleton());

    register_running(&h, &web, 1, &FakeProcessHandle::new());
    register_running(&h, &web, 2, &FakeProcessHandle::new());
    register_running(&h, &web, 3, &FakeProcessHandle::new());

    h.handle
        .restart_profile(Arc::clone(&web), ExecutorKind::Run)
        .unwrap();
    settle().await;

    assert_eq!(h.policy.rerun_calls(), vec![("web".to_string(), 3)]);
}

#[tokio::test]
async fn incompatible_decline_keeps_the_victim_running() {
    init_tracing();

    let h = spawn_harness(true, false);
    let db = run_profile(
        "db",
        ProfileConfigBuilder::new("echo db").must_stop_for("web"),
    );
    let web = run_profile("web", ProfileConfigBuilder::new("echo web"));

    let db_handle = FakeProcessHandle::new();
    register_running(&h, &db, 1, &db_handle);

    h.handle
        .restart_profile(Arc::clone(&web), ExecutorKind::Run)
        .unwrap();
    settle().await;

    // The prompt listed the victim by quoted display name.
    assert_eq!(
        h.policy.incompatible_calls(),
        vec![("web".to_string(), "'db'".to_string(), 1)]
    );
    // Declined: db keeps running, web never launches, and notStarted is
    // not published since the launch was never attempted.
    assert!(!db_handle.was_stopped());
    assert_eq!(h.runner.launch_count(), 0);
    assert!(h.bus.notices().is_empty());
}

#[tokio::test]
async fn incompatible_approve_stops_victims_then_launches() {
    init_tracing();

    let mut h = spawn_harness(true, true);
    let db = run_profile(
        "db",
        ProfileConfigBuilder::new("echo db").must_stop_for("web"),
    );
    let web = run_profile("web", ProfileConfigBuilder::new("echo web"));

    let db_handle = FakeProcessHandle::new();
    db_handle.set_auto_exit_on_destroy(true);
    register_running(&h, &db, 1, &db_handle);

    h.handle
        .restart_profile(Arc::clone(&web), ExecutorKind::Run)
        .unwrap();

    let started = await_event(&mut h.notices, LifecycleEvent::Started).await;
    assert_eq!(started.profile.as_deref(), Some("web"));

    assert!(db_handle.calls().contains(&"destroy"));
    assert_eq!(h.runner.launch_count(), 1);
}

#[tokio::test]
async fn unnamed_runs_use_a_placeholder_in_the_prompt() {
    init_tracing();

    let h = spawn_harness(true, false);
    let db = run_profile(
        "db",
        ProfileConfigBuilder::new("echo db")
            .display_name("")
            .must_stop_for("web"),
    );
    let web = run_profile("web", ProfileConfigBuilder::new("echo web"));

    register_running(&h, &db, 1, &FakeProcessHandle::new());

    h.handle
        .restart_profile(Arc::clone(&web), ExecutorKind::Run)
        .unwrap();
    settle().await;

    assert_eq!(
        h.policy.incompatible_calls(),
        vec![("web".to_string(), "<unnamed>".to_string(), 1)]
    );
}

#[tokio::test]
async fn same_type_and_incompatible_prompts_are_independent() {
    init_tracing();

    let mut h = spawn_harness(true, true);
    let web = run_profile("web", ProfileConfigBuilder::new("echo web").singleton());
    let db = run_profile(
        "db",
        ProfileConfigBuilder::new("echo db").must_stop_for("web"),
    );

    let web_handle = FakeProcessHandle::new();
    web_handle.set_auto_exit_on_destroy(true);
    let db_handle = FakeProcessHandle::new();
    db_handle.set_auto_exit_on_destroy(true);
    register_running(&h, &web, 1, &web_handle);
    register_running(&h, &db, 2, &db_handle);

    h.handle
        .restart_profile(Arc::clone(&web), ExecutorKind::Run)
        .unwrap();

    await_event(&mut h.notices, LifecycleEvent::Started).await;

    // One prompt of each kind, both instances stopped.
    assert_eq!(h.policy.rerun_calls(), vec![("web".to_string(), 1)]);
    assert_eq!(
        h.policy.incompatible_calls(),
        vec![("web".to_string(), "'db'".to_string(), 1)]
    );
    assert!(web_handle.was_stopped());
    assert!(db_handle.was_stopped());
}
