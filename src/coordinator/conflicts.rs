// src/coordinator/conflicts.rs

//! Pure conflict computation for restart requests.
//!
//! Given a registry snapshot and a request, decide which running instances
//! must be stopped before the launch, and whether/with what message the
//! user must confirm. No IO, no channels; extensively unit tested.

use std::sync::Arc;

use crate::session::{RunDescriptor, TrackedRun};

/// Shown in the incompatible-stop prompt for runs without a display name.
const UNNAMED: &str = "<unnamed>";

/// The running instances conflicting with a restart request.
#[derive(Default)]
pub struct ConflictSet {
    /// Running instances of the identical profile (singleton policy), or
    /// the reused container when it still has a live process.
    pub same_type: Vec<Arc<RunDescriptor>>,

    /// Running instances whose profile declares it must be stopped before
    /// the requested profile may start.
    pub incompatible: Vec<Arc<RunDescriptor>>,
}

impl ConflictSet {
    pub fn is_empty(&self) -> bool {
        self.same_type.is_empty() && self.incompatible.is_empty()
    }

    /// Everything that must be stopped, same-type conflicts first.
    pub fn to_stop(&self) -> Vec<Arc<RunDescriptor>> {
        self.same_type
            .iter()
            .chain(self.incompatible.iter())
            .cloned()
            .collect()
    }
}

/// Compute the conflict set for a request.
///
/// - `profile` is the requested profile, if any; without one there are no
///   incompatibility conflicts and singleton policy does not apply.
/// - `reuse` is the container the request wants to restart in place.
pub fn compute_conflicts(
    snapshot: &[TrackedRun],
    profile: Option<&crate::profile::RunProfile>,
    reuse: Option<&Arc<RunDescriptor>>,
) -> ConflictSet {
    let incompatible = match profile {
        None => Vec::new(),
        Some(target) => snapshot
            .iter()
            .filter(|run| run.is_running())
            .filter(|run| {
                run.profile
                    .as_ref()
                    .is_some_and(|running| running.must_be_stopped_for(&target.id))
            })
            .map(|run| Arc::clone(&run.descriptor))
            .collect(),
    };

    let mut same_type = Vec::new();
    match profile {
        Some(target) if target.singleton => {
            same_type.extend(
                snapshot
                    .iter()
                    .filter(|run| run.is_running())
                    .filter(|run| {
                        run.profile
                            .as_ref()
                            .is_some_and(|running| running.id == target.id)
                    })
                    .map(|run| Arc::clone(&run.descriptor)),
            );
        }
        _ => {
            if let Some(container) = reuse {
                if container.has_live_process() {
                    same_type.push(Arc::clone(container));
                }
            }
        }
    }

    ConflictSet {
        same_type,
        incompatible,
    }
}

/// Confirmation is skipped only when the single same-type conflict *is* the
/// container being reused (restarting in place).
pub fn same_type_confirmation_needed(
    same_type: &[Arc<RunDescriptor>],
    reuse: Option<&Arc<RunDescriptor>>,
) -> bool {
    if same_type.is_empty() {
        return false;
    }
    if same_type.len() > 1 {
        return true;
    }
    match reuse {
        Some(container) => !Arc::ptr_eq(container, &same_type[0]),
        None => true,
    }
}

/// Join conflicting runs' display names for the incompatible-stop prompt:
/// quoted, comma-separated, with a placeholder for unnamed runs.
pub fn joined_display_names(descriptors: &[Arc<RunDescriptor>]) -> String {
    descriptors
        .iter()
        .map(|d| {
            let name = d.display_name();
            if name.is_empty() {
                UNNAMED.to_string()
            } else {
                format!("'{name}'")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::process::{ProcessHandle, SharedProcessHandle};
    use crate::profile::RunProfile;
    use crate::types::{ExecutionId, ExecutorKind};

    /// Minimal live/terminating/terminated handle for conflict queries.
    #[derive(Default)]
    struct StubHandle {
        terminating: AtomicBool,
        terminated: AtomicBool,
    }

    impl ProcessHandle for StubHandle {
        fn is_terminated(&self) -> bool {
            self.terminated.load(Ordering::SeqCst)
        }

        fn is_terminating(&self) -> bool {
            self.terminating.load(Ordering::SeqCst)
        }

        fn destroy(&self) {}

        fn detach(&self) {}
    }

    fn profile(id: &str, singleton: bool, must_stop_for: Option<Vec<&str>>) -> Arc<RunProfile> {
        Arc::new(RunProfile {
            id: id.to_string(),
            display_name: id.to_string(),
            cmd: format!("echo {id}"),
            cwd: None,
            env: BTreeMap::new(),
            singleton,
            must_stop_for: must_stop_for
                .map(|v| v.into_iter().map(String::from).collect()),
            detach_is_default: false,
            before: Vec::new(),
        })
    }

    fn live_run(id: u64, profile: &Arc<RunProfile>) -> TrackedRun {
        let handle: SharedProcessHandle = Arc::new(StubHandle::default());
        TrackedRun {
            descriptor: Arc::new(RunDescriptor::new(
                ExecutionId(id),
                profile.display_name.clone(),
                Some(profile.id.clone()),
                Some(handle),
            )),
            profile: Some(Arc::clone(profile)),
            executor: ExecutorKind::Run,
        }
    }

    fn terminating_run(id: u64, profile: &Arc<RunProfile>) -> TrackedRun {
        let handle = Arc::new(StubHandle::default());
        handle.terminating.store(true, Ordering::SeqCst);
        TrackedRun {
            descriptor: Arc::new(RunDescriptor::new(
                ExecutionId(id),
                profile.display_name.clone(),
                Some(profile.id.clone()),
                Some(handle as SharedProcessHandle),
            )),
            profile: Some(Arc::clone(profile)),
            executor: ExecutorKind::Run,
        }
    }

    #[test]
    fn no_profile_and_no_reuse_has_no_conflicts() {
        let web = profile("web", true, None);
        let snapshot = vec![live_run(1, &web)];

        let conflicts = compute_conflicts(&snapshot, None, None);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn singleton_collects_all_same_profile_runs() {
        let web = profile("web", true, None);
        let other = profile("db", false, None);
        let snapshot = vec![live_run(1, &web), live_run(2, &web), live_run(3, &other)];

        let conflicts = compute_conflicts(&snapshot, Some(&web), None);
        assert_eq!(conflicts.same_type.len(), 2);
        assert!(conflicts.incompatible.is_empty());
    }

    #[test]
    fn non_singleton_ignores_other_instances() {
        let web = profile("web", false, None);
        let snapshot = vec![live_run(1, &web), live_run(2, &web)];

        let conflicts = compute_conflicts(&snapshot, Some(&web), None);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn non_singleton_includes_live_reused_container() {
        let web = profile("web", false, None);
        let run = live_run(1, &web);
        let snapshot = vec![run.clone()];

        let conflicts = compute_conflicts(&snapshot, Some(&web), Some(&run.descriptor));
        assert_eq!(conflicts.same_type.len(), 1);
        assert!(Arc::ptr_eq(&conflicts.same_type[0], &run.descriptor));
    }

    #[test]
    fn terminating_runs_are_excluded_from_running_queries() {
        let web = profile("web", true, None);
        let snapshot = vec![terminating_run(1, &web)];

        let conflicts = compute_conflicts(&snapshot, Some(&web), None);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn incompatibility_is_declared_by_the_running_profile() {
        let db = profile("db", false, Some(vec!["web"]));
        let web = profile("web", false, None);
        let snapshot = vec![live_run(1, &db)];

        let conflicts = compute_conflicts(&snapshot, Some(&web), None);
        assert_eq!(conflicts.incompatible.len(), 1);

        // The reverse direction does not conflict.
        let snapshot = vec![live_run(2, &web)];
        let conflicts = compute_conflicts(&snapshot, Some(&db), None);
        assert!(conflicts.incompatible.is_empty());
    }

    #[test]
    fn restart_in_place_skips_confirmation() {
        let web = profile("web", true, None);
        let run = live_run(1, &web);

        assert!(!same_type_confirmation_needed(
            &[Arc::clone(&run.descriptor)],
            Some(&run.descriptor)
        ));
    }

    #[test]
    fn confirmation_required_without_reuse_or_with_multiple_conflicts() {
        let web = profile("web", true, None);
        let a = live_run(1, &web);
        let b = live_run(2, &web);

        assert!(same_type_confirmation_needed(
            &[Arc::clone(&a.descriptor)],
            None
        ));
        assert!(same_type_confirmation_needed(
            &[Arc::clone(&a.descriptor), Arc::clone(&b.descriptor)],
            Some(&a.descriptor)
        ));
        // Reusing a different container still requires confirmation.
        assert!(same_type_confirmation_needed(
            &[Arc::clone(&a.descriptor)],
            Some(&b.descriptor)
        ));
    }

    #[test]
    fn display_names_are_quoted_and_placeholdered() {
        let named = Arc::new(RunDescriptor::new(ExecutionId(1), "web", None, None));
        let unnamed = Arc::new(RunDescriptor::new(ExecutionId(2), "", None, None));

        let joined = joined_display_names(&[named, unnamed]);
        assert_eq!(joined, "'web', <unnamed>");
    }
}
