// src/launch/before_run.rs

//! Pre-launch step pipeline.
//!
//! Steps run in order, off the coordinator task. A step whose provider id
//! is unknown is skipped with a warning; a step whose provider reports
//! failure aborts the rest of the sequence. Shutdown is checked before
//! every step so a closing application never keeps building.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::profile::{BeforeStep, RunProfile};

/// Executes one kind of pre-launch step, identified by provider id.
pub trait BeforeStepProvider: Send + Sync {
    /// Run the step. `false` aborts the whole pipeline.
    fn execute(
        &self,
        profile: &RunProfile,
        step: &BeforeStep,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

/// Registry of before-step providers, keyed by id.
#[derive(Default)]
pub struct BeforeStepProviders {
    providers: HashMap<String, Arc<dyn BeforeStepProvider>>,
}

impl BeforeStepProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        id: impl Into<String>,
        provider: Arc<dyn BeforeStepProvider>,
    ) -> Self {
        self.providers.insert(id.into(), provider);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn BeforeStepProvider>> {
        self.providers.get(id)
    }
}

/// How a before-step sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeforeStepsOutcome {
    /// Every step succeeded (or was skipped); the launch may proceed.
    Completed,
    /// A provider reported failure; the launch is cancelled.
    Failed,
    /// Shutdown was observed; abandon silently.
    Aborted,
}

/// Run the profile's before-steps in order.
pub async fn run_before_steps(
    profile: &RunProfile,
    providers: &BeforeStepProviders,
    shutting_down: &Arc<AtomicBool>,
) -> BeforeStepsOutcome {
    for (idx, step) in profile.before.iter().enumerate() {
        if shutting_down.load(Ordering::SeqCst) {
            debug!(profile = %profile.id, "shutdown observed; abandoning before-steps");
            return BeforeStepsOutcome::Aborted;
        }

        let provider = match providers.get(&step.provider) {
            Some(p) => p,
            None => {
                warn!(
                    profile = %profile.id,
                    provider = %step.provider,
                    "no before-step provider registered for id; skipping step"
                );
                continue;
            }
        };

        debug!(
            profile = %profile.id,
            provider = %step.provider,
            step = idx + 1,
            "running before-step"
        );

        if !provider.execute(profile, step).await {
            info!(
                profile = %profile.id,
                provider = %step.provider,
                step = idx + 1,
                "before-step failed; cancelling launch"
            );
            return BeforeStepsOutcome::Failed;
        }
    }

    BeforeStepsOutcome::Completed
}

/// Built-in provider that runs a shell command; success is exit code 0.
pub struct ShellStepProvider;

impl BeforeStepProvider for ShellStepProvider {
    fn execute(
        &self,
        profile: &RunProfile,
        step: &BeforeStep,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let profile_id = profile.id.clone();
        let cwd = profile.cwd.clone();
        let cmd_line = step.cmd.clone();

        Box::pin(async move {
            let cmd_line = match cmd_line {
                Some(c) => c,
                None => {
                    warn!(profile = %profile_id, "shell before-step has no `cmd`; nothing to run");
                    return true;
                }
            };

            let mut cmd = if cfg!(windows) {
                let mut c = Command::new("cmd");
                c.arg("/C").arg(&cmd_line);
                c
            } else {
                let mut c = Command::new("sh");
                c.arg("-c").arg(&cmd_line);
                c
            };
            cmd.stdin(Stdio::null());
            if let Some(cwd) = &cwd {
                cmd.current_dir(cwd);
            }

            match cmd.status().await {
                Ok(status) => {
                    debug!(
                        profile = %profile_id,
                        cmd = %cmd_line,
                        exit_code = ?status.code(),
                        "shell before-step finished"
                    );
                    status.success()
                }
                Err(e) => {
                    warn!(
                        profile = %profile_id,
                        cmd = %cmd_line,
                        error = %e,
                        "failed to run shell before-step"
                    );
                    false
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn profile_with_steps(steps: Vec<BeforeStep>) -> RunProfile {
        RunProfile {
            id: "p".to_string(),
            display_name: "p".to_string(),
            cmd: "echo p".to_string(),
            cwd: None,
            env: BTreeMap::new(),
            singleton: false,
            must_stop_for: None,
            detach_is_default: false,
            before: steps,
        }
    }

    fn step(provider: &str) -> BeforeStep {
        BeforeStep {
            provider: provider.to_string(),
            cmd: None,
        }
    }

    struct FixedProvider {
        result: bool,
        calls: Arc<AtomicUsize>,
    }

    impl BeforeStepProvider for FixedProvider {
        fn execute(
            &self,
            _profile: &RunProfile,
            _step: &BeforeStep,
        ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = self.result;
            Box::pin(async move { result })
        }
    }

    fn providers_with(id: &str, result: bool, calls: Arc<AtomicUsize>) -> BeforeStepProviders {
        BeforeStepProviders::new().register(id, Arc::new(FixedProvider { result, calls }))
    }

    #[tokio::test]
    async fn no_steps_completes_immediately() {
        let profile = profile_with_steps(vec![]);
        let providers = BeforeStepProviders::new();
        let shutdown = Arc::new(AtomicBool::new(false));

        let outcome = run_before_steps(&profile, &providers, &shutdown).await;
        assert_eq!(outcome, BeforeStepsOutcome::Completed);
    }

    #[tokio::test]
    async fn missing_provider_is_skipped_not_fatal() {
        let profile = profile_with_steps(vec![step("nope"), step("ok")]);
        let calls = Arc::new(AtomicUsize::new(0));
        let providers = providers_with("ok", true, Arc::clone(&calls));
        let shutdown = Arc::new(AtomicBool::new(false));

        let outcome = run_before_steps(&profile, &providers, &shutdown).await;
        assert_eq!(outcome, BeforeStepsOutcome::Completed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_step_aborts_the_rest() {
        let profile = profile_with_steps(vec![step("fail"), step("fail")]);
        let calls = Arc::new(AtomicUsize::new(0));
        let providers = providers_with("fail", false, Arc::clone(&calls));
        let shutdown = Arc::new(AtomicBool::new(false));

        let outcome = run_before_steps(&profile, &providers, &shutdown).await;
        assert_eq!(outcome, BeforeStepsOutcome::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_aborts_before_any_step() {
        let profile = profile_with_steps(vec![step("ok")]);
        let calls = Arc::new(AtomicUsize::new(0));
        let providers = providers_with("ok", true, Arc::clone(&calls));
        let shutdown = Arc::new(AtomicBool::new(true));

        let outcome = run_before_steps(&profile, &providers, &shutdown).await;
        assert_eq!(outcome, BeforeStepsOutcome::Aborted);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn shell_provider_reports_exit_status() {
        let profile = profile_with_steps(vec![]);
        let provider = ShellStepProvider;

        let ok = provider
            .execute(
                &profile,
                &BeforeStep {
                    provider: "shell".to_string(),
                    cmd: Some("true".to_string()),
                },
            )
            .await;
        assert!(ok);

        let fail = provider
            .execute(
                &profile,
                &BeforeStep {
                    provider: "shell".to_string(),
                    cmd: Some("exit 3".to_string()),
                },
            )
            .await;
        assert!(!fail);
    }
}
