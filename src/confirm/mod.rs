// src/confirm/mod.rs

//! Confirmation prompts guarding destructive restarts.
//!
//! Two independent questions, each gated by its own persisted
//! "don't ask again" preference:
//!
//! - rerun a singleton profile that is already running,
//! - stop incompatible profiles so the requested one may start.
//!
//! The coordinator talks to [`ConfirmationPolicy`]; the default
//! implementation [`PrefsConfirmation`] consults [`prefs::ConfirmPrefs`]
//! and delegates the actual question to a [`Prompt`] (terminal prompt in
//! the CLI, scripted prompt in tests).

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

pub mod prefs;

pub use prefs::ConfirmPrefs;

/// Answer to a single prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptAnswer {
    pub approved: bool,
    /// When `false`, the user asked not to be prompted again.
    pub ask_again: bool,
}

/// Raw yes/no question surface.
pub trait Prompt: Send + Sync {
    fn ask(&self, question: String) -> Pin<Box<dyn Future<Output = PromptAnswer> + Send + '_>>;
}

/// What the coordinator consumes: fully-gated confirmation decisions.
pub trait ConfirmationPolicy: Send + Sync {
    /// Confirm stopping `running_count` instance(s) of `profile_name` so it
    /// can be rerun.
    fn confirm_rerun(
        &self,
        profile_name: &str,
        running_count: usize,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;

    /// Confirm stopping the named incompatible runs so `profile_name` can
    /// start. `running_names` is the pre-joined display-name list.
    fn confirm_stop_incompatible(
        &self,
        profile_name: &str,
        running_names: &str,
        running_count: usize,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

/// Approves everything without prompting (used for `--yes`).
pub struct AutoApprove;

impl ConfirmationPolicy for AutoApprove {
    fn confirm_rerun(
        &self,
        _profile_name: &str,
        _running_count: usize,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async { true })
    }

    fn confirm_stop_incompatible(
        &self,
        _profile_name: &str,
        _running_names: &str,
        _running_count: usize,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async { true })
    }
}

/// Preference-gated confirmation backed by a [`Prompt`].
///
/// When a preference says confirmation is not required, the question is
/// skipped and treated as approved. A "don't ask again" answer is only
/// persisted when the user approved (a decline never saves options).
pub struct PrefsConfirmation {
    prefs: Mutex<ConfirmPrefs>,
    path: Option<PathBuf>,
    prompt: Arc<dyn Prompt>,
}

impl PrefsConfirmation {
    pub fn new(prefs: ConfirmPrefs, path: Option<PathBuf>, prompt: Arc<dyn Prompt>) -> Self {
        Self {
            prefs: Mutex::new(prefs),
            path,
            prompt,
        }
    }

    fn persist(&self, prefs: &ConfirmPrefs) {
        if let Some(path) = &self.path {
            if let Err(e) = prefs.save(path) {
                warn!(path = %path.display(), error = %e, "failed to save confirmation preferences");
            }
        }
    }
}

impl ConfirmationPolicy for PrefsConfirmation {
    fn confirm_rerun(
        &self,
        profile_name: &str,
        running_count: usize,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let profile_name = profile_name.to_string();
        Box::pin(async move {
            if !self.prefs.lock().unwrap().confirm_rerun {
                debug!(profile = %profile_name, "rerun confirmation disabled by preference");
                return true;
            }

            let question = format!(
                "'{profile_name}' is already running ({running_count} instance(s) will be stopped). Rerun it?"
            );
            let answer = self.prompt.ask(question).await;

            if answer.approved && !answer.ask_again {
                let mut prefs = self.prefs.lock().unwrap();
                prefs.confirm_rerun = false;
                let snapshot = prefs.clone();
                drop(prefs);
                self.persist(&snapshot);
            }
            answer.approved
        })
    }

    fn confirm_stop_incompatible(
        &self,
        profile_name: &str,
        running_names: &str,
        running_count: usize,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let profile_name = profile_name.to_string();
        let running_names = running_names.to_string();
        Box::pin(async move {
            if !self.prefs.lock().unwrap().confirm_stop_incompatible {
                debug!(profile = %profile_name, "incompatible-stop confirmation disabled by preference");
                return true;
            }

            let question = format!(
                "{running_count} incompatible run(s) must be stopped before '{profile_name}' can start: {running_names}. Stop them?"
            );
            let answer = self.prompt.ask(question).await;

            if answer.approved && !answer.ask_again {
                let mut prefs = self.prefs.lock().unwrap();
                prefs.confirm_stop_incompatible = false;
                let snapshot = prefs.clone();
                drop(prefs);
                self.persist(&snapshot);
            }
            answer.approved
        })
    }
}
