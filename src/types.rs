use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Identifier of one launch attempt / tracked run.
///
/// Assigned from a monotonic counter by the coordinator; requests that
/// arrive without an id get a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionId(pub u64);

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of executor a launch runs under.
///
/// Lifecycle notifications are published per executor kind, and in-flight
/// launch tracking is keyed by (executor, profile). Two requests with
/// different executor kinds never count as "the same launch".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    Run,
    Debug,
}

impl ExecutorKind {
    /// Stable identifier used in notifications and logs.
    pub fn id(self) -> &'static str {
        match self {
            ExecutorKind::Run => "run",
            ExecutorKind::Debug => "debug",
        }
    }
}

impl Default for ExecutorKind {
    fn default() -> Self {
        ExecutorKind::Run
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ExecutorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "run" => Ok(ExecutorKind::Run),
            "debug" => Ok(ExecutorKind::Debug),
            other => Err(format!(
                "invalid executor kind: {other} (expected \"run\" or \"debug\")"
            )),
        }
    }
}
