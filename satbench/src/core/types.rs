//! Shared types for one harness run.
//!
//! An [`Instance`] is enumerated once, paired with a log destination to form a
//! [`Trial`], and executed exactly once to produce a [`TrialResult`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Immutable reference to one problem file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instance {
    path: PathBuf,
    name: String,
}

impl Instance {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base name of the instance file (last path component).
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One instance paired with the log file dedicated to its single execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trial {
    instance: Instance,
    log_path: PathBuf,
}

impl Trial {
    pub fn new(instance: Instance, log_path: impl Into<PathBuf>) -> Self {
        Self {
            instance,
            log_path: log_path.into(),
        }
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

/// Classification of a trial outcome.
///
/// `Timeout` and `Error` are assigned by the harness. `Reported` carries the
/// solver's final output line verbatim, which may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrialStatus {
    Timeout,
    Error,
    Reported(String),
}

impl TrialStatus {
    pub const TIMEOUT: &'static str = "TIMEOUT";
    pub const ERROR: &'static str = "ERROR";

    pub fn as_str(&self) -> &str {
        match self {
            TrialStatus::Timeout => Self::TIMEOUT,
            TrialStatus::Error => Self::ERROR,
            TrialStatus::Reported(token) => token,
        }
    }
}

impl fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one trial. Fields are set once at construction and never change.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult {
    instance_path: PathBuf,
    status: TrialStatus,
    elapsed: Duration,
}

impl TrialResult {
    pub fn new(instance_path: impl Into<PathBuf>, status: TrialStatus, elapsed: Duration) -> Self {
        Self {
            instance_path: instance_path.into(),
            status,
            elapsed,
        }
    }

    pub fn instance_path(&self) -> &Path {
        &self.instance_path
    }

    pub fn status(&self) -> &TrialStatus {
        &self.status
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_name_is_last_component() {
        let instance = Instance::new("instance/uf20/uf20-01.cnf");
        assert_eq!(instance.name(), "uf20-01.cnf");
        assert_eq!(instance.path(), Path::new("instance/uf20/uf20-01.cnf"));
    }

    #[test]
    fn harness_statuses_render_as_fixed_tokens() {
        assert_eq!(TrialStatus::Timeout.to_string(), "TIMEOUT");
        assert_eq!(TrialStatus::Error.to_string(), "ERROR");
        assert_eq!(TrialStatus::Reported("UNSAT".into()).to_string(), "UNSAT");
        assert_eq!(TrialStatus::Reported(String::new()).to_string(), "");
    }
}
