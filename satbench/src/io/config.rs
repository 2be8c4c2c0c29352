//! Harness configuration, optionally loaded from a TOML file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Harness configuration (TOML).
///
/// Every field has a default, so an empty file (or no file at all) describes
/// the stock run: `.cnf` files under `instance/`, the release solver build,
/// a 60 second timeout and a single worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Root of the instance tree (a directory or a single file).
    pub instance_root: PathBuf,

    /// Only files whose name ends with this suffix are run.
    pub instance_suffix: String,

    /// Solver executable, invoked once per instance with the instance on stdin.
    pub solver_path: PathBuf,

    /// Extra arguments passed to the solver.
    pub solver_args: Vec<String>,

    /// Per-trial wall-clock budget in seconds.
    pub timeout_secs: u64,

    /// Number of trials run concurrently.
    pub worker_count: usize,

    /// Directory under which each run creates its own result directory.
    pub output_root: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            instance_root: PathBuf::from("instance"),
            instance_suffix: ".cnf".to_string(),
            solver_path: PathBuf::from("../target/release/trial_sat"),
            solver_args: Vec::new(),
            timeout_secs: 60,
            worker_count: 1,
            output_root: PathBuf::from("."),
        }
    }
}

/// Values given on the command line; `None` keeps the configured value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub instance_root: Option<PathBuf>,
    pub instance_suffix: Option<String>,
    pub solver_path: Option<PathBuf>,
    pub solver_args: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
    pub worker_count: Option<usize>,
    pub output_root: Option<PathBuf>,
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be > 0"));
        }
        if self.worker_count == 0 {
            return Err(anyhow!("worker_count must be >= 1"));
        }
        if self.instance_suffix.is_empty() {
            return Err(anyhow!("instance_suffix must be non-empty"));
        }
        if self.solver_path.as_os_str().is_empty() {
            return Err(anyhow!("solver_path must be non-empty"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Apply command-line overrides, then re-validate.
    pub fn apply_overrides(mut self, overrides: ConfigOverrides) -> Result<Self> {
        if let Some(instance_root) = overrides.instance_root {
            self.instance_root = instance_root;
        }
        if let Some(instance_suffix) = overrides.instance_suffix {
            self.instance_suffix = instance_suffix;
        }
        if let Some(solver_path) = overrides.solver_path {
            self.solver_path = solver_path;
        }
        if let Some(solver_args) = overrides.solver_args {
            self.solver_args = solver_args;
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.timeout_secs = timeout_secs;
        }
        if let Some(worker_count) = overrides.worker_count {
            self.worker_count = worker_count;
        }
        if let Some(output_root) = overrides.output_root {
            self.output_root = output_root;
        }
        self.validate()?;
        Ok(self)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}
