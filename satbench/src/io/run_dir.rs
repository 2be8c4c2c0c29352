//! Run directory creation.
//!
//! Each invocation gets a fresh directory named from the wall-clock time plus
//! a random short id. The directory is created with an exclusive `create_dir`,
//! so two invocations can never share one even when they start within the same
//! second.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Local;
use rand::{Rng, distributions::Alphanumeric};
use tracing::{debug, info};

use crate::core::naming::build_run_dir_name;

const LOG_DIR: &str = "log";
const RESULT_FILE: &str = "result.txt";
const META_FILE: &str = "meta.json";
const MAX_NAME_ATTEMPTS: usize = 16;

/// Paths of one run's output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    /// The run directory itself.
    pub root: PathBuf,
    /// Directory name (includes timestamp and random suffix).
    pub name: String,
    pub log_dir: PathBuf,
    pub result_path: PathBuf,
    pub meta_path: PathBuf,
}

impl RunDirectory {
    /// Create a new run directory (and its `log/` subdirectory) under `output_root`.
    pub fn create(output_root: &Path) -> Result<Self> {
        fs::create_dir_all(output_root)
            .with_context(|| format!("create output root {}", output_root.display()))?;

        for attempt in 1..=MAX_NAME_ATTEMPTS {
            let name = build_run_dir_name(&generate_timestamp(), &generate_short_id());
            let root = output_root.join(&name);
            match fs::create_dir(&root) {
                Ok(()) => {
                    let run_dir = Self::at(root, name);
                    fs::create_dir(&run_dir.log_dir).with_context(|| {
                        format!("create log dir {}", run_dir.log_dir.display())
                    })?;
                    info!(run_dir = %run_dir.root.display(), "run directory created");
                    return Ok(run_dir);
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(attempt, name = %name, "run directory name taken, retrying");
                }
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("create run dir {}", root.display()));
                }
            }
        }
        bail!(
            "could not find a free run directory name under {} after {} attempts",
            output_root.display(),
            MAX_NAME_ATTEMPTS
        );
    }

    fn at(root: PathBuf, name: String) -> Self {
        Self {
            log_dir: root.join(LOG_DIR),
            result_path: root.join(RESULT_FILE),
            meta_path: root.join(META_FILE),
            root,
            name,
        }
    }

    pub fn log_path(&self, file_name: &str) -> PathBuf {
        self.log_dir.join(file_name)
    }
}

/// Local wall-clock time as `YYYYmmdd_HHMMSS`.
fn generate_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn generate_short_id() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase()
}
