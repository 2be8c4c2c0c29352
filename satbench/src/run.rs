//! Run orchestration.
//!
//! Discovers the instance set, creates the run directory, dispatches one trial
//! per instance and records each completion in the result table as it
//! arrives. Only this (coordinating) thread writes the table, the progress
//! sink and `meta.json`.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, instrument};

use crate::cancel::CancelToken;
use crate::core::naming::assign_log_names;
use crate::core::types::{Instance, Trial};
use crate::io::config::HarnessConfig;
use crate::io::instances::discover_instances;
use crate::io::meta::{RunMeta, write_meta};
use crate::io::result_table::ResultTable;
use crate::io::run_dir::RunDirectory;
use crate::schedule::Scheduler;
use crate::trial::{SolverRunner, TrialRunner};

/// Summary of a finished (or cancelled) run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_dir: PathBuf,
    pub result_path: PathBuf,
    pub total: usize,
    /// Rows written to the result table.
    pub completed: usize,
    /// True if cancellation left some trials unrun.
    pub cancelled: bool,
    pub status_counts: BTreeMap<String, usize>,
}

/// Pair each instance with its own log file under `log_dir`.
pub fn plan_trials(instances: Vec<Instance>, run_dir: &RunDirectory, suffix: &str) -> Vec<Trial> {
    let names = assign_log_names(&instances, suffix);
    instances
        .into_iter()
        .zip(names)
        .map(|(instance, name)| Trial::new(instance, run_dir.log_path(&name)))
        .collect()
}

/// Run the configured solver over every instance.
pub fn run_harness(
    config: &HarnessConfig,
    cancel: &CancelToken,
    progress: Box<dyn Write + Send>,
) -> Result<RunSummary> {
    let runner = Arc::new(SolverRunner::from_config(config, cancel.children().clone()));
    run_with_runner(config, runner, cancel, progress)
}

/// Run every instance through `runner`.
///
/// Startup errors (invalid config, missing instance root, unwritable output)
/// are returned before any trial starts. Per-trial problems only show up as
/// statuses. A failure to write the result table ends the run.
#[instrument(skip_all, fields(instance_root = %config.instance_root.display(), workers = config.worker_count))]
pub fn run_with_runner(
    config: &HarnessConfig,
    runner: Arc<dyn TrialRunner>,
    cancel: &CancelToken,
    progress: Box<dyn Write + Send>,
) -> Result<RunSummary> {
    config.validate()?;
    let instances = discover_instances(&config.instance_root, &config.instance_suffix)
        .context("discover instances")?;
    let run_dir = RunDirectory::create(&config.output_root).context("create run directory")?;
    let trials = plan_trials(instances, &run_dir, &config.instance_suffix);
    let total = trials.len();
    info!(total, run_dir = %run_dir.root.display(), "run started");

    let mut table = ResultTable::create(&run_dir.result_path, total, progress)?;
    let mut meta = RunMeta {
        run_dir: run_dir.name.clone(),
        config: config.clone(),
        started_at: Utc::now().to_rfc3339(),
        finished_at: None,
        total,
        completed: 0,
        cancelled: false,
        status_counts: BTreeMap::new(),
    };
    write_meta(&run_dir.meta_path, &meta)?;

    let scheduler = Scheduler::new(config.worker_count, cancel.clone());
    for completed in scheduler.dispatch(trials, runner)? {
        let row = table.append(&completed.result)?;
        *meta.status_counts.entry(row.status).or_insert(0) += 1;
    }

    meta.completed = table.rows_written();
    meta.cancelled = meta.completed < total;
    meta.finished_at = Some(Utc::now().to_rfc3339());
    write_meta(&run_dir.meta_path, &meta)?;
    info!(
        completed = meta.completed,
        total,
        cancelled = meta.cancelled,
        "run finished"
    );

    Ok(RunSummary {
        run_dir: run_dir.root,
        result_path: table.path().to_path_buf(),
        total,
        completed: meta.completed,
        cancelled: meta.cancelled,
        status_counts: meta.status_counts,
    })
}
