//! Batch SAT solver trial harness.
//!
//! `satbench` with no arguments runs `../target/release/trial_sat` over every
//! `.cnf` file under `instance/` and writes `result_<time>_<id>/` in the
//! current directory.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use satbench::cancel::{CancelToken, install_ctrl_c};
use satbench::core::naming::assign_log_names;
use satbench::exit_codes;
use satbench::io::config::{ConfigOverrides, HarnessConfig, load_config};
use satbench::io::instances::discover_instances;
use satbench::logging;
use satbench::run::{RunSummary, run_harness};
use tracing::warn;

#[derive(Parser)]
#[command(
    name = "satbench",
    version,
    about = "Run a SAT solver over a directory of instances and record the results"
)]
struct Cli {
    /// TOML config file (a missing file means defaults).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the solver once per instance (the default command).
    Run(RunArgs),
    /// Print the instances a run would execute, in order, with their log names.
    List(InstanceArgs),
}

#[derive(Args, Debug, Default)]
struct InstanceArgs {
    /// Instance root directory (or a single instance file).
    #[arg(long, value_name = "PATH")]
    instances: Option<PathBuf>,

    /// Only run files whose name ends with this suffix.
    #[arg(long)]
    suffix: Option<String>,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    #[command(flatten)]
    instances: InstanceArgs,

    /// Solver executable.
    #[arg(long, value_name = "PATH")]
    solver: Option<PathBuf>,

    /// Per-instance timeout in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Number of trials to run concurrently.
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Directory in which the run directory is created.
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Extra arguments passed to the solver (after `--`).
    #[arg(last = true)]
    solver_args: Vec<String>,
}

impl RunArgs {
    fn overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            solver_path: self.solver,
            solver_args: (!self.solver_args.is_empty()).then_some(self.solver_args),
            timeout_secs: self.timeout,
            worker_count: self.workers,
            output_root: self.output,
            ..self.instances.overrides()
        }
    }
}

impl InstanceArgs {
    fn overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            instance_root: self.instances,
            instance_suffix: self.suffix,
            ..ConfigOverrides::default()
        }
    }
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::FATAL);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let base = match &cli.config {
        Some(path) => load_config(path)?,
        None => HarnessConfig::default(),
    };
    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => cmd_run(base.apply_overrides(args.overrides())?),
        Command::List(args) => cmd_list(&base.apply_overrides(args.overrides())?),
    }
}

fn cmd_run(config: HarnessConfig) -> Result<i32> {
    let cancel = CancelToken::new();
    if let Err(err) = install_ctrl_c(cancel.clone()) {
        warn!(err = %format!("{err:#}"), "ctrl-c handling unavailable");
    }
    let summary = run_harness(&config, &cancel, Box::new(io::stdout()))?;
    eprintln!("{}", render_summary(&summary));
    if summary.cancelled {
        Ok(exit_codes::CANCELLED)
    } else {
        Ok(exit_codes::OK)
    }
}

fn cmd_list(config: &HarnessConfig) -> Result<i32> {
    let instances = discover_instances(&config.instance_root, &config.instance_suffix)
        .context("discover instances")?;
    let log_names = assign_log_names(&instances, &config.instance_suffix);
    for (instance, log_name) in instances.iter().zip(log_names) {
        println!("{}\t{}", instance.path().display(), log_name);
    }
    Ok(exit_codes::OK)
}

fn render_summary(summary: &RunSummary) -> String {
    let mut line = format!(
        "done: run_dir={} rows={}/{}",
        summary.run_dir.display(),
        summary.completed,
        summary.total
    );
    if summary.cancelled {
        line.push_str(" cancelled=true");
    }
    line.push_str(&render_counts(&summary.status_counts));
    line
}

fn render_counts(counts: &BTreeMap<String, usize>) -> String {
    counts
        .iter()
        .map(|(status, count)| {
            let label = if status.is_empty() { "(empty)" } else { status };
            format!(" {label}={count}")
        })
        .collect()
}
