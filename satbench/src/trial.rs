//! Trial execution.
//!
//! The [`TrialRunner`] trait decouples scheduling from how a trial is actually
//! executed. [`SolverRunner`] spawns the external solver; tests use scripted
//! runners that return predetermined results without spawning processes.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::core::status::status_from_log;
use crate::core::types::{Trial, TrialResult, TrialStatus};
use crate::io::config::HarnessConfig;
use crate::io::process::{LiveChildren, ProcessOutcome, run_with_timeout};

/// Executes one trial. Implementations must not fail: every problem is folded
/// into the returned status.
pub trait TrialRunner: Send + Sync {
    fn execute(&self, trial: &Trial) -> TrialResult;
}

/// Runs the external solver with the instance on stdin and stdout/stderr
/// combined into the trial's log file.
#[derive(Debug, Clone)]
pub struct SolverRunner {
    pub solver_path: PathBuf,
    pub solver_args: Vec<String>,
    pub timeout: Duration,
    /// Every solver process is registered here while it runs.
    pub children: LiveChildren,
}

impl SolverRunner {
    pub fn from_config(config: &HarnessConfig, children: LiveChildren) -> Self {
        Self {
            solver_path: config.solver_path.clone(),
            solver_args: config.solver_args.clone(),
            timeout: config.timeout(),
            children,
        }
    }

    fn run(&self, trial: &Trial) -> Result<(TrialStatus, Duration)> {
        let instance_path = trial.instance().path();
        let log_path = trial.log_path();

        let stdin = File::open(instance_path)
            .with_context(|| format!("open instance {}", instance_path.display()))?;
        let stdout =
            File::create(log_path).with_context(|| format!("create log {}", log_path.display()))?;
        let stderr = stdout.try_clone().context("clone log handle")?;

        let mut cmd = Command::new(&self.solver_path);
        cmd.args(&self.solver_args)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr);

        let run = run_with_timeout(cmd, self.timeout, &self.children)
            .with_context(|| format!("run solver {}", self.solver_path.display()))?;

        let status = match run.outcome {
            ProcessOutcome::TimedOut => TrialStatus::Timeout,
            ProcessOutcome::Exited(exit) => {
                debug!(exit_code = ?exit.code(), "solver exited");
                let log = fs::read(log_path)
                    .with_context(|| format!("read log {}", log_path.display()))?;
                status_from_log(&log)
            }
        };
        Ok((status, run.elapsed))
    }
}

impl TrialRunner for SolverRunner {
    #[instrument(skip_all, fields(instance = %trial.instance().path().display()))]
    fn execute(&self, trial: &Trial) -> TrialResult {
        let started = Instant::now();
        let (status, elapsed) = match self.run(trial) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "trial failed");
                note_error(trial, &err);
                (TrialStatus::Error, started.elapsed())
            }
        };
        debug!(%status, elapsed_secs = elapsed.as_secs_f64(), "trial finished");
        TrialResult::new(trial.instance().path(), status, elapsed)
    }
}

/// Best-effort diagnostic appended to the trial log so an `ERROR` row can be
/// inspected like any other.
fn note_error(trial: &Trial, err: &anyhow::Error) {
    let written = OpenOptions::new()
        .create(true)
        .append(true)
        .open(trial.log_path())
        .and_then(|mut log| writeln!(log, "satbench: {err:#}"));
    if let Err(write_err) = written {
        debug!(err = %write_err, "could not record error in trial log");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::types::Instance;

    struct Fixture {
        _temp: tempfile::TempDir,
        dir: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = tempfile::tempdir().expect("tempdir");
            let dir = temp.path().to_path_buf();
            Self { _temp: temp, dir }
        }

        fn trial(&self, name: &str, contents: &str) -> Trial {
            let instance = self.dir.join(format!("{name}.cnf"));
            fs::write(&instance, contents).expect("write instance");
            Trial::new(Instance::new(instance), self.dir.join(format!("{name}.log")))
        }

        /// A solver run as `/bin/sh <script> [args]` so the script never needs
        /// to be executable.
        fn solver(&self, body: &str, timeout: Duration) -> SolverRunner {
            let script = self.dir.join("solver.sh");
            fs::write(&script, body).expect("write solver");
            SolverRunner {
                solver_path: PathBuf::from("/bin/sh"),
                solver_args: vec![script.display().to_string()],
                timeout,
                children: LiveChildren::new(),
            }
        }
    }

    #[test]
    fn final_line_becomes_status() {
        let fx = Fixture::new();
        let trial = fx.trial("a", "p cnf 1 1\n1 0\n");
        let runner = fx.solver(
            "cat > /dev/null\necho 'c solving'\nsleep 0.2\necho SAT\n",
            Duration::from_secs(20),
        );
        let result = runner.execute(&trial);
        assert_eq!(result.status(), &TrialStatus::Reported("SAT".into()));
        assert_eq!(result.instance_path(), trial.instance().path());
        assert!(result.elapsed() >= Duration::from_millis(200));
        assert!(result.elapsed() < Duration::from_secs(10));
        assert!(trial.log_path().exists());
    }

    #[test]
    fn instance_is_fed_on_stdin() {
        let fx = Fixture::new();
        let trial = fx.trial("a", "UNSATISFIABLE\n");
        let runner = fx.solver("read -r line\necho \"$line\"\n", Duration::from_secs(20));
        assert_eq!(
            runner.execute(&trial).status(),
            &TrialStatus::Reported("UNSATISFIABLE".into())
        );
    }

    #[test]
    fn stderr_is_captured_in_the_same_log() {
        let fx = Fixture::new();
        let trial = fx.trial("a", "");
        let runner = fx.solver("echo out\necho 'err last' >&2\n", Duration::from_secs(20));
        let result = runner.execute(&trial);
        assert_eq!(result.status(), &TrialStatus::Reported("err last".into()));
        let log = fs::read_to_string(trial.log_path()).expect("log");
        assert!(log.contains("out\n"));
    }

    #[test]
    fn nonzero_exit_still_reports_last_line() {
        let fx = Fixture::new();
        let trial = fx.trial("a", "");
        let runner = fx.solver("echo UNSAT\nexit 20\n", Duration::from_secs(20));
        assert_eq!(
            runner.execute(&trial).status(),
            &TrialStatus::Reported("UNSAT".into())
        );
    }

    #[test]
    fn silent_solver_yields_empty_status() {
        let fx = Fixture::new();
        let trial = fx.trial("a", "");
        let runner = fx.solver("exit 0\n", Duration::from_secs(20));
        assert_eq!(
            runner.execute(&trial).status(),
            &TrialStatus::Reported(String::new())
        );
    }

    #[test]
    fn previous_log_contents_are_truncated() {
        let fx = Fixture::new();
        let trial = fx.trial("a", "");
        fs::write(trial.log_path(), "stale\nOLD STATUS\n").expect("seed log");
        let runner = fx.solver("exit 0\n", Duration::from_secs(20));
        assert_eq!(
            runner.execute(&trial).status(),
            &TrialStatus::Reported(String::new())
        );
        assert_eq!(fs::read_to_string(trial.log_path()).expect("log"), "");
    }

    #[test]
    fn timeout_kills_the_solver() {
        let fx = Fixture::new();
        let trial = fx.trial("a", "");
        let pid_file = fx.dir.join("solver.pid");
        let mut runner = fx.solver("echo $$ > \"$1\"\nexec sleep 30\n", Duration::from_millis(500));
        runner.solver_args.push(pid_file.display().to_string());

        let result = runner.execute(&trial);
        assert_eq!(result.status(), &TrialStatus::Timeout);
        assert!(result.elapsed() >= Duration::from_millis(500));
        assert!(result.elapsed() < Duration::from_secs(10));

        let pid = fs::read_to_string(&pid_file).expect("pid").trim().to_string();
        assert!(!process_alive(&pid), "solver {pid} still running");
    }

    #[test]
    fn timeout_kills_processes_the_solver_started() {
        let fx = Fixture::new();
        let trial = fx.trial("a", "");
        let pid_file = fx.dir.join("helper.pid");
        let mut runner = fx.solver(
            "sleep 30 &\necho $! > \"$1\"\nwait\n",
            Duration::from_millis(500),
        );
        runner.solver_args.push(pid_file.display().to_string());

        let result = runner.execute(&trial);
        assert_eq!(result.status(), &TrialStatus::Timeout);

        let pid = fs::read_to_string(&pid_file).expect("pid").trim().to_string();
        let deadline = Instant::now() + Duration::from_secs(2);
        while process_alive(&pid) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(25));
        }
        assert!(!process_alive(&pid), "helper {pid} outlived its trial");
        assert_eq!(runner.children.running(), 0);
    }

    #[test]
    fn missing_solver_is_an_error_status() {
        let fx = Fixture::new();
        let trial = fx.trial("a", "");
        let runner = SolverRunner {
            solver_path: fx.dir.join("no-such-solver"),
            solver_args: Vec::new(),
            timeout: Duration::from_secs(5),
            children: LiveChildren::new(),
        };
        let result = runner.execute(&trial);
        assert_eq!(result.status(), &TrialStatus::Error);
        let log = fs::read_to_string(trial.log_path()).expect("log");
        assert!(log.starts_with("satbench: run solver"));
    }

    #[test]
    fn missing_instance_is_an_error_status() {
        let fx = Fixture::new();
        let trial = Trial::new(
            Instance::new(fx.dir.join("gone.cnf")),
            fx.dir.join("gone.log"),
        );
        let runner = fx.solver("echo SAT\n", Duration::from_secs(5));
        assert_eq!(runner.execute(&trial).status(), &TrialStatus::Error);
    }

    /// True while `pid` exists and is not a zombie waiting to be reaped.
    fn process_alive(pid: &str) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Ok(raw) = pid.parse::<i32>() else {
            return false;
        };
        if kill(Pid::from_raw(raw), None).is_err() {
            return false;
        }
        let stat = fs::read_to_string(format!("/proc/{raw}/stat")).unwrap_or_default();
        !stat
            .rsplit_once(") ")
            .is_some_and(|(_, state)| state.starts_with('Z'))
    }
}
