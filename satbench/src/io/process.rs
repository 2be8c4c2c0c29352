//! Helpers for running child processes with a wall-clock timeout.
//!
//! Output is never piped back to the harness: callers redirect the child's
//! stdio to files before handing the command over, so there is nothing to drain
//! and no pipe to deadlock on.
//!
//! On Unix every child leads its own process group. Killing that group, rather
//! than the child alone, also takes down anything the child started itself.

use std::collections::BTreeSet;
use std::process::{Child, Command, ExitStatus};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How a timed child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The child exited on its own; the exit status is informational only.
    Exited(ExitStatus),
    /// The timeout expired; the child was killed and reaped.
    TimedOut,
}

/// A finished child process and how long it ran.
#[derive(Debug, Clone, Copy)]
pub struct TimedRun {
    pub outcome: ProcessOutcome,
    pub elapsed: Duration,
}

/// Registry of the process groups currently running under [`run_with_timeout`].
///
/// [`LiveChildren::kill_all`] is the abort path: it kills every registered
/// group and refuses any later spawn, so nothing is left running when the
/// harness exits early. Clones share the same registry.
#[derive(Debug, Clone, Default)]
pub struct LiveChildren {
    state: Arc<Mutex<LiveState>>,
}

#[derive(Debug, Default)]
struct LiveState {
    groups: BTreeSet<u32>,
    closed: bool,
}

impl LiveChildren {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of process groups currently registered.
    pub fn running(&self) -> usize {
        self.lock().groups.len()
    }

    /// Kill every registered process group and refuse further spawns.
    pub fn kill_all(&self) {
        let mut state = self.lock();
        state.closed = true;
        for &pgid in &state.groups {
            kill_group(pgid);
        }
        debug!(groups = state.groups.len(), "killed live process groups");
    }

    fn lock(&self) -> MutexGuard<'_, LiveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn under the lock so `kill_all` never misses a child that is
    /// starting concurrently.
    fn spawn(&self, cmd: &mut Command) -> Result<Child> {
        let mut state = self.lock();
        if state.closed {
            bail!("aborting, not starting {}", cmd.get_program().to_string_lossy());
        }
        let child = cmd.spawn().context("spawn command")?;
        state.groups.insert(child.id());
        Ok(child)
    }

    fn release(&self, pgid: u32) {
        self.lock().groups.remove(&pgid);
    }
}

/// Spawn `cmd` and wait for it at most `timeout`.
///
/// On expiry the child's whole process group is killed and the child is then
/// waited on, so neither it nor anything it started is left running (or as a
/// zombie) once this returns. Processes the child left behind after a normal
/// exit are killed too. The elapsed time is measured from just before spawn
/// until the child is reaped.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs_f64()))]
pub fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    live: &LiveChildren,
) -> Result<TimedRun> {
    detach_from_terminal_signals(&mut cmd);

    debug!("spawning child process");
    let started = Instant::now();
    let mut child = match live.spawn(&mut cmd) {
        Ok(c) => c,
        Err(e) => {
            error!(err = %format!("{e:#}"), "failed to spawn command");
            return Err(e);
        }
    };
    let pgid = child.id();

    let waited = match child.wait_timeout(timeout) {
        Ok(waited) => waited,
        Err(err) => {
            terminate(&mut child);
            live.release(pgid);
            return Err(err).context("wait for command");
        }
    };
    let outcome = match waited {
        Some(status) => {
            kill_group(pgid);
            ProcessOutcome::Exited(status)
        }
        None => {
            warn!(
                timeout_secs = timeout.as_secs_f64(),
                "command timed out, killing"
            );
            terminate(&mut child);
            ProcessOutcome::TimedOut
        }
    };
    let elapsed = started.elapsed();
    live.release(pgid);

    debug!(?outcome, elapsed_secs = elapsed.as_secs_f64(), "command finished");
    Ok(TimedRun { outcome, elapsed })
}

/// Kill `child` with its process group, then reap it.
///
/// A kill error means the child already exited; the wait still reaps it.
fn terminate(child: &mut Child) {
    kill_group(child.id());
    if let Err(err) = child.kill() {
        debug!(err = %err, "kill failed, child likely already exited");
    }
    match child.wait() {
        Ok(status) => debug!(exit_code = ?status.code(), "killed child reaped"),
        Err(err) => error!(err = %err, "failed to reap killed child"),
    }
}

/// SIGKILL every process in group `pgid`. An empty group is not an error.
#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pgid) else {
        warn!(pgid, "process group id out of range");
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => warn!(pgid, err = %err, "failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Put the child in its own process group so a terminal Ctrl-C reaches only
/// the harness, which then stops dispatching while in-flight trials finish.
/// The group is also what [`kill_group`] signals.
#[cfg(unix)]
fn detach_from_terminal_signals(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn detach_from_terminal_signals(_cmd: &mut Command) {}

#[cfg(all(test, unix))]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::thread;

    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    fn alive(pid: i32) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        // Orphans may linger as zombies until init reaps them; a zombie is
        // not running.
        if kill(Pid::from_raw(pid), None).is_err() {
            return false;
        }
        let stat = fs::read_to_string(format!("/proc/{pid}/stat")).unwrap_or_default();
        !stat
            .rsplit_once(") ")
            .is_some_and(|(_, rest)| rest.starts_with('Z'))
    }

    fn wait_for_pid(path: &Path) -> i32 {
        for _ in 0..200 {
            if let Ok(text) = fs::read_to_string(path)
                && let Ok(pid) = text.trim().parse()
            {
                return pid;
            }
            thread::sleep(Duration::from_millis(25));
        }
        panic!("no pid written to {}", path.display());
    }

    fn assert_gone(pid: i32) {
        for _ in 0..40 {
            if !alive(pid) {
                return;
            }
            thread::sleep(Duration::from_millis(25));
        }
        panic!("process {pid} is still running");
    }

    #[test]
    fn exit_status_is_reported() {
        let live = LiveChildren::new();
        let run = run_with_timeout(sh("exit 3"), Duration::from_secs(5), &live).expect("run");
        match run.outcome {
            ProcessOutcome::Exited(status) => assert_eq!(status.code(), Some(3)),
            ProcessOutcome::TimedOut => panic!("unexpected timeout"),
        }
        assert_eq!(live.running(), 0);
    }

    #[test]
    fn slow_command_times_out_promptly() {
        let live = LiveChildren::new();
        let run = run_with_timeout(sh("exec sleep 30"), Duration::from_millis(200), &live)
            .expect("run");
        assert_eq!(run.outcome, ProcessOutcome::TimedOut);
        assert!(run.elapsed >= Duration::from_millis(200));
        assert!(run.elapsed < Duration::from_secs(10));
        assert_eq!(live.running(), 0);
    }

    #[test]
    fn timeout_kills_background_grandchildren() {
        let temp = tempfile::tempdir().expect("tempdir");
        let pid_file = temp.path().join("grandchild.pid");
        let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());

        let run = run_with_timeout(sh(&script), Duration::from_millis(500), &LiveChildren::new())
            .expect("run");

        assert_eq!(run.outcome, ProcessOutcome::TimedOut);
        assert_gone(wait_for_pid(&pid_file));
    }

    #[test]
    fn leftover_processes_are_killed_after_a_normal_exit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let pid_file = temp.path().join("leftover.pid");
        let script = format!("sleep 30 & echo $! > '{}'; exit 0", pid_file.display());

        let run = run_with_timeout(sh(&script), Duration::from_secs(10), &LiveChildren::new())
            .expect("run");

        assert!(matches!(run.outcome, ProcessOutcome::Exited(_)));
        assert_gone(wait_for_pid(&pid_file));
    }

    #[test]
    fn kill_all_stops_running_children_and_refuses_new_ones() {
        let temp = tempfile::tempdir().expect("tempdir");
        let pid_file = temp.path().join("grandchild.pid");
        let script = format!("sleep 30 & echo $! > '{}'; wait", pid_file.display());
        let live = LiveChildren::new();

        let worker = {
            let live = live.clone();
            thread::spawn(move || run_with_timeout(sh(&script), Duration::from_secs(60), &live))
        };
        let grandchild = wait_for_pid(&pid_file);
        assert_eq!(live.running(), 1);

        let started = Instant::now();
        live.kill_all();
        let run = worker.join().expect("join").expect("run");
        assert!(matches!(run.outcome, ProcessOutcome::Exited(_)));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_gone(grandchild);

        assert!(run_with_timeout(sh("exit 0"), Duration::from_secs(5), &live).is_err());
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let live = LiveChildren::new();
        let cmd = Command::new("/nonexistent/satbench-solver");
        assert!(run_with_timeout(cmd, Duration::from_secs(1), &live).is_err());
        assert_eq!(live.running(), 0);
    }
}
