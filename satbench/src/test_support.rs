//! Test-only helpers: a scripted trial runner and fake solver fixtures.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::core::types::{Trial, TrialResult, TrialStatus};
use crate::trial::TrialRunner;

#[derive(Debug, Clone)]
enum Script {
    Finish(TrialStatus, Duration),
    Panic,
}

/// Runner that returns predetermined results keyed by instance file name.
///
/// Unknown instances finish immediately with status `UNKNOWN`.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    scripts: BTreeMap<String, Script>,
    cancel_after: Option<(String, CancelToken)>,
    executed: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `token` for `name` after sleeping `delay`.
    pub fn with(self, name: &str, token: &str, delay: Duration) -> Self {
        self.with_script(name, Script::Finish(TrialStatus::Reported(token.into()), delay))
    }

    pub fn with_status(self, name: &str, status: TrialStatus) -> Self {
        self.with_script(name, Script::Finish(status, Duration::ZERO))
    }

    pub fn panicking_on(self, name: &str) -> Self {
        self.with_script(name, Script::Panic)
    }

    /// Raise `cancel` once the trial for `name` has finished.
    pub fn cancelling_after(mut self, name: &str, cancel: CancelToken) -> Self {
        self.cancel_after = Some((name.to_string(), cancel));
        self
    }

    /// Number of trials started so far.
    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }

    fn with_script(mut self, name: &str, script: Script) -> Self {
        self.scripts.insert(name.to_string(), script);
        self
    }
}

impl TrialRunner for ScriptedRunner {
    fn execute(&self, trial: &Trial) -> TrialResult {
        self.executed.fetch_add(1, Ordering::SeqCst);
        let name = trial.instance().name();
        let (status, delay) = match self.scripts.get(name) {
            Some(Script::Finish(status, delay)) => (status.clone(), *delay),
            Some(Script::Panic) => panic!("scripted panic for {name}"),
            None => (TrialStatus::Reported("UNKNOWN".into()), Duration::ZERO),
        };
        thread::sleep(delay);
        if let Some((cancel_name, cancel)) = &self.cancel_after
            && cancel_name == name
        {
            cancel.cancel();
        }
        TrialResult::new(trial.instance().path(), status, delay)
    }
}

/// Write instance files (relative to `root`) with the given contents.
pub fn write_instances(root: &Path, files: &[(&str, &str)]) -> std::io::Result<()> {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
    }
    Ok(())
}

/// Write a POSIX shell script to be run as `/bin/sh <script>`.
///
/// Running the script through the shell instead of executing it directly
/// avoids `ETXTBSY` when tests spawn processes concurrently.
pub fn write_fake_solver(dir: &Path, body: &str) -> std::io::Result<PathBuf> {
    let path = dir.join("fake_solver.sh");
    fs::write(&path, body)?;
    Ok(path)
}

/// A solver script whose behaviour is chosen by the first line of the instance:
/// `HANG` sleeps far past any test timeout, `SILENT` prints nothing, anything
/// else is echoed back as the final line after some chatter.
pub const ECHO_SOLVER: &str = r#"read -r first
case "$first" in
  HANG) exec sleep 60 ;;
  SILENT) exit 0 ;;
  *) echo "c parsed instance"; echo "$first"; exit 10 ;;
esac
"#;

/// Create a scratch directory for a test.
pub fn scratch_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("tempdir")
}
