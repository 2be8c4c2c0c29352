//! Run-wide cancellation.
//!
//! Raising the token stops the scheduler from starting new trials. Trials
//! already running are left to finish or time out on their own. Aborting goes
//! further and kills every solver process group that is still running.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result};
use tracing::{error, warn};

use crate::exit_codes;
use crate::io::process::LiveChildren;

/// Shared cancellation flag; clones observe the same state.
///
/// The token also carries the registry of running solver processes, so the
/// abort path can reach every child no matter which worker started it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    children: LiveChildren,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Solver processes started on behalf of this run.
    pub fn children(&self) -> &LiveChildren {
        &self.children
    }

    /// Cancel, then kill every running solver process group.
    pub fn abort(&self) {
        self.cancel();
        self.children.kill_all();
    }
}

/// Raise `token` on the first Ctrl-C. On the second, abort `token` and exit
/// with [`exit_codes::CANCELLED`].
///
/// The signal is awaited on a background thread that owns a single-threaded
/// tokio runtime, so the harness itself stays synchronous. The handler is
/// registered before this returns.
pub fn install_ctrl_c(token: CancelToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build signal runtime")?;
    let mut interrupts = {
        let _guard = runtime.enter();
        Interrupts::register()?
    };
    thread::Builder::new()
        .name("satbench-ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                if !interrupts.recv().await {
                    error!("ctrl-c listener closed");
                    return;
                }
                warn!("ctrl-c received, finishing in-flight trials (press again to abort)");
                token.cancel();
                if interrupts.recv().await {
                    warn!("second ctrl-c received, killing running solvers");
                    token.abort();
                    std::process::exit(exit_codes::CANCELLED);
                }
            });
        })
        .context("spawn ctrl-c listener")?;
    Ok(())
}

#[cfg(unix)]
struct Interrupts(tokio::signal::unix::Signal);

#[cfg(unix)]
impl Interrupts {
    fn register() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        signal(SignalKind::interrupt())
            .map(Self)
            .context("register SIGINT handler")
    }

    async fn recv(&mut self) -> bool {
        self.0.recv().await.is_some()
    }
}

#[cfg(not(unix))]
struct Interrupts;

#[cfg(not(unix))]
impl Interrupts {
    fn register() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> bool {
        match tokio::signal::ctrl_c().await {
            Ok(()) => true,
            Err(err) => {
                error!(err = %err, "failed to listen for ctrl-c");
                false
            }
        }
    }
}
