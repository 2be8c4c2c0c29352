//! Batch harness that runs an external SAT solver over a corpus of instances.
//!
//! One invocation is one run: every instance file under the instance root is
//! fed to the solver once, under a wall-clock timeout, with its combined output
//! captured to a per-instance log. Each outcome becomes a row in a durable,
//! append-only `result.txt` inside a fresh run directory.
//!
//! - **[`core`]**: pure logic (status extraction, row format, naming).
//! - **[`io`]**: side effects (instance discovery, child processes, run
//!   directory, result table, config).
//!
//! [`trial`], [`schedule`] and [`run`] coordinate the two to execute a run.

pub mod cancel;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod run;
pub mod schedule;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod trial;
