//! Bounded worker pool for trials.
//!
//! `W` worker threads pull trials from a shared queue in submission order and
//! send each result back over a channel. With one worker results arrive in
//! submission order; with more they arrive in completion order, and each one
//! carries its submission index for consumers that need to re-sort.
//!
//! A trial never aborts the pool: whatever happens inside it (including a
//! panic in the runner) becomes that trial's status.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use crate::cancel::CancelToken;
use crate::core::types::{Trial, TrialResult, TrialStatus};
use crate::trial::TrialRunner;

type Queue = Arc<Mutex<VecDeque<(usize, Trial)>>>;

/// A finished trial and its 0-based position in the submitted list.
#[derive(Debug, Clone, PartialEq)]
pub struct Completed {
    pub index: usize,
    pub result: TrialResult,
}

/// Dispatches trials to a fixed number of workers.
#[derive(Debug, Clone)]
pub struct Scheduler {
    workers: usize,
    cancel: CancelToken,
}

impl Scheduler {
    /// `workers` is clamped to at least one.
    pub fn new(workers: usize, cancel: CancelToken) -> Self {
        Self {
            workers: workers.max(1),
            cancel,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Start running every trial and return an iterator over completions.
    ///
    /// No retries: each trial runs at most once. Trials not yet started when
    /// the cancel token is raised are never run.
    pub fn dispatch(&self, trials: Vec<Trial>, runner: Arc<dyn TrialRunner>) -> Result<Completions> {
        let total = trials.len();
        let queue: Queue = Arc::new(Mutex::new(trials.into_iter().enumerate().collect()));
        let (tx, rx) = mpsc::channel();
        let worker_count = self.workers.min(total);
        info!(total, workers = worker_count, "dispatching trials");

        launch(&queue, rx, total, worker_count, |id| {
            let queue = Arc::clone(&queue);
            let runner = Arc::clone(&runner);
            let cancel = self.cancel.clone();
            let tx = tx.clone();
            thread::Builder::new()
                .name(format!("satbench-worker-{id}"))
                .spawn(move || worker_loop(id, &queue, runner.as_ref(), &cancel, &tx))
        })
    }
}

/// Start `worker_count` workers through `spawn`.
///
/// Handles are collected into the returned [`Completions`] as they are
/// spawned. If a spawn fails the queue is emptied and the partial
/// `Completions` is dropped, which joins the workers already started.
fn launch<F>(
    queue: &Queue,
    rx: Receiver<Completed>,
    total: usize,
    worker_count: usize,
    mut spawn: F,
) -> Result<Completions>
where
    F: FnMut(usize) -> std::io::Result<JoinHandle<()>>,
{
    let mut completions = Completions {
        rx: Some(rx),
        handles: Vec::with_capacity(worker_count),
        total,
    };
    for id in 0..worker_count {
        match spawn(id) {
            Ok(handle) => completions.handles.push(handle),
            Err(err) => {
                error!(worker = id, err = %err, "failed to spawn worker");
                queue.lock().unwrap_or_else(PoisonError::into_inner).clear();
                return Err(err).with_context(|| format!("spawn worker {id}"));
            }
        }
    }
    Ok(completions)
}

fn worker_loop(
    id: usize,
    queue: &Queue,
    runner: &dyn TrialRunner,
    cancel: &CancelToken,
    tx: &Sender<Completed>,
) {
    loop {
        if cancel.is_cancelled() {
            debug!(worker = id, "cancelled, not starting further trials");
            return;
        }
        let next = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let Some((index, trial)) = next else {
            debug!(worker = id, "queue drained");
            return;
        };
        let result = run_contained(runner, &trial);
        if tx.send(Completed { index, result }).is_err() {
            debug!(worker = id, "consumer gone, stopping");
            return;
        }
    }
}

fn run_contained(runner: &dyn TrialRunner, trial: &Trial) -> TrialResult {
    let started = Instant::now();
    match panic::catch_unwind(AssertUnwindSafe(|| runner.execute(trial))) {
        Ok(result) => result,
        Err(_) => {
            error!(instance = %trial.instance().path().display(), "trial runner panicked");
            TrialResult::new(
                trial.instance().path(),
                TrialStatus::Error,
                started.elapsed(),
            )
        }
    }
}

/// Completed trials, yielded as they become available.
///
/// Dropping this early stops workers after their current trial.
pub struct Completions {
    rx: Option<Receiver<Completed>>,
    handles: Vec<JoinHandle<()>>,
    total: usize,
}

impl Completions {
    /// Number of trials submitted.
    pub fn total(&self) -> usize {
        self.total
    }
}

impl Iterator for Completions {
    type Item = Completed;

    fn next(&mut self) -> Option<Completed> {
        self.rx.as_ref()?.recv().ok()
    }
}

impl Drop for Completions {
    fn drop(&mut self) {
        self.rx.take();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }
}
