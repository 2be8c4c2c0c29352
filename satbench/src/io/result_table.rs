//! Durable, append-only result table (`result.txt`).
//!
//! Every appended row is flushed and synced before `append` returns, so a run
//! killed after K rows leaves a file holding exactly K complete rows. Rows are
//! also mirrored to a progress sink; that mirror is best effort.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::row::ResultRow;
use crate::core::types::TrialResult;

/// Writer for one run's result table. Only the coordinating thread owns it.
pub struct ResultTable {
    file: File,
    path: PathBuf,
    total: usize,
    written: usize,
    progress: Box<dyn Write + Send>,
}

impl ResultTable {
    /// Create the result file. It must not already exist.
    pub fn create(path: &Path, total: usize, progress: Box<dyn Write + Send>) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .with_context(|| format!("create result table {}", path.display()))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            total,
            written: 0,
            progress,
        })
    }

    /// Append the next row and sync it to disk, then mirror it to progress.
    pub fn append(&mut self, result: &TrialResult) -> Result<ResultRow> {
        let row = ResultRow::from_result(self.written + 1, self.total, result);
        let line = format!("{row}\n");
        self.file
            .write_all(line.as_bytes())
            .with_context(|| format!("append to {}", self.path.display()))?;
        self.file
            .flush()
            .with_context(|| format!("flush {}", self.path.display()))?;
        self.file
            .sync_data()
            .with_context(|| format!("sync {}", self.path.display()))?;
        self.written += 1;

        self.mirror(&line);
        Ok(row)
    }

    pub fn rows_written(&self) -> usize {
        self.written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mirror(&mut self, line: &str) {
        let mirrored = self
            .progress
            .write_all(line.as_bytes())
            .and_then(|()| self.progress.flush());
        if let Err(err) = mirrored {
            debug!(err = %err, "progress mirror failed");
        }
    }
}
