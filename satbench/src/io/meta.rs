//! Run metadata persisted to `meta.json` next to the result table.
//!
//! Written when the run starts and rewritten when it ends. `result.txt`
//! stays the authoritative record; this file only describes the run.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::io::config::HarnessConfig;

/// Metadata for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub run_dir: String,
    pub config: HarnessConfig,
    pub started_at: String,
    pub finished_at: Option<String>,
    /// Number of trials planned for the run.
    pub total: usize,
    /// Number of rows written to `result.txt`.
    pub completed: usize,
    pub cancelled: bool,
    /// Rows per status token.
    pub status_counts: BTreeMap<String, usize>,
}

/// Atomically write metadata (temp file + rename).
pub fn write_meta(path: &Path, meta: &RunMeta) -> Result<()> {
    let mut contents = serde_json::to_string_pretty(meta).context("serialize meta")?;
    contents.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp meta {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace meta {}", path.display()))?;
    Ok(())
}
