//! Result table row format.
//!
//! One row per completed trial, tab separated:
//! `<seq>/<total>`, `<instance path>`, `<status>`, `<elapsed seconds>`.
//! Rows are newline terminated; a row without its newline is incomplete.

use std::fmt;

use anyhow::{Context, Result, anyhow, bail};

use super::types::TrialResult;

/// One line of `result.txt`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    /// 1-based position in the order results were recorded.
    pub seq: usize,
    pub total: usize,
    pub instance: String,
    pub status: String,
    pub elapsed_secs: f64,
}

impl ResultRow {
    pub fn from_result(seq: usize, total: usize, result: &TrialResult) -> Self {
        Self {
            seq,
            total,
            instance: result.instance_path().display().to_string(),
            status: result.status().as_str().to_string(),
            elapsed_secs: result.elapsed().as_secs_f64(),
        }
    }

    /// Parse a single row (without its trailing newline).
    ///
    /// The first and last fields are split off first, so a status token that
    /// itself contains a tab still parses; instance paths must not contain tabs.
    pub fn parse(line: &str) -> Result<Self> {
        let (progress, rest) = line
            .split_once('\t')
            .ok_or_else(|| anyhow!("missing fields in row {line:?}"))?;
        let (middle, elapsed) = rest
            .rsplit_once('\t')
            .ok_or_else(|| anyhow!("missing elapsed field in row {line:?}"))?;
        let (instance, status) = middle
            .split_once('\t')
            .ok_or_else(|| anyhow!("missing status field in row {line:?}"))?;
        let (seq, total) = progress
            .split_once('/')
            .ok_or_else(|| anyhow!("malformed progress field {progress:?}"))?;
        Ok(Self {
            seq: seq.parse().with_context(|| format!("parse seq {seq:?}"))?,
            total: total
                .parse()
                .with_context(|| format!("parse total {total:?}"))?,
            instance: instance.to_string(),
            status: status.to_string(),
            elapsed_secs: elapsed
                .parse()
                .with_context(|| format!("parse elapsed {elapsed:?}"))?,
        })
    }
}

impl fmt::Display for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}\t{}\t{}\t{:.6}",
            self.seq, self.total, self.instance, self.status, self.elapsed_secs
        )
    }
}

/// Parse the complete rows of a result table.
///
/// A final fragment without a newline (a row cut off mid-write) is ignored;
/// every newline-terminated line must parse.
pub fn parse_result_table(contents: &str) -> Result<Vec<ResultRow>> {
    let complete = match contents.rfind('\n') {
        Some(end) => &contents[..end],
        None => return Ok(Vec::new()),
    };
    let mut rows = Vec::new();
    for (index, line) in complete.split('\n').enumerate() {
        let row = ResultRow::parse(line).with_context(|| format!("row {}", index + 1))?;
        if row.seq != index + 1 {
            bail!("row {} has sequence index {}", index + 1, row.seq);
        }
        rows.push(row);
    }
    Ok(rows)
}
