//! Naming rules for run directories and per-instance log files.

use std::collections::{BTreeMap, BTreeSet};

use super::types::Instance;

/// Prefix shared by every run directory name.
pub const RUN_DIR_PREFIX: &str = "result";

/// Build a run directory name from a timestamp and a random short id.
pub fn build_run_dir_name(timestamp: &str, short_id: &str) -> String {
    format!("{RUN_DIR_PREFIX}_{timestamp}_{short_id}")
}

/// Log file stem for an instance: its base name with `suffix` removed once.
pub fn log_stem(instance: &Instance, suffix: &str) -> String {
    let name = instance.name();
    name.strip_suffix(suffix).unwrap_or(name).to_string()
}

/// Assign one log file name per instance, in instance order.
///
/// Names are `<stem>.log`. Instances in different directories can share a
/// base name; the second and later occurrences get `-2`, `-3`, ... so that no
/// two trials in a run write the same log file. A disambiguated name never
/// collides with another instance's plain name.
pub fn assign_log_names(instances: &[Instance], suffix: &str) -> Vec<String> {
    let stems: Vec<String> = instances.iter().map(|i| log_stem(i, suffix)).collect();
    let mut taken: BTreeSet<String> = stems.iter().cloned().collect();
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    let mut names = Vec::with_capacity(stems.len());
    for stem in &stems {
        let count = seen.entry(stem.as_str()).or_insert(0);
        *count += 1;
        if *count == 1 {
            names.push(format!("{stem}.log"));
            continue;
        }
        let mut n = *count;
        let mut candidate = format!("{stem}-{n}");
        while taken.contains(&candidate) {
            n += 1;
            candidate = format!("{stem}-{n}");
        }
        taken.insert(candidate.clone());
        names.push(format!("{candidate}.log"));
    }
    names
}
