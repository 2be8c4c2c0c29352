//! Instance discovery.
//!
//! Walks an instance tree depth-first with an explicit stack, visiting the
//! children of every directory in sorted file-name order so the traversal does
//! not depend on the filesystem's native enumeration order.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::types::Instance;

/// Lazy, deterministic iterator over the files below a root.
///
/// Directories are expanded when they are reached, not up front. Symlinked
/// directories are not descended into, which also rules out cycles; symlinks
/// to files are yielded like files.
#[derive(Debug)]
pub struct EnumerateFiles {
    stack: Vec<PathBuf>,
}

/// Enumerate every file under `root` (or `root` itself if it is a file).
///
/// Fails with [`io::ErrorKind::NotFound`] if `root` does not exist. Errors
/// reading nested directories are yielded as `Err` items.
pub fn enumerate_files(root: &Path) -> io::Result<EnumerateFiles> {
    let metadata = fs::metadata(root).map_err(|err| {
        io::Error::new(err.kind(), format!("read {}: {err}", root.display()))
    })?;
    debug!(root = %root.display(), is_dir = metadata.is_dir(), "enumerating instances");
    Ok(EnumerateFiles {
        stack: vec![root.to_path_buf()],
    })
}

impl Iterator for EnumerateFiles {
    type Item = io::Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(path) = self.stack.pop() {
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(err) => return Some(Err(with_path(err, &path))),
            };
            if !metadata.is_dir() {
                return Some(Ok(path));
            }
            match sorted_children(&path) {
                // Reverse so the smallest name is popped first.
                Ok(children) => self.stack.extend(children.into_iter().rev()),
                Err(err) => return Some(Err(err)),
            }
        }
        None
    }
}

fn sorted_children(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir).map_err(|err| with_path(err, dir))? {
        let entry = entry.map_err(|err| with_path(err, dir))?;
        let file_type = entry.file_type().map_err(|err| with_path(err, &entry.path()))?;
        if file_type.is_symlink() && entry.path().is_dir() {
            debug!(path = %entry.path().display(), "skipping symlinked directory");
            continue;
        }
        children.push((entry.file_name(), entry.path()));
    }
    children.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(children.into_iter().map(|(_, path)| path).collect())
}

fn with_path(err: io::Error, path: &Path) -> io::Error {
    io::Error::new(err.kind(), format!("read {}: {err}", path.display()))
}

/// Collect every instance under `root` whose file name ends with `suffix`.
///
/// The full list is materialized so callers know the total before any trial
/// runs. Any traversal error is fatal.
pub fn discover_instances(root: &Path, suffix: &str) -> Result<Vec<Instance>> {
    let files =
        enumerate_files(root).with_context(|| format!("open instance root {}", root.display()))?;
    let mut instances = Vec::new();
    for file in files {
        let path = file.context("enumerate instances")?;
        let matches = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().ends_with(suffix));
        if matches {
            instances.push(Instance::new(path));
        }
    }
    debug!(count = instances.len(), "instances discovered");
    Ok(instances)
}
