use std::path::{Path, PathBuf};

use tracing::debug;

use crate::pipeline::error::PipelineError;

fn invalid_root(path: &Path, reason: impl Into<String>) -> PipelineError {
    PipelineError::InvalidRoot {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// List the regular files directly inside `dir`, sorted by path.
///
/// Not recursive. Subdirectories are ignored; symlinks count when they
/// resolve to a regular file. A missing or unreadable root is fatal.
pub fn expand_directory(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if !dir.is_dir() {
        return Err(invalid_root(dir, "not an existing directory"));
    }

    let entries = std::fs::read_dir(dir).map_err(|e| invalid_root(dir, e.to_string()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| invalid_root(dir, e.to_string()))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    debug!(dir = %dir.display(), files = files.len(), "Directory expanded");
    Ok(files)
}
