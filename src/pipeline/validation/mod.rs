//! Path and format validation: the first gate every input passes.
//!
//! Pure inspection of the path and filesystem metadata. Nothing is decoded
//! here; failures land in the batch's `skipped` bucket.

pub mod format;
pub mod path;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::pipeline::error::FileError;

pub use format::{normalize_extension, ImageFormat, DEFAULT_ALLOWED_EXTENSIONS};

/// Facts about an input file established at validation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMetadata {
    pub path: PathBuf,
    /// Final path component, used as the file identifier in reports.
    pub name: String,
    /// Lowercase, dot-prefixed.
    pub extension: String,
    pub size_bytes: u64,
    pub format: ImageFormat,
}

/// Display name for a path: its final component, or the whole path when
/// there is none.
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Validate a candidate input path.
///
/// Order: path safety, then existence as a regular file, then the extension
/// allow-list. Unsafe paths are never stat'ed.
pub fn validate(path: &Path, allowed_extensions: &[String]) -> Result<FileMetadata, FileError> {
    path::check_path_safety(path)?;
    let size_bytes = path::check_regular_file(path)?;
    let (extension, format) = format::check_format(path, allowed_extensions)?;

    let metadata = FileMetadata {
        path: path.to_path_buf(),
        name: file_name_of(path),
        extension,
        size_bytes,
        format,
    };

    debug!(
        file = %metadata.name,
        format = metadata.format.as_str(),
        size_bytes,
        "Input validated"
    );

    Ok(metadata)
}
