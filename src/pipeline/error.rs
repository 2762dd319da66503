//! Error types for the intake pipeline.
//!
//! Two levels:
//! - `FileError` is local to one input file. Every stage returns
//!   `Result<T, FileError>` and the batch runner files it into the skipped or
//!   errors bucket. It never aborts the batch.
//! - `PipelineError` is the single top-level failure surfaced before any
//!   per-file work starts (bad configuration, unreadable root directory,
//!   worker pool or seen-store construction).

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::pipeline::quality::SeenStoreError;

/// Why a single file was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    NotFound,
    UnsafePath,
    UnsupportedFormat,
    CorruptFile,
    MissingPixelData,
    /// Outside the resolution policy bounds. Also used when a configured
    /// maximum is exceeded; the message says which bound failed.
    ResolutionTooLow,
    BlankImage,
    DuplicateDetected,
    ResizeError,
    NormalizeError,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::UnsafePath => "unsafe_path",
            Self::UnsupportedFormat => "unsupported_format",
            Self::CorruptFile => "corrupt_file",
            Self::MissingPixelData => "missing_pixel_data",
            Self::ResolutionTooLow => "resolution_too_low",
            Self::BlankImage => "blank_image",
            Self::DuplicateDetected => "duplicate_detected",
            Self::ResizeError => "resize_error",
            Self::NormalizeError => "normalize_error",
        }
    }

    /// Rejections raised before the file is opened for decoding.
    /// These land in `BatchResult::skipped`, everything else in `errors`.
    pub fn is_pre_extraction(&self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::UnsafePath | Self::UnsupportedFormat
        )
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-file failure: reason code plus a human-readable message that carries
/// the underlying library error when there is one.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{reason}: {message}")]
pub struct FileError {
    pub reason: InvalidReason,
    pub message: String,
}

impl FileError {
    pub fn new(reason: InvalidReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn corrupt(context: &str, err: impl fmt::Display) -> Self {
        Self::new(InvalidReason::CorruptFile, format!("{context}: {err}"))
    }
}

/// Fatal, batch-level failure. Raised before any file is dispatched.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input directory {path}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    #[error("Worker pool could not be built: {0}")]
    WorkerPool(String),

    #[error("Seen-identifier store error: {0}")]
    SeenStore(#[from] SeenStoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_serializes_snake_case() {
        let json = serde_json::to_string(&InvalidReason::DuplicateDetected).unwrap();
        assert_eq!(json, "\"duplicate_detected\"");
        assert_eq!(InvalidReason::MissingPixelData.as_str(), "missing_pixel_data");
    }

    #[test]
    fn only_path_and_format_rejections_are_pre_extraction() {
        assert!(InvalidReason::NotFound.is_pre_extraction());
        assert!(InvalidReason::UnsafePath.is_pre_extraction());
        assert!(InvalidReason::UnsupportedFormat.is_pre_extraction());
        assert!(!InvalidReason::CorruptFile.is_pre_extraction());
        assert!(!InvalidReason::BlankImage.is_pre_extraction());
        assert!(!InvalidReason::ResizeError.is_pre_extraction());
    }

    #[test]
    fn file_error_display_includes_reason_and_message() {
        let err = FileError::corrupt("Failed to decode image", "unexpected EOF");
        assert_eq!(err.reason, InvalidReason::CorruptFile);
        assert_eq!(
            err.to_string(),
            "corrupt_file: Failed to decode image: unexpected EOF"
        );
    }
}
