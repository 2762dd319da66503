//! Batch result model and its derived views (summary, per-file reports).

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Resolution;
use crate::pipeline::error::{FileError, InvalidReason};
use crate::pipeline::transform::Placement;
use crate::pipeline::validation::ImageFormat;

// ═══════════════════════════════════════════
// Batch-level notices
// ═══════════════════════════════════════════

/// Batch-level conditions. Never attached to a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchNotice {
    /// No inputs were supplied.
    EmptyBatch,
    /// Input exceeded `max_batch_size`; only the first `kept` were processed.
    Truncated { submitted: usize, kept: usize },
}

impl BatchNotice {
    pub fn message(&self) -> String {
        match self {
            Self::EmptyBatch => "No files to process".to_string(),
            Self::Truncated { submitted, kept } => format!(
                "Batch of {submitted} files exceeds limit; processing first {kept}, discarding {}",
                submitted - kept
            ),
        }
    }
}

// ═══════════════════════════════════════════
// Per-file records
// ═══════════════════════════════════════════

/// A file that failed, either before extraction (skipped) or after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileErrorRecord {
    pub file: String,
    pub path: PathBuf,
    pub reason: InvalidReason,
    pub message: String,
}

impl FileErrorRecord {
    pub fn new(file: String, path: PathBuf, error: FileError) -> Self {
        Self {
            file,
            path,
            reason: error.reason,
            message: error.message,
        }
    }
}

/// A file that passed every stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedFile {
    pub file: String,
    pub path: PathBuf,
    pub format: ImageFormat,
    pub original: Resolution,
    pub placement: Placement,
    pub instance_uid: Option<String>,
    pub warnings: Vec<String>,
}

/// Outcome of one batch run. Each submitted (non-truncated) input lands in
/// exactly one of `processed`, `skipped` or `errors`, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub batch_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub processed: Vec<ProcessedFile>,
    pub skipped: Vec<FileErrorRecord>,
    pub errors: Vec<FileErrorRecord>,
    pub notices: Vec<BatchNotice>,
}

impl BatchResult {
    pub fn empty() -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            started_at: Utc::now(),
            processed: Vec::new(),
            skipped: Vec::new(),
            errors: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// Files that were dispatched (everything but the truncated tail).
    pub fn total(&self) -> usize {
        self.processed.len() + self.skipped.len() + self.errors.len()
    }

    pub fn has_notice(&self, notice: &BatchNotice) -> bool {
        self.notices.contains(notice)
    }

    pub fn summary(&self) -> BatchSummary {
        let truncated: usize = self
            .notices
            .iter()
            .map(|n| match n {
                BatchNotice::Truncated { submitted, kept } => submitted - kept,
                BatchNotice::EmptyBatch => 0,
            })
            .sum();
        BatchSummary {
            total: self.total(),
            processed: self.processed.len(),
            skipped: self.skipped.len(),
            errors: self.errors.len(),
            warnings: self
                .processed
                .iter()
                .filter(|p| !p.warnings.is_empty())
                .count(),
            truncated,
        }
    }

    /// One structured record per dispatched file, stamped now.
    pub fn reports(&self) -> Vec<FileReport> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        let processed = self.processed.iter().map(|p| FileReport {
            file_name: p.file.clone(),
            status: if p.warnings.is_empty() {
                ReportStatus::Success
            } else {
                ReportStatus::Warning
            },
            reason: None,
            message: if p.warnings.is_empty() {
                "Processed successfully".to_string()
            } else {
                p.warnings.join("; ")
            },
            timestamp: timestamp.clone(),
        });

        let skipped = self.skipped.iter().map(|s| FileReport {
            file_name: s.file.clone(),
            status: match s.reason {
                InvalidReason::UnsupportedFormat => ReportStatus::Warning,
                _ => ReportStatus::Error,
            },
            reason: Some(s.reason),
            message: s.message.clone(),
            timestamp: timestamp.clone(),
        });

        let errors = self.errors.iter().map(|e| FileReport {
            file_name: e.file.clone(),
            status: ReportStatus::Error,
            reason: Some(e.reason),
            message: e.message.clone(),
            timestamp: timestamp.clone(),
        });

        processed.chain(skipped).chain(errors).collect()
    }
}

/// Counts for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Processed files that carried warnings.
    pub warnings: usize,
    /// Inputs discarded by the batch size limit.
    pub truncated: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Success,
    Warning,
    Error,
}

/// Flat per-file log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub file_name: String,
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<InvalidReason>,
    pub message: String,
    pub timestamp: String,
}
