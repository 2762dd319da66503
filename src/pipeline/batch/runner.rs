//! BatchRunner: validate → extract → quality gate → transform, per file, on a
//! bounded worker pool.
//!
//! Per-file failures are recorded and never abort the batch. Only problems
//! detected before dispatch (configuration, root directory, worker pool,
//! persistent store) surface as `PipelineError`.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{info, info_span, warn};

use super::input::expand_directory;
use super::types::*;
use crate::config::{IntakeConfig, Resolution};
use crate::pipeline::error::{FileError, InvalidReason, PipelineError};
use crate::pipeline::extraction::extract;
use crate::pipeline::quality::{open_store, QualityGate, SeenIdentifierStore, SeenScope, ValidationOutcome};
use crate::pipeline::transform::{transform, PreparedImage};
use crate::pipeline::validation::{file_name_of, validate};

// ═══════════════════════════════════════════
// Output sinks
// ═══════════════════════════════════════════

/// Receives model-ready tensors as files complete. Called from pool workers.
pub trait PreparedSink: Send + Sync {
    fn accept(&self, prepared: PreparedImage);
}

/// Drops prepared tensors; only the `BatchResult` is kept.
pub struct DiscardSink;

impl PreparedSink for DiscardSink {
    fn accept(&self, _prepared: PreparedImage) {}
}

/// Keeps every prepared tensor in memory.
#[derive(Default)]
pub struct CollectingSink {
    items: Mutex<Vec<PreparedImage>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything collected so far. Order follows completion, not input.
    pub fn take(&self) -> Vec<PreparedImage> {
        match self.items.lock() {
            Ok(mut items) => std::mem::take(&mut *items),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl PreparedSink for CollectingSink {
    fn accept(&self, prepared: PreparedImage) {
        match self.items.lock() {
            Ok(mut items) => items.push(prepared),
            Err(poisoned) => poisoned.into_inner().push(prepared),
        }
    }
}

// ═══════════════════════════════════════════
// Runner
// ═══════════════════════════════════════════

enum FileOutcome {
    Processed(ProcessedFile),
    Skipped(FileErrorRecord),
    Failed(FileErrorRecord),
}

/// Orchestrates intake batches under one configuration.
pub struct BatchRunner {
    config: IntakeConfig,
    /// Shared across runs. `None` means a fresh in-memory set per run.
    seen_store: Option<Arc<dyn SeenIdentifierStore>>,
}

impl BatchRunner {
    /// Validate the configuration and open the persistent seen-store if one
    /// is configured.
    pub fn new(config: IntakeConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let seen_store = match &config.duplicates.scope {
            SeenScope::Batch => None,
            scope @ SeenScope::Persistent { .. } => Some(open_store(scope)?),
        };
        Ok(Self { config, seen_store })
    }

    /// Share `store` across every run of this runner.
    pub fn with_seen_store(mut self, store: Arc<dyn SeenIdentifierStore>) -> Self {
        self.seen_store = Some(store);
        self
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    /// Expand `dir` non-recursively and run the files found.
    pub fn run_directory(&self, dir: &Path) -> Result<BatchResult, PipelineError> {
        let paths = expand_directory(dir)?;
        self.run(&paths)
    }

    pub fn run(&self, paths: &[PathBuf]) -> Result<BatchResult, PipelineError> {
        self.run_with_sink(paths, &DiscardSink)
    }

    /// Run a batch, handing each prepared tensor to `sink`.
    pub fn run_with_sink(
        &self,
        paths: &[PathBuf],
        sink: &dyn PreparedSink,
    ) -> Result<BatchResult, PipelineError> {
        let start = Instant::now();
        let mut result = BatchResult::empty();

        if paths.is_empty() {
            warn!(batch_id = %result.batch_id, "Empty batch submitted");
            result.notices.push(BatchNotice::EmptyBatch);
            return Ok(result);
        }

        let limit = self.config.max_batch_size;
        let batch = if paths.len() > limit {
            let notice = BatchNotice::Truncated {
                submitted: paths.len(),
                kept: limit,
            };
            warn!(batch_id = %result.batch_id, submitted = paths.len(), kept = limit, "{}", notice.message());
            result.notices.push(notice);
            &paths[..limit]
        } else {
            paths
        };

        let store: Arc<dyn SeenIdentifierStore> = match &self.seen_store {
            Some(store) => Arc::clone(store),
            None => open_store(&SeenScope::Batch)?,
        };
        let gate = QualityGate::standard(
            self.config.quality_gate,
            self.config.blank,
            store,
            self.config.duplicates.raster_content_hash,
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.concurrency)
            .thread_name(|i| format!("intake-worker-{i}"))
            .build()
            .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;

        info!(
            batch_id = %result.batch_id,
            files = batch.len(),
            concurrency = self.config.concurrency,
            "Batch started"
        );

        let outcomes: Vec<FileOutcome> = pool.install(|| {
            batch
                .par_iter()
                .map(|path| self.process_isolated(path, &gate, sink))
                .collect()
        });

        for outcome in outcomes {
            match outcome {
                FileOutcome::Processed(p) => result.processed.push(p),
                FileOutcome::Skipped(s) => result.skipped.push(s),
                FileOutcome::Failed(e) => result.errors.push(e),
            }
        }

        info!(
            batch_id = %result.batch_id,
            processed = result.processed.len(),
            skipped = result.skipped.len(),
            errors = result.errors.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Batch complete"
        );

        Ok(result)
    }

    /// Run one file, turning a worker panic into a per-file error.
    fn process_isolated(&self, path: &Path, gate: &QualityGate, sink: &dyn PreparedSink) -> FileOutcome {
        let name = file_name_of(path);
        let span = info_span!("intake.file", file = %name);
        let _guard = span.enter();

        match catch_unwind(AssertUnwindSafe(|| self.process_file(path, &name, gate, sink))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = format!("Worker panicked: {}", panic_message(payload.as_ref()));
                warn!(file = %name, "{message}");
                FileOutcome::Failed(FileErrorRecord::new(
                    name,
                    path.to_path_buf(),
                    FileError::new(InvalidReason::CorruptFile, message),
                ))
            }
        }
    }

    fn process_file(
        &self,
        path: &Path,
        name: &str,
        gate: &QualityGate,
        sink: &dyn PreparedSink,
    ) -> FileOutcome {
        let record = |err: FileError| FileErrorRecord::new(name.to_string(), path.to_path_buf(), err);

        let meta = match validate(path, &self.config.allowed_extensions) {
            Ok(meta) => meta,
            Err(err) => {
                warn!(file = %name, reason = %err.reason, "Skipped: {}", err.message);
                return FileOutcome::Skipped(record(err));
            }
        };

        let fail = |err: FileError| {
            warn!(file = %name, reason = %err.reason, "Rejected: {}", err.message);
            FileOutcome::Failed(record(err))
        };

        let extraction = match extract(&meta) {
            Ok(extraction) => extraction,
            Err(err) => return fail(err),
        };

        let (image, warnings) = match gate.evaluate(extraction) {
            ValidationOutcome::Valid { image, warnings } => (image, warnings),
            ValidationOutcome::Invalid(err) => return fail(err),
        };

        let prepared = match transform(&image, &self.config.transform) {
            Ok(prepared) => prepared,
            Err(err) => return fail(err),
        };

        let processed = ProcessedFile {
            file: name.to_string(),
            path: path.to_path_buf(),
            format: image.format,
            original: Resolution::new(image.width(), image.height()),
            placement: prepared.placement,
            instance_uid: image.instance_id().map(String::from),
            warnings,
        };
        sink.accept(prepared);

        tracing::debug!(file = %name, warnings = processed.warnings.len(), "Processed");
        FileOutcome::Processed(processed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one batch with default settings apart from the pool size and batch
/// limit.
pub fn run_batch(
    paths: &[PathBuf],
    concurrency: usize,
    max_batch_size: usize,
) -> Result<BatchResult, PipelineError> {
    let config = IntakeConfig {
        concurrency,
        max_batch_size,
        ..IntakeConfig::default()
    };
    BatchRunner::new(config)?.run(paths)
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
