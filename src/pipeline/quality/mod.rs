//! Post-decode quality gate.
//!
//! Checks run in a fixed order (resolution, blank, duplicate) and are never
//! short-circuited, so one file can report several problems at once. The
//! duplicate check therefore records an identifier even when an earlier
//! check already failed the file.

pub mod resolution;
pub mod blank;
pub mod duplicate;

pub use blank::{BlankCheck, BlankPolicy};
pub use duplicate::{
    open_store, DuplicateCheck, DuplicatePolicy, InMemorySeenSet, SeenIdentifierStore,
    SeenScope, SeenStoreError, SqliteSeenStore,
};
pub use resolution::{ResolutionAction, ResolutionCheck, ResolutionPolicy};

use std::sync::Arc;

use tracing::debug;

use crate::pipeline::error::FileError;
use crate::pipeline::extraction::{DecodedImage, Extraction};

/// What a single check observed.
#[derive(Debug, Clone, PartialEq)]
pub enum QualityFinding {
    Warning(String),
    Failure(FileError),
}

/// One quality check over a decoded image.
pub trait QualityCheck: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` when the image passes.
    fn check(&self, image: &DecodedImage) -> Option<QualityFinding>;
}

/// Terminal state of a file after the quality gate.
#[derive(Debug, Clone)]
pub enum ValidationOutcome {
    Valid {
        image: DecodedImage,
        warnings: Vec<String>,
    },
    Invalid(FileError),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// Ordered set of checks applied to every decoded image.
pub struct QualityGate {
    checks: Vec<Box<dyn QualityCheck>>,
}

impl QualityGate {
    pub fn new(checks: Vec<Box<dyn QualityCheck>>) -> Self {
        Self { checks }
    }

    /// Standard order: resolution, blank, duplicate.
    pub fn standard(
        resolution: ResolutionPolicy,
        blank: BlankPolicy,
        store: Arc<dyn SeenIdentifierStore>,
        raster_content_hash: bool,
    ) -> Self {
        Self::new(vec![
            Box::new(ResolutionCheck::new(resolution)),
            Box::new(BlankCheck::new(blank)),
            Box::new(DuplicateCheck::new(store, raster_content_hash)),
        ])
    }

    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Run every check. The first failure decides the reason; all failure
    /// messages are kept.
    pub fn evaluate(&self, extraction: Extraction) -> ValidationOutcome {
        let Extraction {
            image,
            mut warnings,
        } = extraction;
        let mut failures: Vec<FileError> = Vec::new();

        for check in &self.checks {
            match check.check(&image) {
                None => {}
                Some(QualityFinding::Warning(msg)) => warnings.push(msg),
                Some(QualityFinding::Failure(err)) => {
                    debug!(file = %image.source, check = check.name(), reason = %err.reason, "Quality check failed");
                    failures.push(err);
                }
            }
        }

        let Some(first) = failures.first() else {
            return ValidationOutcome::Valid { image, warnings };
        };

        let message = failures
            .iter()
            .map(|f| f.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        ValidationOutcome::Invalid(FileError::new(first.reason, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Resolution;
    use crate::pipeline::error::InvalidReason;
    use crate::pipeline::extraction::{pixel_digest, DicomMetadata, PixelBuffer};
    use crate::pipeline::validation::ImageFormat;
    use image::{GrayImage, Luma};

    fn small_policy() -> ResolutionPolicy {
        ResolutionPolicy {
            min: Resolution::new(8, 8),
            ..ResolutionPolicy::quality_gate()
        }
    }

    fn extraction(w: u32, h: u32, value: u8, uid: Option<&str>) -> Extraction {
        let pixels = PixelBuffer::Gray(GrayImage::from_pixel(w, h, Luma([value])));
        Extraction {
            image: DecodedImage {
                source: "q.dcm".into(),
                format: ImageFormat::Dicom,
                content_digest: pixel_digest(&pixels),
                pixels,
                dicom: Some(DicomMetadata {
                    sop_instance_uid: uid.map(String::from),
                    ..Default::default()
                }),
            },
            warnings: vec![],
        }
    }

    fn gate(store: Arc<dyn SeenIdentifierStore>) -> QualityGate {
        QualityGate::standard(small_policy(), BlankPolicy::default(), store, false)
    }

    #[test]
    fn fixed_check_order() {
        let g = gate(Arc::new(InMemorySeenSet::new()));
        assert_eq!(g.check_names(), vec!["resolution", "blank", "duplicate"]);
    }

    #[test]
    fn clean_image_is_valid() {
        let g = gate(Arc::new(InMemorySeenSet::new()));
        let outcome = g.evaluate(extraction(16, 16, 200, Some("1")));
        assert!(outcome.is_valid());
    }

    #[test]
    fn all_checks_run_and_first_reason_wins() {
        let store: Arc<dyn SeenIdentifierStore> = Arc::new(InMemorySeenSet::new());
        let g = gate(Arc::clone(&store));
        // Too small and blank: both reported, resolution reason first.
        match g.evaluate(extraction(4, 4, 0, Some("dup"))) {
            ValidationOutcome::Invalid(err) => {
                assert_eq!(err.reason, InvalidReason::ResolutionTooLow);
                assert!(err.message.contains("too low"));
                assert!(err.message.contains("blank"));
            }
            other => panic!("expected invalid, got {other:?}"),
        }
        // The identifier was still recorded.
        assert_eq!(store.len().unwrap(), 1);
        match g.evaluate(extraction(16, 16, 200, Some("dup"))) {
            ValidationOutcome::Invalid(err) => {
                assert_eq!(err.reason, InvalidReason::DuplicateDetected)
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[test]
    fn warnings_carry_through() {
        let policy = ResolutionPolicy {
            min: Resolution::new(64, 64),
            max: None,
            action: ResolutionAction::Warn,
        };
        let g = QualityGate::standard(
            policy,
            BlankPolicy::default(),
            Arc::new(InMemorySeenSet::new()),
            false,
        );
        let mut input = extraction(16, 16, 200, None);
        input.warnings.push("from extraction".into());
        match g.evaluate(input) {
            ValidationOutcome::Valid { warnings, .. } => {
                assert_eq!(warnings.len(), 2);
                assert_eq!(warnings[0], "from extraction");
            }
            other => panic!("expected valid, got {other:?}"),
        }
    }
}
