use serde::{Deserialize, Serialize};

use super::{QualityCheck, QualityFinding};
use crate::config::Resolution;
use crate::pipeline::error::{FileError, InvalidReason};
use crate::pipeline::extraction::DecodedImage;

/// Fail or only warn when an image is outside the policy bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    #[default]
    Reject,
    Warn,
}

/// Inclusive size bounds for one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionPolicy {
    pub min: Resolution,
    #[serde(default)]
    pub max: Option<Resolution>,
    #[serde(default)]
    pub action: ResolutionAction,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self::quality_gate()
    }
}

impl ResolutionPolicy {
    /// Intake quality gate: diagnostic images need at least 512×512.
    pub const fn quality_gate() -> Self {
        Self {
            min: Resolution::new(512, 512),
            max: None,
            action: ResolutionAction::Reject,
        }
    }

    /// Bounds for a preprocessing target resolution: 32×32 up to 4096×4096.
    pub const fn preprocessing_gate() -> Self {
        Self {
            min: Resolution::new(32, 32),
            max: Some(Resolution::new(4096, 4096)),
            action: ResolutionAction::Reject,
        }
    }

    pub fn admits(&self, width: u32, height: u32) -> bool {
        let above_min = width >= self.min.width && height >= self.min.height;
        let below_max = self
            .max
            .map_or(true, |max| width <= max.width && height <= max.height);
        above_min && below_max
    }
}

/// Minimum (and optional maximum) size check. Both bounds report
/// `ResolutionTooLow`; the message names the bound.
pub struct ResolutionCheck {
    policy: ResolutionPolicy,
}

impl ResolutionCheck {
    pub fn new(policy: ResolutionPolicy) -> Self {
        Self { policy }
    }
}

impl QualityCheck for ResolutionCheck {
    fn name(&self) -> &'static str {
        "resolution"
    }

    fn check(&self, image: &DecodedImage) -> Option<QualityFinding> {
        let (w, h) = image.pixels.dimensions();
        if self.policy.admits(w, h) {
            return None;
        }

        let message = if w < self.policy.min.width || h < self.policy.min.height {
            format!(
                "Resolution too low: {w}x{h}, minimum {}",
                self.policy.min
            )
        } else {
            format!(
                "Resolution too high: {w}x{h}, maximum {}",
                self.policy.max.unwrap_or(self.policy.min)
            )
        };

        Some(match self.policy.action {
            ResolutionAction::Reject => {
                QualityFinding::Failure(FileError::new(InvalidReason::ResolutionTooLow, message))
            }
            ResolutionAction::Warn => QualityFinding::Warning(message),
        })
    }
}
