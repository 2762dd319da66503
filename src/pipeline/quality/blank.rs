use serde::{Deserialize, Serialize};

use super::{QualityCheck, QualityFinding};
use crate::pipeline::error::{FileError, InvalidReason};
use crate::pipeline::extraction::DecodedImage;
use image::GrayImage;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlankPolicy {
    /// Pixels at or below this intensity (0-255) count as dark.
    pub intensity_threshold: u8,
    /// Fail once this share of pixels (percent) is dark.
    pub max_percentage: f64,
}

impl Default for BlankPolicy {
    fn default() -> Self {
        Self {
            intensity_threshold: 10,
            max_percentage: 90.0,
        }
    }
}

/// Percentage of pixels at or below `threshold`. 0 for an empty image.
pub fn dark_percentage(luma: &GrayImage, threshold: u8) -> f64 {
    let total = luma.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    let dark = luma.as_raw().iter().filter(|&&v| v <= threshold).count();
    dark as f64 * 100.0 / total as f64
}

pub struct BlankCheck {
    policy: BlankPolicy,
}

impl BlankCheck {
    pub fn new(policy: BlankPolicy) -> Self {
        Self { policy }
    }
}

impl QualityCheck for BlankCheck {
    fn name(&self) -> &'static str {
        "blank"
    }

    fn check(&self, image: &DecodedImage) -> Option<QualityFinding> {
        let luma = image.pixels.luma();
        let pct = dark_percentage(&luma, self.policy.intensity_threshold);
        if pct >= self.policy.max_percentage {
            return Some(QualityFinding::Failure(FileError::new(
                InvalidReason::BlankImage,
                format!(
                    "Image appears blank: {pct:.1}% of pixels at or below intensity {}",
                    self.policy.intensity_threshold
                ),
            )));
        }
        None
    }
}
