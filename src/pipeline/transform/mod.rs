//! Resize and normalize a validated image into model input.

pub mod resize;
pub mod normalize;

pub use normalize::PixelData;
pub use resize::{compute_fit, split_padding, Placement};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Resolution;
use crate::pipeline::error::FileError;
use crate::pipeline::extraction::DecodedImage;

// ═══════════════════════════════════════════════════════════
// Configuration types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Scale to fit, then pad to the exact target.
    #[default]
    AspectPreserving,
    /// Resize straight to the target, distorting aspect ratio.
    Stretch,
}

/// Resampling filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    /// Bilinear.
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelDatatype {
    #[default]
    Uint8,
    Float32,
    Float64,
}

impl PixelDatatype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uint8 => "uint8",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

/// Per-channel mean/std applied after scaling to [0, 1].
/// A single value applies to every channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationConstants {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl NormalizationConstants {
    /// ImageNet statistics, the usual choice for RGB backbones.
    pub fn imagenet() -> Self {
        Self {
            mean: vec![0.485, 0.456, 0.406],
            std: vec![0.229, 0.224, 0.225],
        }
    }

    pub fn check(&self) -> Result<(), String> {
        if self.mean.is_empty() || self.std.is_empty() {
            return Err("normalization mean and std must not be empty".into());
        }
        let (m, s) = (self.mean.len(), self.std.len());
        if m != s && m != 1 && s != 1 {
            return Err(format!("normalization mean has {m} values but std has {s}"));
        }
        if let Some(v) = self.mean.iter().find(|v| !v.is_finite()) {
            return Err(format!("normalization mean must be finite, got {v}"));
        }
        if let Some(v) = self.std.iter().find(|v| !v.is_finite() || **v <= 0.0) {
            return Err(format!("normalization std must be positive, got {v}"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub target: Resolution,
    pub mode: ResizeMode,
    pub filter: ResizeFilter,
    /// Intensity written into padded borders.
    pub pad_value: u8,
    pub datatype: PixelDatatype,
    pub normalization: Option<NormalizationConstants>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            target: Resolution::new(224, 224),
            mode: ResizeMode::AspectPreserving,
            filter: ResizeFilter::Triangle,
            pad_value: 0,
            datatype: PixelDatatype::Uint8,
            normalization: None,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Output
// ═══════════════════════════════════════════════════════════

/// Model-ready tensor plus the geometry needed to map it back to the source.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub source: String,
    pub original: Resolution,
    pub target: Resolution,
    pub placement: Placement,
    pub channels: usize,
    /// HWC order, `target.height * target.width * channels` values.
    pub data: PixelData,
}

/// Resize, cast, then normalize. The order is fixed.
pub fn transform(image: &DecodedImage, config: &TransformConfig) -> Result<PreparedImage, FileError> {
    let (resized, placement) = resize::resize(
        &image.pixels,
        config.target,
        config.mode,
        config.filter,
        config.pad_value,
    )?;
    let data = normalize::normalize(&resized, config.datatype, config.normalization.as_ref())?;

    debug!(
        file = %image.source,
        target = %config.target,
        datatype = config.datatype.as_str(),
        "Transform complete"
    );

    Ok(PreparedImage {
        source: image.source.clone(),
        original: Resolution::new(image.width(), image.height()),
        target: config.target,
        placement,
        channels: resized.channels(),
        data,
    })
}
