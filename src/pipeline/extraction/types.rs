use std::borrow::Cow;

use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

use crate::pipeline::validation::ImageFormat;

/// Decoded 8-bit pixels in HWC order.
///
/// Alpha is dropped at decode time and 16-bit sources are scaled down, so
/// downstream stages only ever see one or three 8-bit channels.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl PixelBuffer {
    /// Collapse any decoded image to the two supported layouts.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        if image.color().has_color() {
            Self::Rgb(image.into_rgb8())
        } else {
            Self::Gray(image.into_luma8())
        }
    }

    pub fn width(&self) -> u32 {
        match self {
            Self::Gray(img) => img.width(),
            Self::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Gray(img) => img.height(),
            Self::Rgb(img) => img.height(),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn channels(&self) -> usize {
        match self {
            Self::Gray(_) => 1,
            Self::Rgb(_) => 3,
        }
    }

    /// Raw interleaved bytes, row-major.
    pub fn as_raw(&self) -> &[u8] {
        match self {
            Self::Gray(img) => img.as_raw(),
            Self::Rgb(img) => img.as_raw(),
        }
    }

    /// Single-channel intensity view. Borrowed when already grayscale.
    pub fn luma(&self) -> Cow<'_, GrayImage> {
        match self {
            Self::Gray(img) => Cow::Borrowed(img),
            Self::Rgb(img) => Cow::Owned(rgb_to_gray(img)),
        }
    }
}

/// ITU-R BT.601 luminance, rounded to nearest.
pub fn rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
        image::Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Header-level DICOM attributes. Every field is optional because real-world
/// files omit attributes the standard calls mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DicomMetadata {
    pub sop_instance_uid: Option<String>,
    pub sop_class_uid: Option<String>,
    pub modality: Option<String>,
    pub rows: Option<u32>,
    pub columns: Option<u32>,
    pub number_of_frames: Option<u32>,
}

/// A successfully decoded input file.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// File identifier used in reports.
    pub source: String,
    pub format: ImageFormat,
    pub pixels: PixelBuffer,
    /// DICOM attributes when the source was DICOM.
    pub dicom: Option<DicomMetadata>,
    /// SHA-256 of the decoded pixels, base64.
    pub content_digest: String,
}

impl DecodedImage {
    /// Unique instance identifier used for duplicate detection.
    pub fn instance_id(&self) -> Option<&str> {
        self.dicom
            .as_ref()
            .and_then(|d| d.sop_instance_uid.as_deref())
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Extractor output: the image plus non-fatal observations.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub image: DecodedImage,
    pub warnings: Vec<String>,
}
