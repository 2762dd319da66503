use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::pipeline::error::{FileError, InvalidReason};

/// Extensions accepted when the configuration does not override them.
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".bmp", ".dcm"];

/// DICOM Part 10 files carry a 128-byte preamble followed by `DICM`.
const DICOM_MAGIC_OFFSET: usize = 128;

/// Enough header bytes to recognise every supported format.
pub const SNIFF_LEN: usize = DICOM_MAGIC_OFFSET + 4;

/// Image formats the intake pipeline can decode.
///
/// Resolved once from the extension at validation time and used to pick
/// the decoder; nothing downstream re-inspects the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Bmp,
    Dicom,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Bmp => "bmp",
            Self::Dicom => "dicom",
        }
    }

    /// Map a lowercase extension (with or without the leading dot).
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.trim_start_matches('.') {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "bmp" => Some(Self::Bmp),
            "dcm" | "dicom" => Some(Self::Dicom),
            _ => None,
        }
    }

    pub fn is_raster(&self) -> bool {
        !matches!(self, Self::Dicom)
    }

    /// Detect the format from magic bytes. Extensions can lie, headers don't.
    pub fn sniff(header: &[u8]) -> Option<Self> {
        match header {
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [0x89, 0x50, 0x4E, 0x47, ..] => Some(Self::Png),
            [0x42, 0x4D, ..] => Some(Self::Bmp),
            _ if header.len() >= SNIFF_LEN
                && &header[DICOM_MAGIC_OFFSET..SNIFF_LEN] == b"DICM" =>
            {
                Some(Self::Dicom)
            }
            _ => None,
        }
    }
}

/// Lowercase an extension and make sure it has a leading dot.
pub fn normalize_extension(extension: &str) -> String {
    let lower = extension.trim().to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

/// Lowercase extension of a path including the dot, or empty string.
pub fn path_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension)
        .unwrap_or_default()
}

/// Check the extension against the allow-list and resolve the decoder format.
pub fn check_format(path: &Path, allowed: &[String]) -> Result<(String, ImageFormat), FileError> {
    let extension = path_extension(path);
    if extension.is_empty() {
        return Err(FileError::new(
            InvalidReason::UnsupportedFormat,
            "File has no extension",
        ));
    }

    let permitted = allowed
        .iter()
        .any(|a| normalize_extension(a) == extension);
    let format = ImageFormat::from_extension(&extension).filter(|_| permitted);

    match format {
        Some(format) => Ok((extension, format)),
        None => Err(FileError::new(
            InvalidReason::UnsupportedFormat,
            format!(
                "Unsupported file format '{extension}'. Allowed: {}",
                allowed.join(", ")
            ),
        )),
    }
}

/// Read the first bytes of a file for magic-number detection.
pub fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = std::fs::File::open(path)?;
    let mut header = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut header)?;
    Ok(header)
}
