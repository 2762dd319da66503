pub mod types;
pub mod raster;
pub mod dicom;
pub mod digest;

pub use types::*;
pub use dicom::read_dicom_metadata;
pub use digest::pixel_digest;

use std::path::Path;

use tracing::{debug, warn};

use crate::pipeline::error::FileError;
use crate::pipeline::validation::format::read_header;
use crate::pipeline::validation::{FileMetadata, ImageFormat};

/// Decoder output before the digest and file identity are attached.
#[derive(Debug)]
pub struct Decoded {
    pub pixels: PixelBuffer,
    pub dicom: Option<DicomMetadata>,
    pub warnings: Vec<String>,
}

type DecodeFn = fn(&Path, ImageFormat) -> Result<Decoded, FileError>;

/// One decoder per format, resolved from the validated `ImageFormat`.
const DECODERS: [(ImageFormat, DecodeFn); 4] = [
    (ImageFormat::Jpeg, raster::decode),
    (ImageFormat::Png, raster::decode),
    (ImageFormat::Bmp, raster::decode),
    (ImageFormat::Dicom, dicom::decode),
];

fn decoder_for(format: ImageFormat) -> DecodeFn {
    DECODERS
        .iter()
        .find(|(f, _)| *f == format)
        .map(|(_, decode)| *decode)
        .unwrap_or(raster::decode)
}

/// Pick the format to decode with.
///
/// A raster file whose content is a different raster format is decoded as
/// what it really is, with a warning. Any other mismatch is left to the
/// declared decoder, which reports it as corrupt.
fn resolve_format(declared: ImageFormat, header: &[u8]) -> (ImageFormat, Option<String>) {
    match ImageFormat::sniff(header) {
        Some(sniffed) if sniffed != declared && sniffed.is_raster() && declared.is_raster() => (
            sniffed,
            Some(format!(
                "Extension says {}, content is {}",
                declared.as_str(),
                sniffed.as_str()
            )),
        ),
        _ => (declared, None),
    }
}

/// Decode a validated file into pixels.
pub fn extract(meta: &FileMetadata) -> Result<Extraction, FileError> {
    let header =
        read_header(&meta.path).map_err(|e| FileError::corrupt("Failed to read file", e))?;
    let (format, mismatch) = resolve_format(meta.format, &header);

    let mut warnings = Vec::new();
    if let Some(note) = mismatch {
        warn!(file = %meta.name, "{note}");
        warnings.push(note);
    }

    let decoded = decoder_for(format)(&meta.path, format)?;
    warnings.extend(decoded.warnings);

    let content_digest = pixel_digest(&decoded.pixels);
    debug!(
        file = %meta.name,
        format = format.as_str(),
        width = decoded.pixels.width(),
        height = decoded.pixels.height(),
        channels = decoded.pixels.channels(),
        "Extraction complete"
    );

    Ok(Extraction {
        image: DecodedImage {
            source: meta.name.clone(),
            format,
            pixels: decoded.pixels,
            dicom: decoded.dicom,
            content_digest,
        },
        warnings,
    })
}
