use std::path::Path;

use image::{GenericImageView, ImageReader};
use tracing::debug;

use super::types::PixelBuffer;
use super::Decoded;
use crate::pipeline::error::{FileError, InvalidReason};
use crate::pipeline::validation::ImageFormat;

fn library_format(format: ImageFormat) -> Option<image::ImageFormat> {
    match format {
        ImageFormat::Jpeg => Some(image::ImageFormat::Jpeg),
        ImageFormat::Png => Some(image::ImageFormat::Png),
        ImageFormat::Bmp => Some(image::ImageFormat::Bmp),
        ImageFormat::Dicom => None,
    }
}

fn open_reader(
    path: &Path,
    format: image::ImageFormat,
) -> Result<ImageReader<std::io::BufReader<std::fs::File>>, FileError> {
    let mut reader =
        ImageReader::open(path).map_err(|e| FileError::corrupt("Failed to open image", e))?;
    reader.set_format(format);
    Ok(reader)
}

/// Decode a JPEG/PNG/BMP file.
///
/// Two passes: the header is parsed first as an integrity check, which
/// consumes the reader, then the file is reopened for the full decode.
pub fn decode(path: &Path, format: ImageFormat) -> Result<Decoded, FileError> {
    let lib_format = library_format(format).ok_or_else(|| {
        FileError::new(
            InvalidReason::UnsupportedFormat,
            format!("No raster decoder for {}", format.as_str()),
        )
    })?;

    let verified = open_reader(path, lib_format)?
        .into_dimensions()
        .map_err(|e| FileError::corrupt("Image verification failed", e))?;

    let image = open_reader(path, lib_format)?
        .decode()
        .map_err(|e| FileError::corrupt("Failed to decode image", e))?;

    if image.dimensions() != verified {
        return Err(FileError::new(
            InvalidReason::CorruptFile,
            format!(
                "Decoded size {:?} does not match header size {:?}",
                image.dimensions(),
                verified
            ),
        ));
    }

    debug!(
        format = format.as_str(),
        width = verified.0,
        height = verified.1,
        "Raster decoded"
    );

    Ok(Decoded {
        pixels: PixelBuffer::from_dynamic(image),
        dicom: None,
        warnings: Vec::new(),
    })
}
