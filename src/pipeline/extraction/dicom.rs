//! DICOM parsing: header attributes and first-frame pixel decoding.

use std::path::Path;

use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::{InMemDicomObject, OpenFileOptions};
use dicom_pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption};
use tracing::debug;

use super::types::{DicomMetadata, PixelBuffer};
use super::Decoded;
use crate::pipeline::error::{FileError, InvalidReason};
use crate::pipeline::validation::ImageFormat;

fn text_attr(obj: &InMemDicomObject, tag: Tag) -> Option<String> {
    obj.element_opt(tag)
        .ok()
        .flatten()
        .and_then(|e| e.to_str().ok())
        .map(|s| {
            s.trim_matches(|c: char| c == '\0' || c.is_whitespace())
                .to_string()
        })
        .filter(|s| !s.is_empty())
}

fn int_attr(obj: &InMemDicomObject, tag: Tag) -> Option<u32> {
    obj.element_opt(tag)
        .ok()
        .flatten()
        .and_then(|e| e.to_int::<u32>().ok())
}

fn metadata_of(obj: &InMemDicomObject) -> DicomMetadata {
    DicomMetadata {
        sop_instance_uid: text_attr(obj, tags::SOP_INSTANCE_UID),
        sop_class_uid: text_attr(obj, tags::SOP_CLASS_UID),
        modality: text_attr(obj, tags::MODALITY),
        rows: int_attr(obj, tags::ROWS),
        columns: int_attr(obj, tags::COLUMNS),
        number_of_frames: int_attr(obj, tags::NUMBER_OF_FRAMES),
    }
}

fn has_attr(obj: &InMemDicomObject, tag: Tag) -> bool {
    matches!(obj.element_opt(tag), Ok(Some(_)))
}

/// VOI transform for display conversion. A window declared in the file is
/// honoured; 8-bit data without one keeps its stored intensities, wider data
/// falls back to the min/max stretch.
fn voi_lut_for(obj: &InMemDicomObject) -> VoiLutOption {
    if has_attr(obj, tags::WINDOW_CENTER) && has_attr(obj, tags::WINDOW_WIDTH) {
        return VoiLutOption::First;
    }
    match int_attr(obj, tags::BITS_STORED) {
        Some(bits) if bits <= 8 => VoiLutOption::Identity,
        _ => VoiLutOption::Default,
    }
}

/// Read header attributes without loading pixel data.
pub fn read_dicom_metadata(path: &Path) -> Result<DicomMetadata, FileError> {
    let obj = OpenFileOptions::new()
        .read_until(tags::PIXEL_DATA)
        .open_file(path)
        .map_err(|e| FileError::corrupt("Failed to parse DICOM", e))?;
    Ok(metadata_of(&obj))
}

/// Parse a DICOM file and decode its first frame.
pub fn decode(path: &Path, _format: ImageFormat) -> Result<Decoded, FileError> {
    let obj = OpenFileOptions::new()
        .open_file(path)
        .map_err(|e| FileError::corrupt("Failed to parse DICOM", e))?;

    let metadata = metadata_of(&obj);

    if !has_attr(&obj, tags::PIXEL_DATA) {
        return Err(FileError::new(
            InvalidReason::MissingPixelData,
            "DICOM dataset has no pixel data",
        ));
    }

    let pixel_data = obj
        .decode_pixel_data()
        .map_err(|e| FileError::corrupt("Failed to decode DICOM pixel data", e))?;
    let frames = pixel_data.number_of_frames();
    let options = ConvertOptions::new().with_voi_lut(voi_lut_for(&obj));
    let image = pixel_data
        .to_dynamic_image_with_options(0, &options)
        .map_err(|e| FileError::corrupt("Failed to convert DICOM pixel data", e))?;

    let mut warnings = Vec::new();
    if frames > 1 {
        warnings.push(format!("Multi-frame DICOM ({frames} frames): only frame 0 is used"));
    }
    if metadata.sop_instance_uid.is_none() {
        warnings.push("DICOM has no SOP Instance UID; duplicate check skipped".to_string());
    }

    debug!(
        modality = metadata.modality.as_deref().unwrap_or("unknown"),
        width = image.width(),
        height = image.height(),
        frames,
        "DICOM decoded"
    );

    Ok(Decoded {
        pixels: PixelBuffer::from_dynamic(image),
        dicom: Some(metadata),
        warnings,
    })
}
