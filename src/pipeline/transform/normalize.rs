//! Datatype cast and per-channel normalization.
//!
//! Order is fixed: cast to the target representation, divide by 255, then
//! subtract `mean[c]` and divide by `std[c]`.

use super::{NormalizationConstants, PixelDatatype};
use crate::pipeline::error::{FileError, InvalidReason};
use crate::pipeline::extraction::PixelBuffer;

/// Final tensor values in HWC order.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    U8(Vec<u8>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl PixelData {
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn datatype(&self) -> PixelDatatype {
        match self {
            Self::U8(_) => PixelDatatype::Uint8,
            Self::F32(_) => PixelDatatype::Float32,
            Self::F64(_) => PixelDatatype::Float64,
        }
    }
}

fn normalize_error(msg: impl Into<String>) -> FileError {
    FileError::new(InvalidReason::NormalizeError, msg)
}

/// Expand mean/std to one value per channel. Length 1 broadcasts.
fn per_channel(values: &[f64], channels: usize, what: &str) -> Result<Vec<f64>, FileError> {
    match values.len() {
        1 => Ok(vec![values[0]; channels]),
        n if n == channels => Ok(values.to_vec()),
        n => Err(normalize_error(format!(
            "{what} has {n} values, image has {channels} channel(s)"
        ))),
    }
}

fn scaled(
    pixels: &PixelBuffer,
    constants: Option<&NormalizationConstants>,
) -> Result<Vec<f64>, FileError> {
    let raw = pixels.as_raw();
    let channels = pixels.channels();

    let Some(constants) = constants else {
        return Ok(raw.iter().map(|&v| f64::from(v) / 255.0).collect());
    };

    let mean = per_channel(&constants.mean, channels, "mean")?;
    let std = per_channel(&constants.std, channels, "std")?;
    if let Some(bad) = std.iter().find(|s| !s.is_finite() || **s <= 0.0) {
        return Err(normalize_error(format!("std must be positive, got {bad}")));
    }

    let out: Vec<f64> = raw
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let c = i % channels;
            (f64::from(v) / 255.0 - mean[c]) / std[c]
        })
        .collect();

    if let Some(pos) = out.iter().position(|v| !v.is_finite()) {
        return Err(normalize_error(format!(
            "Non-finite value after normalization at index {pos}"
        )));
    }
    Ok(out)
}

/// Convert resized pixels into the configured representation.
pub fn normalize(
    pixels: &PixelBuffer,
    datatype: PixelDatatype,
    constants: Option<&NormalizationConstants>,
) -> Result<PixelData, FileError> {
    match datatype {
        PixelDatatype::Uint8 => {
            if constants.is_some() {
                return Err(normalize_error(
                    "uint8 output cannot carry normalization constants",
                ));
            }
            Ok(PixelData::U8(pixels.as_raw().to_vec()))
        }
        PixelDatatype::Float32 => Ok(PixelData::F32(
            scaled(pixels, constants)?.into_iter().map(|v| v as f32).collect(),
        )),
        PixelDatatype::Float64 => Ok(PixelData::F64(scaled(pixels, constants)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn rgb() -> PixelBuffer {
        PixelBuffer::Rgb(RgbImage::from_pixel(2, 1, Rgb([0, 51, 255])))
    }

    #[test]
    fn uint8_is_unchanged() {
        let data = normalize(&rgb(), PixelDatatype::Uint8, None).unwrap();
        assert_eq!(data, PixelData::U8(vec![0, 51, 255, 0, 51, 255]));
    }

    #[test]
    fn float_divides_by_255() {
        let PixelData::F64(v) = normalize(&rgb(), PixelDatatype::Float64, None).unwrap() else {
            panic!("expected f64");
        };
        assert_eq!(v[0], 0.0);
        assert!((v[1] - 0.2).abs() < 1e-12);
        assert_eq!(v[2], 1.0);

        let data = normalize(&rgb(), PixelDatatype::Float32, None).unwrap();
        assert_eq!(data.datatype(), PixelDatatype::Float32);
        assert_eq!(data.len(), 6);
    }

    #[test]
    fn per_channel_mean_std() {
        let constants = NormalizationConstants {
            mean: vec![0.0, 0.2, 0.5],
            std: vec![1.0, 0.5, 0.25],
        };
        let PixelData::F64(v) =
            normalize(&rgb(), PixelDatatype::Float64, Some(&constants)).unwrap()
        else {
            panic!("expected f64");
        };
        assert_eq!(v[0], 0.0);
        assert!(v[1].abs() < 1e-12);
        assert!((v[2] - 2.0).abs() < 1e-12);
        assert!((v[5] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn single_value_broadcasts() {
        let constants = NormalizationConstants {
            mean: vec![0.5],
            std: vec![0.5],
        };
        let gray = PixelBuffer::Gray(GrayImage::from_pixel(2, 2, Luma([255])));
        let PixelData::F32(v) =
            normalize(&gray, PixelDatatype::Float32, Some(&constants)).unwrap()
        else {
            panic!("expected f32");
        };
        assert!(v.iter().all(|x| (*x - 1.0).abs() < 1e-6));
    }

    #[test]
    fn channel_mismatch_is_normalize_error() {
        let constants = NormalizationConstants {
            mean: vec![0.1, 0.2, 0.3],
            std: vec![1.0, 1.0, 1.0],
        };
        let gray = PixelBuffer::Gray(GrayImage::new(2, 2));
        let err = normalize(&gray, PixelDatatype::Float32, Some(&constants)).unwrap_err();
        assert_eq!(err.reason, InvalidReason::NormalizeError);
    }

    #[test]
    fn zero_std_is_normalize_error() {
        let constants = NormalizationConstants {
            mean: vec![0.0],
            std: vec![0.0],
        };
        let err = normalize(&rgb(), PixelDatatype::Float64, Some(&constants)).unwrap_err();
        assert_eq!(err.reason, InvalidReason::NormalizeError);
    }

    #[test]
    fn uint8_with_constants_is_rejected() {
        let constants = NormalizationConstants {
            mean: vec![0.0],
            std: vec![1.0],
        };
        let err = normalize(&rgb(), PixelDatatype::Uint8, Some(&constants)).unwrap_err();
        assert_eq!(err.reason, InvalidReason::NormalizeError);
    }
}
