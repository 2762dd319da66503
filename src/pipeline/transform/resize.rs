//! Scale-then-pad resizing.
//!
//! Aspect-preserving mode scales by `min(tw/w, th/h)`, truncates the scaled
//! size to whole pixels, then pads to the exact target. Padding splits odd
//! deltas as floor on the left/top and ceil on the right/bottom.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Pixel, Rgb};
use serde::Serialize;
use tracing::debug;

use super::{ResizeFilter, ResizeMode};
use crate::config::Resolution;
use crate::pipeline::error::{FileError, InvalidReason};
use crate::pipeline::extraction::PixelBuffer;

/// Where the resized content sits inside the target canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    /// Non-padded region size.
    pub content: Resolution,
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Placement {
    fn full(target: Resolution) -> Self {
        Self {
            content: target,
            left: 0,
            top: 0,
            right: 0,
            bottom: 0,
        }
    }
}

fn resize_error(msg: impl Into<String>) -> FileError {
    FileError::new(InvalidReason::ResizeError, msg)
}

/// Content size for an aspect-preserving fit of `w`×`h` into `target`.
///
/// The limiting axis lands exactly on the target; the other axis is
/// truncated toward zero.
pub fn compute_fit(width: u32, height: u32, target: Resolution) -> Result<Resolution, FileError> {
    if width == 0 || height == 0 {
        return Err(resize_error(format!(
            "Cannot resize zero-area image {width}x{height}"
        )));
    }
    if target.is_zero_area() {
        return Err(resize_error(format!("Target resolution {target} has zero area")));
    }

    let sx = f64::from(target.width) / f64::from(width);
    let sy = f64::from(target.height) / f64::from(height);

    let fit = if sx <= sy {
        Resolution::new(target.width, (f64::from(height) * sx) as u32)
    } else {
        Resolution::new((f64::from(width) * sy) as u32, target.height)
    };

    if fit.is_zero_area() {
        return Err(resize_error(format!(
            "Aspect ratio of {width}x{height} collapses to {fit} at target {target}"
        )));
    }
    Ok(fit)
}

/// Split a padding delta into (before, after) as floor/ceil.
pub fn split_padding(delta: u32) -> (u32, u32) {
    let before = delta / 2;
    (before, delta - before)
}

fn placement_for(content: Resolution, target: Resolution) -> Placement {
    let (left, right) = split_padding(target.width - content.width);
    let (top, bottom) = split_padding(target.height - content.height);
    Placement {
        content,
        left,
        top,
        right,
        bottom,
    }
}

fn filter_type(filter: ResizeFilter) -> FilterType {
    match filter {
        ResizeFilter::Nearest => FilterType::Nearest,
        ResizeFilter::Triangle => FilterType::Triangle,
        ResizeFilter::CatmullRom => FilterType::CatmullRom,
        ResizeFilter::Gaussian => FilterType::Gaussian,
        ResizeFilter::Lanczos3 => FilterType::Lanczos3,
    }
}

fn scale_and_pad<P>(
    src: &ImageBuffer<P, Vec<u8>>,
    target: Resolution,
    placement: &Placement,
    filter: FilterType,
    fill: P,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let content = placement.content;
    let scaled = if src.dimensions() == (content.width, content.height) {
        src.clone()
    } else {
        imageops::resize(src, content.width, content.height, filter)
    };

    if content == target {
        return scaled;
    }

    let mut canvas = ImageBuffer::from_pixel(target.width, target.height, fill);
    imageops::replace(
        &mut canvas,
        &scaled,
        i64::from(placement.left),
        i64::from(placement.top),
    );
    canvas
}

/// Resize `pixels` to exactly `target`.
///
/// Already-at-target input is returned unchanged in either mode.
pub fn resize(
    pixels: &PixelBuffer,
    target: Resolution,
    mode: ResizeMode,
    filter: ResizeFilter,
    pad_value: u8,
) -> Result<(PixelBuffer, Placement), FileError> {
    let (w, h) = pixels.dimensions();

    let placement = match mode {
        ResizeMode::AspectPreserving => placement_for(compute_fit(w, h, target)?, target),
        ResizeMode::Stretch => {
            if w == 0 || h == 0 || target.is_zero_area() {
                return Err(resize_error(format!(
                    "Cannot stretch {w}x{h} to {target}"
                )));
            }
            Placement::full(target)
        }
    };

    let filter = filter_type(filter);
    let resized = match pixels {
        PixelBuffer::Gray(img) => PixelBuffer::Gray(scale_and_pad(
            img,
            target,
            &placement,
            filter,
            Luma([pad_value]),
        )),
        PixelBuffer::Rgb(img) => PixelBuffer::Rgb(scale_and_pad(
            img,
            target,
            &placement,
            filter,
            Rgb([pad_value; 3]),
        )),
    };

    debug!(
        from = %Resolution::new(w, h),
        to = %target,
        content = %placement.content,
        left = placement.left,
        top = placement.top,
        "Resized"
    );

    Ok((resized, placement))
}
