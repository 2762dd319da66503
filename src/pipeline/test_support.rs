//! Fixture writers shared by pipeline tests.

use std::path::{Path, PathBuf};

use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::{FileMetaTableBuilder, InMemDicomObject};
use image::{GrayImage, Luma, Rgb, RgbImage};

/// Format is inferred from the extension of `name`.
pub fn write_rgb(dir: &Path, name: &str, w: u32, h: u32, color: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(w, h, Rgb(color)).save(&path).unwrap();
    path
}

pub fn write_gray(dir: &Path, name: &str, w: u32, h: u32, value: u8) -> PathBuf {
    let path = dir.join(name);
    GrayImage::from_pixel(w, h, Luma([value])).save(&path).unwrap();
    path
}

fn gradient_value(x: u32, y: u32) -> u8 {
    (64 + ((x + y) * 4) % 192) as u8
}

/// RGB gradient with no dark pixels.
pub fn write_gradient(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_fn(w, h, |x, y| {
        let v = gradient_value(x, y);
        Rgb([v, 255 - v / 2, v / 2 + 100])
    })
    .save(&path)
    .unwrap();
    path
}

fn dicom_base(w: u32, h: u32) -> InMemDicomObject {
    InMemDicomObject::from_element_iter([
        DataElement::new(
            tags::SOP_CLASS_UID,
            VR::UI,
            PrimitiveValue::from(uids::SECONDARY_CAPTURE_IMAGE_STORAGE),
        ),
        DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("OT")),
        DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)),
        DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            PrimitiveValue::from("MONOCHROME2"),
        ),
        DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(h as u16)),
        DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(w as u16)),
        DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(8_u16)),
        DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(8_u16)),
        DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(7_u16)),
        DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(0_u16)),
    ])
}

fn save_dicom(obj: InMemDicomObject, path: &Path, instance_uid: &str) {
    obj.with_meta(
        FileMetaTableBuilder::new()
            .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
            .media_storage_sop_class_uid(uids::SECONDARY_CAPTURE_IMAGE_STORAGE)
            .media_storage_sop_instance_uid(instance_uid),
    )
    .unwrap()
    .write_to_file(path)
    .unwrap();
}

/// Row-major stored values written by `write_dicom`.
pub fn dicom_gradient(w: u32, h: u32) -> Vec<u8> {
    (0..h)
        .flat_map(|y| (0..w).map(move |x| gradient_value(x, y)))
        .collect()
}

fn write_dicom_pixels(
    dir: &Path,
    name: &str,
    w: u32,
    h: u32,
    pixels: Vec<u8>,
    uid: Option<&str>,
) -> PathBuf {
    let path = dir.join(name);
    let mut obj = dicom_base(w, h);
    if let Some(uid) = uid {
        obj.put(DataElement::new(
            tags::SOP_INSTANCE_UID,
            VR::UI,
            PrimitiveValue::from(uid),
        ));
    }
    obj.put(DataElement::new(
        tags::PIXEL_DATA,
        VR::OB,
        PrimitiveValue::from(pixels),
    ));
    save_dicom(obj, &path, uid.unwrap_or("2.25.1"));
    path
}

/// 8-bit MONOCHROME2 gradient. `w * h` should be even.
pub fn write_dicom(dir: &Path, name: &str, w: u32, h: u32, uid: Option<&str>) -> PathBuf {
    write_dicom_pixels(dir, name, w, h, dicom_gradient(w, h), uid)
}

/// 8-bit MONOCHROME2 image with every pixel at `value`.
pub fn write_flat_dicom(dir: &Path, name: &str, w: u32, h: u32, value: u8, uid: &str) -> PathBuf {
    let pixels = vec![value; (w * h) as usize];
    write_dicom_pixels(dir, name, w, h, pixels, Some(uid))
}

pub fn write_dicom_without_pixels(dir: &Path, name: &str, uid: &str) -> PathBuf {
    let path = dir.join(name);
    let mut obj = dicom_base(16, 16);
    obj.put(DataElement::new(
        tags::SOP_INSTANCE_UID,
        VR::UI,
        PrimitiveValue::from(uid),
    ));
    save_dicom(obj, &path, uid);
    path
}
