//! Image file decoding and encoding via the `image` crate.

use std::path::Path;

use panostitch_core::{RgbImage, SourceImage};
use rayon::prelude::*;

use crate::StitchError;

fn invalid_data(msg: String) -> StitchError {
    StitchError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, msg))
}

/// Convert a decoded `image` buffer into the workspace RGB type.
pub fn rgb_from_image(img: &::image::RgbImage) -> Option<RgbImage> {
    RgbImage::from_raw(img.width() as usize, img.height() as usize, img.as_raw().clone())
}

pub fn rgb_to_image(img: &RgbImage) -> Option<::image::RgbImage> {
    ::image::RgbImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
}

/// Decode one file; the image is named after the file name.
pub fn load_image(path: impl AsRef<Path>, index: usize) -> Result<SourceImage, StitchError> {
    let path = path.as_ref();
    let decoded = ::image::open(path)?.to_rgb8();
    let pixels = rgb_from_image(&decoded)
        .ok_or_else(|| invalid_data(format!("{} has an inconsistent buffer", path.display())))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceImage::new(index, name, pixels))
}

/// Decode `paths` in parallel, indexed by position.
pub fn load_images<P: AsRef<Path> + Sync>(paths: &[P]) -> Result<Vec<SourceImage>, StitchError> {
    paths
        .par_iter()
        .enumerate()
        .map(|(i, p)| load_image(p, i))
        .collect()
}

/// Write the canvas; the format follows the file extension (PNG if none).
pub fn save_image(img: &RgbImage, path: impl AsRef<Path>) -> Result<(), StitchError> {
    let path = path.as_ref();
    let buf = rgb_to_image(img).ok_or_else(|| invalid_data("canvas buffer size mismatch".into()))?;
    match ::image::ImageFormat::from_path(path) {
        Ok(format) => buf.save_with_format(path, format)?,
        Err(_) => buf.save_with_format(path, ::image::ImageFormat::Png)?,
    }
    Ok(())
}
