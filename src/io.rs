//! Loading rectified stereo pairs and saving encoded maps.

use crate::normalize::EncodedMap;
use crate::{Error, Result};
use image::GrayImage;
use std::path::Path;

/// Load a rectified stereo pair as 8-bit grayscale.
pub fn load_stereo_pair(
    left: impl AsRef<Path>,
    right: impl AsRef<Path>,
) -> Result<(GrayImage, GrayImage)> {
    let (left, right) = (left.as_ref(), right.as_ref());
    if left == right {
        return Err(Error::invalid_argument(format!(
            "Left and right images must be different, got '{}' twice",
            left.display()
        )));
    }

    tracing::debug!(left = %left.display(), right = %right.display(), "loading stereo pair");
    let left_img = image::open(left)?.into_luma8();
    let right_img = image::open(right)?.into_luma8();

    if left_img.dimensions() != right_img.dimensions() {
        return Err(Error::precondition(format!(
            "Left and right images must have the same dimensions ({:?} vs {:?})",
            left_img.dimensions(),
            right_img.dimensions()
        )));
    }
    Ok((left_img, right_img))
}

/// Write `map` as a raster image, creating the parent directory if needed.
///
/// The format follows the file extension; 16-bit maps need a format that
/// stores 16-bit samples (PNG, PGM).
pub fn save_encoded_map(map: &EncodedMap, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    match map {
        EncodedMap::Gray8(img) => img.save(path)?,
        EncodedMap::Gray16(img) => img.save(path)?,
        EncodedMap::Rgb8(img) => img.save(path)?,
    }
    tracing::info!(path = %path.display(), "encoded map saved");
    Ok(())
}
