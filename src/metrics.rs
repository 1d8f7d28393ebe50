//! Comparing computed disparity maps against ground truth.

use crate::normalize::min_max_scale;
use crate::{Error, Result};
use image::GrayImage;

/// SSIM window side.
const SSIM_WINDOW: usize = 7;
const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;
const SSIM_DATA_RANGE: f64 = 255.0;

fn check_same_shape(a: &GrayImage, b: &GrayImage) -> Result<()> {
    if a.width() == 0 || a.height() == 0 {
        return Err(Error::precondition("Maps must not be empty"));
    }
    if a.dimensions() != b.dimensions() {
        return Err(Error::precondition(format!(
            "Maps must have the same dimensions ({:?} vs {:?})",
            a.dimensions(),
            b.dimensions()
        )));
    }
    Ok(())
}

/// Mean squared error between two 8-bit maps.
pub fn mean_squared_error(a: &GrayImage, b: &GrayImage) -> Result<f64> {
    check_same_shape(a, b)?;
    let sum: f64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&p, &q)| {
            let d = p as f64 - q as f64;
            d * d
        })
        .sum();
    Ok(sum / a.as_raw().len() as f64)
}

/// Mean structural similarity between two 8-bit maps.
///
/// Uses a 7x7 uniform window with sample covariance and averages over the
/// pixels whose window lies fully inside the image.
pub fn structural_similarity(a: &GrayImage, b: &GrayImage) -> Result<f64> {
    check_same_shape(a, b)?;
    let (width, height) = (a.width() as usize, a.height() as usize);
    if width < SSIM_WINDOW || height < SSIM_WINDOW {
        return Err(Error::precondition(format!(
            "Structural similarity needs maps of at least {SSIM_WINDOW}x{SSIM_WINDOW}, got {width}x{height}"
        )));
    }

    let (a, b) = (a.as_raw(), b.as_raw());
    let half = SSIM_WINDOW / 2;
    let np = (SSIM_WINDOW * SSIM_WINDOW) as f64;
    let cov_norm = np / (np - 1.0);
    let c1 = (SSIM_K1 * SSIM_DATA_RANGE).powi(2);
    let c2 = (SSIM_K2 * SSIM_DATA_RANGE).powi(2);

    let mut total = 0.0;
    let mut count = 0usize;
    for y in half..height - half {
        for x in half..width - half {
            let (mut sa, mut sb, mut saa, mut sbb, mut sab) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for wy in y - half..=y + half {
                let row = wy * width;
                for wx in x - half..=x + half {
                    let p = a[row + wx] as f64;
                    let q = b[row + wx] as f64;
                    sa += p;
                    sb += q;
                    saa += p * p;
                    sbb += q * q;
                    sab += p * q;
                }
            }
            let (ux, uy) = (sa / np, sb / np);
            let vx = cov_norm * (saa / np - ux * ux);
            let vy = cov_norm * (sbb / np - uy * uy);
            let vxy = cov_norm * (sab / np - ux * uy);

            let numerator = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
            let denominator = (ux * ux + uy * uy + c1) * (vx + vy + c2);
            total += numerator / denominator;
            count += 1;
        }
    }

    Ok(total / count as f64)
}

/// Absolute difference to ground truth, min-max normalized to 8 bits.
pub fn color_difference_map(disparity: &GrayImage, ground_truth: &GrayImage) -> Result<GrayImage> {
    check_same_shape(disparity, ground_truth)?;
    let diff: Vec<f32> = disparity
        .as_raw()
        .iter()
        .zip(ground_truth.as_raw())
        .map(|(&p, &q)| p.abs_diff(q) as f32)
        .collect();

    let raw = min_max_scale(&diff, u8::MAX as f64)?
        .into_iter()
        .map(|v| v as u8)
        .collect();
    GrayImage::from_raw(disparity.width(), disparity.height(), raw)
        .ok_or_else(|| Error::computation("Failed to build color difference map"))
}
