//! Stereo disparity and depth estimation
//!
//! This crate provides a brute-force SSD block matcher for rectified stereo
//! pairs together with the numeric pipeline around it: min-max normalization
//! of disparity maps into fixed-width encodings, disparity/depth conversion
//! via the pinhole stereo relation, and decoding of depth maps packed into
//! color channels.

use image::GrayImage;
use serde::{Deserialize, Serialize};

pub mod block_matching;
pub mod codec;
pub mod config;
pub mod depth;
pub mod error;
pub mod io;
pub mod metrics;
pub mod normalize;
pub mod parallel;
pub mod perf;
pub mod tools;

pub use block_matching::*;
pub use codec::*;
pub use config::*;
pub use depth::*;
pub use error::{Error, ErrorKind, Result};
pub use io::*;
pub use metrics::*;
pub use normalize::*;
pub use parallel::*;
pub use perf::*;
pub use tools::*;

/// Stereo matching algorithm trait
pub trait StereoMatcher {
    fn compute(&self, left: &GrayImage, right: &GrayImage) -> Result<DisparityMap>;
}

/// Stereo matching algorithm trait running on an explicit worker pool
pub trait StereoMatcherCtx {
    fn compute_ctx(
        &self,
        left: &GrayImage,
        right: &GrayImage,
        pool: &rayon::ThreadPool,
    ) -> Result<DisparityMap>;
}

/// Read-only access to a dense single-channel float map.
pub trait ScalarMap {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn values(&self) -> &[f32];

    fn value_at(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let idx = y as usize * self.width() as usize + x as usize;
        self.values().get(idx).copied()
    }

    fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0 || self.values().is_empty()
    }
}

/// Disparity map representation
///
/// One `f32` per pixel of the reference image, row-major. Pixels the matcher
/// could not evaluate hold `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct DisparityMap {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
    pub max_disparity: u32,
}

impl DisparityMap {
    pub fn new(width: u32, height: u32, max_disparity: u32) -> Self {
        let size = width as usize * height as usize;
        Self {
            data: vec![0.0; size],
            width,
            height,
            max_disparity,
        }
    }

    /// Wrap existing row-major values. The search bound is taken as the
    /// ceiling of the largest finite value.
    pub fn from_vec(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        check_len(width, height, data.len())?;
        let max = data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0f32, f32::max);
        Ok(Self {
            data,
            width,
            height,
            max_disparity: max.ceil() as u32,
        })
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        let idx = y as usize * self.width as usize + x as usize;
        self.data.get(idx).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        let idx = y as usize * self.width as usize + x as usize;
        if let Some(cell) = self.data.get_mut(idx) {
            *cell = value;
        }
    }

    /// Global minimum and maximum over finite values.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        finite_min_max(&self.data)
    }
}

impl ScalarMap for DisparityMap {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn values(&self) -> &[f32] {
        &self.data
    }
}

/// Metric depth per pixel, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl DepthMap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0.0; width as usize * height as usize],
            width,
            height,
        }
    }

    pub fn from_vec(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        check_len(width, height, data.len())?;
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        let idx = y as usize * self.width as usize + x as usize;
        self.data.get(idx).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        let idx = y as usize * self.width as usize + x as usize;
        if let Some(cell) = self.data.get_mut(idx) {
            *cell = value;
        }
    }
}

impl ScalarMap for DepthMap {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn values(&self) -> &[f32] {
        &self.data
    }
}

/// Stereo camera parameters
///
/// `baseline` and `focal_length` must share a linear unit (the depth unit is
/// that unit divided by the conversion aspect). `doffs` is the principal-point
/// disparity offset between the two cameras.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StereoParams {
    pub baseline: f64,
    pub focal_length: f64,
    #[serde(default)]
    pub doffs: f64,
}

impl StereoParams {
    pub fn new(baseline: f64, focal_length: f64) -> Self {
        Self {
            baseline,
            focal_length,
            doffs: 0.0,
        }
    }

    pub fn with_doffs(mut self, doffs: f64) -> Self {
        self.doffs = doffs;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.baseline.is_finite() && self.baseline > 0.0) {
            return Err(Error::invalid_argument(format!(
                "Baseline must be a positive number, got {}",
                self.baseline
            )));
        }
        if !(self.focal_length.is_finite() && self.focal_length > 0.0) {
            return Err(Error::invalid_argument(format!(
                "Focal length must be a positive number, got {}",
                self.focal_length
            )));
        }
        if !(self.doffs.is_finite() && self.doffs >= 0.0) {
            return Err(Error::invalid_argument(format!(
                "Disparity offset must be a non-negative number, got {}",
                self.doffs
            )));
        }
        Ok(())
    }

    /// Compute depth from disparity
    pub fn disparity_to_depth(&self, disparity: f64) -> Option<f64> {
        if disparity <= 0.0 {
            None
        } else {
            Some((self.focal_length * self.baseline) / (disparity + self.doffs))
        }
    }

    /// Compute disparity from a (strictly positive) depth
    pub fn depth_to_disparity(&self, depth: f64) -> f64 {
        (self.focal_length * self.baseline) / depth - self.doffs
    }
}

/// Compute disparity validity mask
///
/// A pixel is valid when it received a positive match within the search bound.
pub fn compute_validity_mask(disparity: &DisparityMap) -> Vec<bool> {
    disparity
        .data
        .iter()
        .map(|&d| d > 0.0 && d <= disparity.max_disparity as f32)
        .collect()
}

pub(crate) fn finite_min_max(data: &[f32]) -> Option<(f32, f32)> {
    data.iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn check_len(width: u32, height: u32, len: usize) -> Result<()> {
    let expected = width as usize * height as usize;
    if len != expected {
        return Err(Error::precondition(format!(
            "Map of {width}x{height} needs {expected} values, got {len}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disparity_map() {
        let mut disp = DisparityMap::new(10, 10, 64);

        disp.set(5, 5, 32.0);
        assert_eq!(disp.get(5, 5), 32.0);
        assert_eq!(disp.value_at(5, 5), Some(32.0));
        assert_eq!(disp.value_at(10, 5), None);
        assert_eq!(disp.min_max(), Some((0.0, 32.0)));
    }

    #[test]
    fn test_large_map_indexing_does_not_overflow() {
        // y * width exceeds u32::MAX; the backing buffer is left empty.
        let mut disp = DisparityMap {
            data: Vec::new(),
            width: 70_000,
            height: 70_000,
            max_disparity: 0,
        };
        disp.set(5, 69_999, 1.0);
        assert_eq!(disp.get(5, 69_999), 0.0);

        let mut depth = DepthMap {
            data: Vec::new(),
            width: 70_000,
            height: 70_000,
        };
        depth.set(69_999, 69_999, 1.0);
        assert_eq!(depth.get(69_999, 69_999), 0.0);
        assert_eq!(depth.value_at(69_999, 69_999), None);
    }

    #[test]
    fn test_from_vec_checks_length() {
        let err = DisparityMap::from_vec(3, 3, vec![0.0; 8]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);

        let map = DisparityMap::from_vec(2, 2, vec![0.0, 1.5, 3.2, 2.0]).unwrap();
        assert_eq!(map.max_disparity, 4);
    }

    #[test]
    fn test_stereo_params() {
        let params = StereoParams::new(0.1, 500.0);

        // depth = (f * B) / disparity
        let expected_depth = (500.0 * 0.1) / 50.0;
        assert_eq!(params.disparity_to_depth(50.0), Some(expected_depth));
        assert_eq!(params.disparity_to_depth(0.0), None);
        assert!((params.depth_to_disparity(expected_depth) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_stereo_params_from_json() {
        let params =
            StereoParams::from_json(r#"{"baseline": 193.001, "focalLength": 3979.911, "doffs": 124.343}"#)
                .unwrap();
        assert_eq!(params.baseline, 193.001);
        assert_eq!(params.focal_length, 3979.911);
        assert_eq!(params.doffs, 124.343);

        let no_offset = StereoParams::from_json(r#"{"baseline": 0.1, "focalLength": 700.0}"#).unwrap();
        assert_eq!(no_offset.doffs, 0.0);

        let err = StereoParams::from_json(r#"{"baseline": -1.0, "focalLength": 700.0}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_validity_mask() {
        let map = DisparityMap {
            data: vec![0.0, 3.0, 8.0, 9.0],
            width: 2,
            height: 2,
            max_disparity: 8,
        };
        assert_eq!(compute_validity_mask(&map), vec![false, true, true, false]);
    }
}
