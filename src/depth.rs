//! Depth estimation from disparity maps
//!
//! Convert between disparity and metric depth with the pinhole stereo relation
//! `depth = baseline * focal_length / disparity`.

use crate::normalize::{normalize_disparity, Encoding, EncodedMap};
use crate::{DepthMap, DisparityMap, Error, Result, StereoParams};

/// Aspect that leaves the `baseline * focal_length` unit untouched.
pub const DEFAULT_ASPECT: f64 = 1.0;

/// Aspect converting millimeter-scale products into meters.
pub const MILLIMETERS_TO_METERS: f64 = 1000.0;

/// Depth floor used by the inverse conversion unless the caller picks one.
pub const DEFAULT_MIN_DEPTH: f64 = 0.001;

/// Compute depth map from disparity map
///
/// Pixels with positive disparity get `baseline * focal / (disparity + doffs)`,
/// all others get 0. The result is divided by `aspect`.
pub fn disparity_to_depth(
    disparity: &DisparityMap,
    params: &StereoParams,
    aspect: f64,
) -> Result<DepthMap> {
    params.validate()?;
    if !(aspect.is_finite() && aspect > 0.0) {
        return Err(Error::invalid_argument(format!(
            "Aspect must be a positive number, got {aspect}"
        )));
    }

    let data = disparity
        .data
        .iter()
        .map(|&d| {
            params
                .disparity_to_depth(d as f64)
                .map_or(0.0, |depth| (depth / aspect) as f32)
        })
        .collect();

    DepthMap::from_vec(disparity.width, disparity.height, data)
}

/// Convert a depth map back to raw (unnormalized) disparity.
///
/// Depths below `min_depth` are raised to it before dividing.
pub fn depth_to_raw_disparity(
    depth: &DepthMap,
    params: &StereoParams,
    min_depth: f64,
) -> Result<DisparityMap> {
    params.validate()?;
    if !(min_depth.is_finite() && min_depth >= 0.0) {
        return Err(Error::invalid_argument(format!(
            "Minimum depth must be a non-negative number, got {min_depth}"
        )));
    }

    let mut data = Vec::with_capacity(depth.data.len());
    for &z in &depth.data {
        let clamped = (z as f64).max(min_depth);
        let disparity = params.depth_to_disparity(clamped);
        if !disparity.is_finite() {
            return Err(Error::computation(format!(
                "Depth {z} produced a non-finite disparity; use a positive minimum depth"
            )));
        }
        data.push(disparity as f32);
    }

    DisparityMap::from_vec(depth.width, depth.height, data)
}

/// Convert a depth map to a normalized disparity map.
pub fn depth_to_disparity(
    depth: &DepthMap,
    params: &StereoParams,
    min_depth: f64,
    encoding: Encoding,
) -> Result<EncodedMap> {
    let disparity = depth_to_raw_disparity(depth, params, min_depth)?;
    let encoded = normalize_disparity(&disparity, encoding)?;
    tracing::debug!(%encoding, "depth map converted to disparity map");
    Ok(encoded)
}

/// Summary of the strictly positive depths of a map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub valid: usize,
}

/// Compute depth statistics
pub fn compute_depth_stats(depth: &DepthMap) -> Option<DepthStats> {
    let valid_depths: Vec<f64> = depth
        .data
        .iter()
        .filter(|d| d.is_finite() && **d > 0.0)
        .map(|&d| d as f64)
        .collect();

    if valid_depths.is_empty() {
        return None;
    }

    let min = valid_depths.iter().copied().fold(f64::INFINITY, f64::min);
    let max = valid_depths
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let mean = valid_depths.iter().sum::<f64>() / valid_depths.len() as f64;

    Some(DepthStats {
        min,
        max,
        mean,
        valid: valid_depths.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disparity_to_depth() {
        let params = StereoParams::new(0.1, 500.0);

        let mut disparity = DisparityMap::new(10, 10, 64);
        disparity.set(5, 5, 50.0);

        let depth = disparity_to_depth(&disparity, &params, DEFAULT_ASPECT).unwrap();

        // (500 * 0.1) / 50 = 1.0; zero disparity stays at zero depth
        assert!((depth.get(5, 5) - 1.0).abs() < 1e-6);
        assert_eq!(depth.get(0, 0), 0.0);
        assert_eq!(depth.data.len(), 100);
    }

    #[test]
    fn test_disparity_to_depth_with_offset() {
        let params = StereoParams::new(100.0, 1000.0).with_doffs(10.0);
        let disparity = DisparityMap::from_vec(2, 1, vec![90.0, 0.0]).unwrap();

        let depth = disparity_to_depth(&disparity, &params, MILLIMETERS_TO_METERS).unwrap();
        assert!((depth.data[0] - 1.0).abs() < 1e-6);
        assert_eq!(depth.data[1], 0.0);
    }

    #[test]
    fn test_negative_disparity_maps_to_zero() {
        let params = StereoParams::new(0.1, 700.0);
        let disparity = DisparityMap::from_vec(2, 1, vec![-3.0, 7.0]).unwrap();
        let depth = disparity_to_depth(&disparity, &params, 1.0).unwrap();
        assert_eq!(depth.data[0], 0.0);
        assert!((depth.data[1] - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_invalid_aspect() {
        let params = StereoParams::new(0.1, 700.0);
        let disparity = DisparityMap::new(2, 2, 8);
        for aspect in [0.0, -1.0, f64::NAN] {
            let err = disparity_to_depth(&disparity, &params, aspect).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)));
        }
    }

    #[test]
    fn test_depth_to_raw_disparity_clamps() {
        let params = StereoParams::new(0.5, 2.0);
        let depth = DepthMap::from_vec(3, 1, vec![0.0, 0.25, 4.0]).unwrap();

        let disparity = depth_to_raw_disparity(&depth, &params, 0.5).unwrap();
        assert_eq!(disparity.data, vec![2.0, 2.0, 0.25]);
    }

    #[test]
    fn test_zero_min_depth_with_zero_depth_fails() {
        let params = StereoParams::new(0.5, 2.0);
        let depth = DepthMap::from_vec(2, 1, vec![0.0, 1.0]).unwrap();

        let err = depth_to_raw_disparity(&depth, &params, 0.0).unwrap_err();
        assert!(matches!(err, Error::Computation(_)));
    }

    #[test]
    fn test_negative_min_depth() {
        let params = StereoParams::new(0.5, 2.0);
        let depth = DepthMap::new(2, 2);
        let err = depth_to_disparity(&depth, &params, -0.1, Encoding::Bits8).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_depth_stats() {
        let depth = DepthMap::from_vec(2, 2, vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let stats = compute_depth_stats(&depth).unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.mean, 2.0);
        assert_eq!(stats.valid, 3);

        assert_eq!(compute_depth_stats(&DepthMap::new(3, 3)), None);
    }
}
