//! Min-max normalization of disparity maps into fixed-width pixel encodings.
//!
//! The 24-bit and 32-bit targets are display formats: the map is scaled to the
//! 8-bit range and replicated into three channels. Precision-preserving
//! multi-byte packing of depth lives in [`crate::codec`] and is a separate
//! operation.

use crate::{DisparityMap, Error, Result};
use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Target pixel encoding of a normalized disparity map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "8-bit")]
    Bits8,
    #[serde(rename = "16-bit")]
    Bits16,
    #[serde(rename = "24-bit")]
    Bits24,
    #[serde(rename = "32-bit")]
    Bits32,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bits8 => "8-bit",
            Self::Bits16 => "16-bit",
            Self::Bits24 => "24-bit",
            Self::Bits32 => "32-bit",
        }
    }

    /// Upper end of the output range actually written.
    pub fn max_value(&self) -> f64 {
        match self {
            Self::Bits16 => u16::MAX as f64,
            Self::Bits8 | Self::Bits24 | Self::Bits32 => u8::MAX as f64,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "8-bit" => Ok(Self::Bits8),
            "16-bit" => Ok(Self::Bits16),
            "24-bit" => Ok(Self::Bits24),
            "32-bit" => Ok(Self::Bits32),
            other => Err(Error::invalid_argument(format!(
                "Invalid range '{other}' for disparity map normalization. \
                 Expected one of: 8-bit, 16-bit, 24-bit, 32-bit"
            ))),
        }
    }
}

/// A quantized map ready to be stored as an ordinary raster image.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedMap {
    Gray8(GrayImage),
    Gray16(Gray16Image),
    Rgb8(RgbImage),
}

impl EncodedMap {
    pub fn width(&self) -> u32 {
        match self {
            Self::Gray8(img) => img.width(),
            Self::Gray16(img) => img.width(),
            Self::Rgb8(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Self::Gray8(img) => img.height(),
            Self::Gray16(img) => img.height(),
            Self::Rgb8(img) => img.height(),
        }
    }

    pub fn channels(&self) -> u8 {
        match self {
            Self::Gray8(_) | Self::Gray16(_) => 1,
            Self::Rgb8(_) => 3,
        }
    }

    pub fn as_gray8(&self) -> Option<&GrayImage> {
        match self {
            Self::Gray8(img) => Some(img),
            _ => None,
        }
    }

    pub fn as_gray16(&self) -> Option<&Gray16Image> {
        match self {
            Self::Gray16(img) => Some(img),
            _ => None,
        }
    }

    pub fn as_rgb8(&self) -> Option<&RgbImage> {
        match self {
            Self::Rgb8(img) => Some(img),
            _ => None,
        }
    }
}

/// Rescale `map` to the full range of `encoding` using its global min and max.
///
/// A constant map normalizes to all zeros.
pub fn normalize_disparity(map: &DisparityMap, encoding: Encoding) -> Result<EncodedMap> {
    let scaled = min_max_scale(&map.data, encoding.max_value())?;
    if scaled.len() != map.width as usize * map.height as usize {
        return Err(Error::computation(format!(
            "Normalization produced {} values for a {}x{} map",
            scaled.len(),
            map.width,
            map.height
        )));
    }

    let encoded = match encoding {
        Encoding::Bits8 => {
            let raw = scaled.iter().map(|&v| v as u8).collect();
            GrayImage::from_raw(map.width, map.height, raw).map(EncodedMap::Gray8)
        }
        Encoding::Bits16 => {
            let raw = scaled.iter().map(|&v| v as u16).collect();
            Gray16Image::from_raw(map.width, map.height, raw).map(EncodedMap::Gray16)
        }
        Encoding::Bits24 | Encoding::Bits32 => {
            let mut rgb = RgbImage::new(map.width, map.height);
            for (pixel, &v) in rgb.pixels_mut().zip(&scaled) {
                let v = v as u8;
                *pixel = Rgb([v, v, v]);
            }
            Some(EncodedMap::Rgb8(rgb))
        }
    };

    let encoded = encoded.ok_or_else(|| Error::computation("Failed to normalize disparity map"))?;
    tracing::debug!(encoding = %encoding, width = map.width, height = map.height, "disparity map normalized");
    Ok(encoded)
}

/// Linear min-max rescale of `data` onto `[0, max_out]`, rounded to integers.
pub(crate) fn min_max_scale(data: &[f32], max_out: f64) -> Result<Vec<f64>> {
    if data.is_empty() {
        return Err(Error::computation("Cannot normalize an empty map"));
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(Error::computation(
            "Cannot normalize a map containing non-finite values",
        ));
    }
    let (min, max) = crate::finite_min_max(data)
        .ok_or_else(|| Error::computation("Failed to find the value range of the map"))?;

    let min = min as f64;
    let range = max as f64 - min;
    if range <= 0.0 {
        return Ok(vec![0.0; data.len()]);
    }

    // Scale before dividing so equal ratios land on the same level for any range.
    Ok(data
        .iter()
        .map(|&v| ((v as f64 - min) * max_out / range).round().clamp(0.0, max_out))
        .collect())
}
