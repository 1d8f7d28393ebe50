//! Depth maps packed into ordinary image channels.
//!
//! The 24-bit layout stores a fixed-point depth as `R + G * 256 + B * 256^2`
//! over `[0, max_depth]`. It is the only layout with a matching encoder.
//! The 8-bit and 16-bit decoders reproduce a layout nobody has validated
//! against real data and are kept as experimental paths.

use crate::normalize::EncodedMap;
use crate::{DepthMap, Error, Result};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default full-scale depth of an encoded map.
pub const DEFAULT_MAX_DEPTH: f64 = 1000.0;

const FULL_SCALE_24: f64 = ((1u32 << 24) - 1) as f64;

/// Bit depth of an encoded depth map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DepthBits {
    /// Experimental.
    #[serde(rename = "8-bit")]
    Bits8,
    /// Experimental.
    #[serde(rename = "16-bit")]
    Bits16,
    #[default]
    #[serde(rename = "24-bit")]
    Bits24,
}

impl DepthBits {
    pub fn bits(&self) -> u32 {
        match self {
            Self::Bits8 => 8,
            Self::Bits16 => 16,
            Self::Bits24 => 24,
        }
    }

    /// Largest representable raw value, `2^bits - 1`.
    pub fn full_scale(&self) -> f64 {
        ((1u64 << self.bits()) - 1) as f64
    }

    pub fn is_experimental(&self) -> bool {
        !matches!(self, Self::Bits24)
    }
}

impl TryFrom<u32> for DepthBits {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(Self::Bits8),
            16 => Ok(Self::Bits16),
            24 => Ok(Self::Bits24),
            other => Err(Error::invalid_argument(format!(
                "Depth maps can be decoded from 8, 16 or 24 bits, got {other}"
            ))),
        }
    }
}

impl FromStr for DepthBits {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "8-bit" => Ok(Self::Bits8),
            "16-bit" => Ok(Self::Bits16),
            "24-bit" => Ok(Self::Bits24),
            other => Err(Error::invalid_argument(format!(
                "Invalid depth map range '{other}'. Expected one of: 8-bit, 16-bit, 24-bit"
            ))),
        }
    }
}

/// Memory order of the three channels of an encoded pixel.
///
/// Images read through the `image` crate are [`ChannelOrder::Rgb`]; buffers
/// coming from BGR-ordered sources are flipped before decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

impl ChannelOrder {
    fn to_rgb(self, p: [u8; 3]) -> [u8; 3] {
        match self {
            Self::Rgb => p,
            Self::Bgr => [p[2], p[1], p[0]],
        }
    }
}

/// Decode a depth map from an RGB-ordered encoded image.
pub fn decode_depth_map(encoded: &EncodedMap, max_depth: f64, bits: DepthBits) -> Result<DepthMap> {
    decode_depth_map_with_order(encoded, ChannelOrder::Rgb, max_depth, bits)
}

/// Decode a depth map whose color channels are stored in `order`.
///
/// Single-channel inputs carry the raw value directly and must match `bits`
/// (`Gray8` with 8 bits, `Gray16` with 16 bits).
pub fn decode_depth_map_with_order(
    encoded: &EncodedMap,
    order: ChannelOrder,
    max_depth: f64,
    bits: DepthBits,
) -> Result<DepthMap> {
    check_max_depth(max_depth)?;
    if encoded.width() == 0 || encoded.height() == 0 {
        return Err(Error::precondition("Encoded depth map must not be empty"));
    }
    if bits.is_experimental() {
        tracing::warn!(
            bits = bits.bits(),
            "decoding depth map with an unverified bit depth; only 24-bit is validated"
        );
    }

    let scale = max_depth / bits.full_scale();
    let (width, height) = (encoded.width(), encoded.height());

    let data: Vec<f32> = match (encoded, bits) {
        (EncodedMap::Rgb8(img), _) => img
            .pixels()
            .map(|p| (packed_value(order.to_rgb(p.0), bits) as f64 * scale) as f32)
            .collect(),
        (EncodedMap::Gray8(img), DepthBits::Bits8) => img
            .as_raw()
            .iter()
            .map(|&v| (v as f64 * scale) as f32)
            .collect(),
        (EncodedMap::Gray16(img), DepthBits::Bits16) => img
            .as_raw()
            .iter()
            .map(|&v| (v as f64 * scale) as f32)
            .collect(),
        (other, bits) => {
            return Err(Error::precondition(format!(
                "A {}-channel image cannot hold a {}-bit depth map",
                other.channels(),
                bits.bits()
            )))
        }
    };

    tracing::debug!(bits = bits.bits(), width, height, "depth map decoded");
    DepthMap::from_vec(width, height, data)
}

/// Raw fixed-point value of one RGB-ordered pixel.
fn packed_value(rgb: [u8; 3], bits: DepthBits) -> u32 {
    let [r, g, b] = rgb;
    match bits {
        DepthBits::Bits24 => r as u32 + ((g as u32) << 8) + ((b as u32) << 16),
        // Experimental: the narrower layouts read the trailing channels of the
        // pixel in reverse, i.e. blue first.
        DepthBits::Bits16 => g as u32 + ((b as u32) << 8),
        DepthBits::Bits8 => b as u32,
    }
}

/// Pack a depth map into the 24-bit RGB layout read by [`decode_depth_map`].
///
/// Depths are clamped to `[0, max_depth]`.
pub fn encode_depth_map(depth: &DepthMap, max_depth: f64) -> Result<EncodedMap> {
    check_max_depth(max_depth)?;
    if depth.data.iter().any(|d| !d.is_finite()) {
        return Err(Error::computation(
            "Cannot encode a depth map containing non-finite values",
        ));
    }

    let mut img = RgbImage::new(depth.width, depth.height);
    for (pixel, &z) in img.pixels_mut().zip(&depth.data) {
        let value = ((z as f64).clamp(0.0, max_depth) / max_depth * FULL_SCALE_24).round() as u32;
        *pixel = Rgb([
            (value & 0xff) as u8,
            ((value >> 8) & 0xff) as u8,
            ((value >> 16) & 0xff) as u8,
        ]);
    }
    Ok(EncodedMap::Rgb8(img))
}

fn check_max_depth(max_depth: f64) -> Result<()> {
    if !(max_depth.is_finite() && max_depth > 0.0) {
        return Err(Error::invalid_argument(format!(
            "Maximum depth must be a positive number, got {max_depth}"
        )));
    }
    Ok(())
}
