use crate::{DisparityMap, Error, Result, StereoMatcher, StereoMatcherCtx};
use image::GrayImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use wide::f32x8;

/// Largest accepted window side. Keeps every per-row SSD partial sum exactly
/// representable in the `f32` lanes.
pub const MAX_WINDOW_SIDE: usize = 255;

/// Smallest block accepted by the padded search.
pub const MIN_SYMMETRIC_BLOCK: usize = 5;

/// Which SSD search convention to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisparityMethod {
    /// Template taken from the right image, searched rightwards in the left
    /// image. Pixels within half a window of any edge stay at zero.
    #[default]
    #[serde(rename = "custom")]
    LeftToRight,
    /// Square block from the zero-padded left image, searched leftwards in the
    /// zero-padded right image. Every pixel is evaluated.
    #[serde(rename = "custom2")]
    SymmetricBlock,
}

impl DisparityMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeftToRight => "custom",
            Self::SymmetricBlock => "custom2",
        }
    }
}

impl FromStr for DisparityMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "custom" => Ok(Self::LeftToRight),
            "custom2" => Ok(Self::SymmetricBlock),
            other => Err(Error::invalid_argument(format!(
                "Invalid disparity calculation method '{other}'. Supported methods: custom, custom2"
            ))),
        }
    }
}

/// Matching window as `(height, width)`.
///
/// The effective window always spans `2 * (side / 2) + 1` pixels, so even
/// sides behave like the next odd size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub height: usize,
    pub width: usize,
}

impl Window {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    fn half(&self) -> (usize, usize) {
        (self.height / 2, self.width / 2)
    }
}

impl From<(usize, usize)> for Window {
    fn from((height, width): (usize, usize)) -> Self {
        Self::new(height, width)
    }
}

/// Brute-force sum-of-squared-differences block matcher
#[derive(Debug, Clone)]
pub struct SsdMatcher {
    pub method: DisparityMethod,
    pub max_disparity: usize,
    pub window: Window,
    pub block_size: usize,
}

impl Default for SsdMatcher {
    fn default() -> Self {
        Self {
            method: DisparityMethod::LeftToRight,
            max_disparity: 64,
            window: Window::new(11, 11),
            block_size: 9,
        }
    }
}

impl StereoMatcher for SsdMatcher {
    fn compute(&self, left: &GrayImage, right: &GrayImage) -> Result<DisparityMap> {
        self.validate()?;
        check_pair(left, right)?;

        tracing::debug!(
            method = self.method.as_str(),
            width = left.width(),
            height = left.height(),
            max_disparity = self.max_disparity,
            "computing disparity map"
        );

        let disparity = match self.method {
            DisparityMethod::LeftToRight => self.compute_left_to_right(left, right),
            DisparityMethod::SymmetricBlock => self.compute_symmetric_block(left, right),
        };

        tracing::debug!(method = self.method.as_str(), "disparity map computed");
        Ok(disparity)
    }
}

impl StereoMatcherCtx for SsdMatcher {
    fn compute_ctx(
        &self,
        left: &GrayImage,
        right: &GrayImage,
        pool: &rayon::ThreadPool,
    ) -> Result<DisparityMap> {
        pool.install(|| self.compute(left, right))
    }
}

impl SsdMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: DisparityMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_max_disparity(mut self, max_disparity: usize) -> Self {
        self.max_disparity = max_disparity;
        self
    }

    pub fn with_window(mut self, height: usize, width: usize) -> Self {
        self.window = Window::new(height, width);
        self
    }

    pub fn with_block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_disparity == 0 {
            return Err(Error::invalid_argument(
                "Maximum disparity must be greater than zero",
            ));
        }
        match self.method {
            DisparityMethod::LeftToRight => {
                let Window { height, width } = self.window;
                if height == 0 || width == 0 {
                    return Err(Error::invalid_argument(format!(
                        "Window dimensions must be positive, got ({height}, {width})"
                    )));
                }
                if height > MAX_WINDOW_SIDE || width > MAX_WINDOW_SIDE {
                    return Err(Error::invalid_argument(format!(
                        "Window dimensions must not exceed {MAX_WINDOW_SIDE}, got ({height}, {width})"
                    )));
                }
            }
            DisparityMethod::SymmetricBlock => {
                let size = self.block_size;
                if size % 2 == 0 || size < MIN_SYMMETRIC_BLOCK || size > MAX_WINDOW_SIDE {
                    return Err(Error::invalid_argument(format!(
                        "Block size must be an odd number between {MIN_SYMMETRIC_BLOCK} and \
                         {MAX_WINDOW_SIDE}, got {size}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn compute_left_to_right(&self, left: &GrayImage, right: &GrayImage) -> DisparityMap {
        let width = left.width() as usize;
        let height = left.height() as usize;
        let (half_h, half_w) = self.window.half();
        let rows = 2 * half_h + 1;
        let cols = 2 * half_w + 1;

        let left_data = left.as_raw();
        let right_data = right.as_raw();

        let mut disparity =
            DisparityMap::new(left.width(), left.height(), self.max_disparity as u32);

        // Rows are independent; each writes only its own output row.
        disparity
            .data
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                if y < half_h || y + half_h >= height {
                    return;
                }
                let top = y - half_h;
                for x in half_w..width.saturating_sub(half_w) {
                    let search = self.max_disparity.min(width - x - half_w);
                    let template_x = x - half_w;

                    let mut best = 0usize;
                    let mut best_cost = u64::MAX;
                    for offset in 0..search {
                        let cost = block_ssd(
                            right_data,
                            template_x,
                            left_data,
                            template_x + offset,
                            width,
                            top,
                            rows,
                            cols,
                        );
                        if cost < best_cost {
                            best_cost = cost;
                            best = offset;
                        }
                    }
                    row[x] = best as f32;
                }
            });

        disparity
    }

    fn compute_symmetric_block(&self, left: &GrayImage, right: &GrayImage) -> DisparityMap {
        let width = left.width() as usize;
        let half = self.block_size / 2;
        let block = 2 * half + 1;

        let (left_padded, padded_width) = pad_constant(left, half);
        let (right_padded, _) = pad_constant(right, half);

        let mut disparity =
            DisparityMap::new(left.width(), left.height(), self.max_disparity as u32);

        disparity
            .data
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                // In padded coordinates the block around output (y, x) starts at (y, x).
                for (x, cell) in row.iter_mut().enumerate() {
                    let search = self.max_disparity.min(x + 1);

                    let mut best = 0usize;
                    let mut best_cost = u64::MAX;
                    for d in 0..search {
                        let cost = block_ssd(
                            &left_padded,
                            x,
                            &right_padded,
                            x - d,
                            padded_width,
                            y,
                            block,
                            block,
                        );
                        if cost < best_cost {
                            best_cost = cost;
                            best = d;
                        }
                    }
                    *cell = best as f32;
                }
            });

        disparity
    }
}

/// Compute a disparity map with the given SSD method.
///
/// `window` is used by [`DisparityMethod::LeftToRight`], `block_size` by
/// [`DisparityMethod::SymmetricBlock`].
pub fn compute_disparity(
    left: &GrayImage,
    right: &GrayImage,
    max_disparity: usize,
    window: impl Into<Window>,
    block_size: usize,
    method: DisparityMethod,
) -> Result<DisparityMap> {
    let window = window.into();
    SsdMatcher::new()
        .with_method(method)
        .with_max_disparity(max_disparity)
        .with_window(window.height, window.width)
        .with_block_size(block_size)
        .compute(left, right)
}

fn check_pair(left: &GrayImage, right: &GrayImage) -> Result<()> {
    if left.width() == 0 || left.height() == 0 {
        return Err(Error::precondition("Input images must not be empty"));
    }
    if left.width() != right.width() || left.height() != right.height() {
        return Err(Error::precondition(format!(
            "Left and right images must have the same dimensions ({}x{} vs {}x{})",
            left.width(),
            left.height(),
            right.width(),
            right.height()
        )));
    }
    Ok(())
}

/// Copy `img` into a buffer with a `border`-pixel zero frame on every side.
fn pad_constant(img: &GrayImage, border: usize) -> (Vec<u8>, usize) {
    let width = img.width() as usize;
    let height = img.height() as usize;
    let padded_width = width + 2 * border;
    let mut padded = vec![0u8; padded_width * (height + 2 * border)];

    for (y, src) in img.as_raw().chunks_exact(width).enumerate() {
        let start = (y + border) * padded_width + border;
        padded[start..start + width].copy_from_slice(src);
    }

    (padded, padded_width)
}

/// SSD between the `rows x cols` block of `a` at column `ax` and the block of
/// `b` at column `bx`, both starting at row `top`.
#[allow(clippy::too_many_arguments)]
fn block_ssd(
    a: &[u8],
    ax: usize,
    b: &[u8],
    bx: usize,
    stride: usize,
    top: usize,
    rows: usize,
    cols: usize,
) -> u64 {
    let mut total = 0u64;
    for y in top..top + rows {
        let offset = y * stride;
        total += row_ssd(
            &a[offset + ax..offset + ax + cols],
            &b[offset + bx..offset + bx + cols],
        );
    }
    total
}

fn row_ssd(a: &[u8], b: &[u8]) -> u64 {
    let mut acc = f32x8::ZERO;
    let mut a_chunks = a.chunks_exact(8);
    let mut b_chunks = b.chunks_exact(8);

    for (pa, pb) in (&mut a_chunks).zip(&mut b_chunks) {
        let a_vals = f32x8::from([
            pa[0] as f32,
            pa[1] as f32,
            pa[2] as f32,
            pa[3] as f32,
            pa[4] as f32,
            pa[5] as f32,
            pa[6] as f32,
            pa[7] as f32,
        ]);
        let b_vals = f32x8::from([
            pb[0] as f32,
            pb[1] as f32,
            pb[2] as f32,
            pb[3] as f32,
            pb[4] as f32,
            pb[5] as f32,
            pb[6] as f32,
            pb[7] as f32,
        ]);
        let diff = a_vals - b_vals;
        acc += diff * diff;
    }

    // Integer-valued lanes stay exact for rows up to MAX_WINDOW_SIDE wide.
    let mut total = acc.reduce_add() as u64;

    // Remainder
    for (&pa, &pb) in a_chunks.remainder().iter().zip(b_chunks.remainder()) {
        let diff = pa as i32 - pb as i32;
        total += (diff * diff) as u64;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn textured(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let v = (x * 73 + y * 151 + x * x * 7 + (x ^ y) * 29) % 251;
            Luma([v as u8])
        })
    }

    #[test]
    fn test_row_ssd_matches_scalar() {
        let a: Vec<u8> = (0..19).map(|i| (i * 37 % 256) as u8).collect();
        let b: Vec<u8> = (0..19).map(|i| (255 - i * 11 % 256) as u8).collect();

        let expected: u64 = a
            .iter()
            .zip(&b)
            .map(|(&p, &q)| {
                let d = p as i64 - q as i64;
                (d * d) as u64
            })
            .sum();
        assert_eq!(row_ssd(&a, &b), expected);
    }

    #[test]
    fn test_row_ssd_max_width_is_exact() {
        let a = vec![255u8; MAX_WINDOW_SIDE];
        let b = vec![0u8; MAX_WINDOW_SIDE];
        assert_eq!(row_ssd(&a, &b), 255 * 255 * MAX_WINDOW_SIDE as u64);
    }

    #[test]
    fn test_pad_constant() {
        let img = GrayImage::from_pixel(2, 2, Luma([9]));
        let (padded, w) = pad_constant(&img, 1);
        assert_eq!(w, 4);
        assert_eq!(
            padded,
            vec![0, 0, 0, 0, 0, 9, 9, 0, 0, 9, 9, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_left_to_right_border_is_zero() {
        let left = textured(16, 12);
        let right = GrayImage::from_fn(16, 12, |x, y| *left.get_pixel((x + 2).min(15), y));
        let disparity = SsdMatcher::new()
            .with_window(5, 3)
            .with_max_disparity(4)
            .compute(&left, &right)
            .unwrap();

        assert_eq!(disparity.get(6, 6), 2.0);

        for y in 0..12 {
            for x in 0..16 {
                if y < 2 || y >= 10 || x < 1 || x >= 15 {
                    assert_eq!(disparity.get(x, y), 0.0, "border pixel ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn test_first_minimum_wins() {
        // Every offset gives the same cost on a constant pair.
        let img = GrayImage::from_pixel(12, 12, Luma([77]));
        for method in [DisparityMethod::LeftToRight, DisparityMethod::SymmetricBlock] {
            let disparity = SsdMatcher::new()
                .with_method(method)
                .with_window(3, 3)
                .with_block_size(5)
                .with_max_disparity(6)
                .compute(&img, &img)
                .unwrap();
            assert!(disparity.data.iter().all(|&d| d == 0.0));
        }
    }

    #[test]
    fn test_window_larger_than_image_leaves_zeros() {
        let img = textured(6, 6);
        let disparity = SsdMatcher::new()
            .with_window(9, 9)
            .with_max_disparity(3)
            .compute(&img, &img)
            .unwrap();
        assert_eq!(disparity.data.len(), 36);
        assert!(disparity.data.iter().all(|&d| d == 0.0));
    }

    #[test]
    fn test_symmetric_block_search_limited_by_column() {
        // Right image is the left shifted left by 3: the true match needs
        // d = 3, which is not searchable for x < 3.
        let left = textured(20, 10);
        let right = GrayImage::from_fn(20, 10, |x, y| *left.get_pixel((x + 3).min(19), y));
        let disparity = SsdMatcher::new()
            .with_method(DisparityMethod::SymmetricBlock)
            .with_block_size(5)
            .with_max_disparity(8)
            .compute(&left, &right)
            .unwrap();

        for y in 0..10 {
            for x in 0..3 {
                assert!(disparity.get(x, y) <= x as f32);
            }
        }
        // Both blocks inside the image, no clamped source columns.
        for y in 2..8 {
            for x in 5..18 {
                assert_eq!(disparity.get(x, y), 3.0, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let left = GrayImage::new(10, 10);
        let right = GrayImage::new(12, 10);
        let err = SsdMatcher::new().compute(&left, &right).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[test]
    fn test_empty_input() {
        let empty = GrayImage::new(0, 0);
        let err = SsdMatcher::new().compute(&empty, &empty).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[test]
    fn test_invalid_parameters() {
        let img = textured(8, 8);

        let err = SsdMatcher::new()
            .with_max_disparity(0)
            .compute(&img, &img)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let err = SsdMatcher::new()
            .with_window(0, 5)
            .compute(&img, &img)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        for size in [4, 3, 257] {
            let err = SsdMatcher::new()
                .with_method(DisparityMethod::SymmetricBlock)
                .with_block_size(size)
                .compute(&img, &img)
                .unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "block size {size}");
        }
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("custom".parse::<DisparityMethod>().unwrap(), DisparityMethod::LeftToRight);
        assert_eq!(
            "custom2".parse::<DisparityMethod>().unwrap(),
            DisparityMethod::SymmetricBlock
        );
        assert!(matches!(
            "sgbm".parse::<DisparityMethod>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_compute_ctx_matches_global_pool() {
        let left = textured(24, 16);
        let right = GrayImage::from_fn(24, 16, |x, y| *left.get_pixel((x + 2).min(23), y));
        let matcher = SsdMatcher::new().with_window(5, 5).with_max_disparity(6);

        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let a = matcher.compute(&left, &right).unwrap();
        let b = matcher.compute_ctx(&left, &right, &pool).unwrap();
        assert_eq!(a, b);
    }
}
