use crate::{Error, Result, ScalarMap};
use image::{ImageBuffer, Pixel};
use serde::{Deserialize, Serialize};

/// What a sampled map holds; decides the reported unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapKind {
    #[default]
    Disparity,
    Depth,
}

impl MapKind {
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Disparity => "px",
            Self::Depth => "m",
        }
    }
}

/// Value of a map at one requested image point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapSample {
    /// `P<n>`, numbered from 1 in request order.
    pub label: String,
    pub x: u32,
    pub y: u32,
    pub value: f32,
    pub unit: &'static str,
}

/// Read `map` at each of `points`, given as `(x, y)` pixel coordinates.
///
/// Fractional coordinates are rounded to the nearest pixel; points outside the
/// map are skipped but still consume a label number.
pub fn sample_points<M: ScalarMap>(
    points: &[(f64, f64)],
    map: &M,
    kind: MapKind,
) -> Result<Vec<MapSample>> {
    let mut samples = Vec::with_capacity(points.len());

    for (idx, &(px, py)) in points.iter().enumerate() {
        let (x, y) = (px.round(), py.round());
        if !(x >= 0.0 && y >= 0.0 && x < map.width() as f64 && y < map.height() as f64) {
            tracing::debug!(x = px, y = py, "point outside map, skipped");
            continue;
        }
        let (x, y) = (x as u32, y as u32);
        let Some(value) = map.value_at(x, y) else {
            continue;
        };

        samples.push(MapSample {
            label: format!("P{}", idx + 1),
            x,
            y,
            value,
            unit: kind.unit(),
        });
    }

    if samples.is_empty() {
        return Err(Error::computation("No points found inside the map"));
    }
    Ok(samples)
}

/// Keep the centered `fraction` of each dimension of `img`.
pub fn crop_center<P>(
    img: &ImageBuffer<P, Vec<P::Subpixel>>,
    fraction: f64,
) -> Result<ImageBuffer<P, Vec<P::Subpixel>>>
where
    P: Pixel + 'static,
    P::Subpixel: 'static,
{
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(Error::invalid_argument(format!(
            "Crop fraction must be in (0, 1], got {fraction}"
        )));
    }

    let (width, height) = img.dimensions();
    let crop_w = (width as f64 * fraction) as u32;
    let crop_h = (height as f64 * fraction) as u32;
    let x = (width - crop_w) / 2;
    let y = (height - crop_h) / 2;

    Ok(image::imageops::crop_imm(img, x, y, crop_w, crop_h).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DepthMap, DisparityMap};
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn test_sample_points() {
        let mut map = DisparityMap::new(4, 4, 16);
        map.set(1, 2, 7.0);
        map.set(3, 3, 2.5);

        let samples = sample_points(
            &[(1.0, 2.0), (10.0, 1.0), (2.6, 3.4)],
            &map,
            MapKind::Disparity,
        )
        .unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].label, "P1");
        assert_eq!((samples[0].x, samples[0].y, samples[0].value), (1, 2, 7.0));
        assert_eq!(samples[1].label, "P3");
        assert_eq!((samples[1].x, samples[1].y, samples[1].value), (3, 3, 2.5));
        assert_eq!(samples[1].unit, "px");
    }

    #[test]
    fn test_sample_points_none_inside() {
        let map = DepthMap::new(2, 2);
        let err = sample_points(&[(-1.0, 0.0), (5.0, 5.0)], &map, MapKind::Depth).unwrap_err();
        assert!(matches!(err, Error::Computation(_)));
    }

    #[test]
    fn test_crop_center() {
        let img = GrayImage::from_fn(8, 4, |x, y| Luma([(y * 8 + x) as u8]));
        let cropped = crop_center(&img, 0.5).unwrap();
        assert_eq!(cropped.dimensions(), (4, 2));
        assert_eq!(cropped.get_pixel(0, 0).0[0], 8 + 2);

        let rgb = RgbImage::from_pixel(10, 10, Rgb([1, 2, 3]));
        assert_eq!(crop_center(&rgb, 0.75).unwrap().dimensions(), (7, 7));
        assert_eq!(crop_center(&rgb, 1.0).unwrap(), rgb);
    }

    #[test]
    fn test_crop_invalid_fraction() {
        let img = GrayImage::new(4, 4);
        for fraction in [0.0, 1.5, f64::NAN] {
            assert!(matches!(
                crop_center(&img, fraction),
                Err(Error::InvalidArgument(_))
            ));
        }
    }
}
