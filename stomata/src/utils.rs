use itertools::Itertools;

use slog::FnValue;

use ndarray::{Array2, Array3};
use ndarray_stats::QuantileExt;
use slog::o;
use slog::Drain;
use slog::Logger;

///Calculate point-to-point distance."""
pub(crate) fn pt_dist(pt1: &[f32; 2], pt2: &[f32; 2]) -> f32 {
    ((pt1[0] - pt2[0]) * (pt1[0] - pt2[0]) + (pt1[1] - pt2[1]) * (pt1[1] - pt2[1])).sqrt()
}

pub struct ImageUtil {}
impl ImageUtil {
    /// Read an RGB micrograph into a (rows, cols, 3) array with raw 0-255 values.
    /// Per-patch rescaling to [0, 1] happens in the scanner.
    pub fn read_rgb(path: &str) -> Array3<f32> {
        let image = image::open(path)
            .unwrap_or_else(|e| panic!("{}: {}", path, e))
            .into_rgb8();
        let (width, height) = image.dimensions();
        let data = image.into_raw().iter().map(|&x| x as f32).collect_vec();
        Array3::from_shape_vec((height as usize, width as usize, 3), data).unwrap()
    }

    /// Convert a (rows, cols, 3) array with 0-255 values back to an image.
    pub fn to_rgb_image(img: &Array3<f32>) -> image::RgbImage {
        let (height, width, _) = img.dim();
        let data = img
            .iter()
            .map(|&x| clamp(x, 0.0, 255.0).round() as u8)
            .collect_vec();
        image::RgbImage::from_vec(width as u32, height as u32, data).unwrap()
    }

    /// Render a score grid as a min/max rescaled grayscale image.
    pub fn to_gray_image(scores: &Array2<f32>) -> image::GrayImage {
        let (rows, cols) = scores.dim();
        let max = *scores.max().unwrap();
        let min = *scores.min().unwrap();
        let span = if max > min { max - min } else { 1.0 };
        let data = scores
            .iter()
            .map(|&x| ((x - min) * 255.0 / span).round() as u8)
            .collect_vec();
        image::GrayImage::from_vec(cols as u32, rows as u32, data).unwrap()
    }
}

pub fn clamp(input: f32, min: f32, max: f32) -> f32 {
    debug_assert!(min <= max, "min must be less than or equal to max");
    if input < min {
        min
    } else if input > max {
        max
    } else {
        input
    }
}

use std::sync::Once;
#[allow(dead_code)]
static INIT: Once = Once::new();

#[allow(dead_code)]
pub(crate) fn set_log_config() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(
        drain,
        o!("place" =>
         FnValue(move |info| {
             format!("{}:{} {}",
                     info.file(),
                     info.line(),
                     info.module(),
                     )
         })
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::{clamp, ImageUtil};
    use assert_approx_eq::assert_approx_eq;
    use ndarray::{arr2, Array3};

    #[test]
    fn test_rgb_image_round_trip() {
        let mut img = Array3::<f32>::zeros((4, 6, 3));
        img[(1, 2, 0)] = 255.0;
        img[(3, 5, 1)] = 128.0;
        let rgb = ImageUtil::to_rgb_image(&img);
        assert_eq!(rgb.dimensions(), (6, 4));
        assert_eq!(rgb.get_pixel(2, 1).0, [255, 0, 0]);
        assert_eq!(rgb.get_pixel(5, 3).0, [0, 128, 0]);
    }

    #[test]
    fn test_to_gray_image_rescales() {
        let scores = arr2(&[[0.2_f32, 0.7], [0.45, 0.2]]);
        let gray = ImageUtil::to_gray_image(&scores);
        assert_eq!(gray.get_pixel(0, 0).0, [0]);
        assert_eq!(gray.get_pixel(1, 0).0, [255]);
        assert_eq!(gray.get_pixel(0, 1).0, [128]);
    }

    #[test]
    fn test_clamp() {
        assert_approx_eq!(clamp(-3.0, 0.0, 255.0), 0.0);
        assert_approx_eq!(clamp(300.0, 0.0, 255.0), 255.0);
        assert_approx_eq!(clamp(42.5, 0.0, 255.0), 42.5);
    }
}
