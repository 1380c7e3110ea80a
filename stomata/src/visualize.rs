use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_circle_mut};
use ndarray::Array3;

use crate::utils::ImageUtil;

const MARKER_COLOR: Rgb<u8> = Rgb([255, 64, 64]);

/// Render the micrograph with a cross and a hollow circle at each detected
/// stoma center. Presentation only, the source raster is untouched.
pub fn overlay_detections(img: &Array3<f32>, centers: &[[f32; 2]], radius: i32) -> RgbImage {
    let mut canvas = ImageUtil::to_rgb_image(img);
    for center in centers {
        let (x, y) = (center[0].round() as i32, center[1].round() as i32);
        draw_cross_mut(&mut canvas, MARKER_COLOR, x, y);
        draw_hollow_circle_mut(&mut canvas, (x, y), radius, MARKER_COLOR);
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::{overlay_detections, MARKER_COLOR};
    use ndarray::Array3;

    #[test]
    fn test_markers_drawn_at_centers() {
        let img = Array3::<f32>::zeros((64, 64, 3));
        let overlay = overlay_detections(&img, &[[20.0, 30.0]], 5);

        assert_eq!(overlay.get_pixel(20, 30), &MARKER_COLOR);
        //circle rim, one radius to the right of the center
        assert_eq!(overlay.get_pixel(25, 30), &MARKER_COLOR);
        //far corner untouched
        assert_eq!(overlay.get_pixel(60, 60).0, [0, 0, 0]);
    }

    #[test]
    fn test_no_detections_returns_plain_image() {
        let img = Array3::<f32>::from_elem((16, 16, 3), 128.0);
        let overlay = overlay_detections(&img, &[], 5);
        assert!(overlay.pixels().all(|p| p.0 == [128, 128, 128]));
    }
}
