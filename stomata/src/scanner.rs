use ndarray::{s, Array2, Array3, ArrayView3};
use ndarray_npy::write_npy;
use slog::info;

use crate::stomata_detector::StomaDetectionParameter;
use crate::utils::set_log_config;
use crate::IS_DEBUG;

/// Number of whole step positions a patch can shift along one axis,
/// floor((dim - patch_size) / step). Negative when the image is smaller
/// than the patch.
pub fn shift_count(dim: usize, patch_size: usize, step: usize) -> i64 {
    (dim as i64 - patch_size as i64).div_euclid(step as i64)
}

/// Enumerate all window centers [x, y] (x along columns, y along rows) for
/// (x, y) in [0, x_shifts] x [0, y_shifts], x outermost.
///
/// Windows are generated only at offsets where the whole patch fits inside
/// the image. The reference workflow steps once more past the computed shift
/// count, which can slice beyond the image edge on the last row/column; that
/// trailing step is dropped here, so every center lies in
/// [patch_size / 2, dim - patch_size / 2]. An image smaller than the patch
/// along either axis yields no windows.
pub fn window_centers(
    rows: usize,
    cols: usize,
    patch_size: usize,
    step: usize,
) -> Vec<[usize; 2]> {
    let x_shifts = shift_count(cols, patch_size, step);
    let y_shifts = shift_count(rows, patch_size, step);
    if x_shifts < 0 || y_shifts < 0 {
        return Vec::new();
    }
    let half = patch_size / 2;
    let mut centers = Vec::with_capacity(((x_shifts + 1) * (y_shifts + 1)) as usize);
    for x in 0..=x_shifts as usize {
        for y in 0..=y_shifts as usize {
            centers.push([x * step + half, y * step + half]);
        }
    }
    centers
}

/// Slice the patch_size x patch_size window centered at [x, y].
pub fn extract_patch(img: &Array3<f32>, center: [usize; 2], patch_size: usize) -> ArrayView3<f32> {
    let half = patch_size / 2;
    let (top, left) = (center[1] - half, center[0] - half);
    img.slice(s![top..top + patch_size, left..left + patch_size, ..])
}

/// Rescale raw 0-255 pixel values to [0, 1].
pub fn normalize_patch(patch: &ArrayView3<f32>) -> Array3<f32> {
    patch.mapv(|v| v / 255.0)
}

/// Score every window of the micrograph with the classifier and keep the
/// centers scored strictly above the threshold. Serial, deterministic scan;
/// a score exactly equal to the threshold is excluded.
pub fn scan_windows<F>(
    img: &Array3<f32>,
    param: &StomaDetectionParameter,
    mut score_patch: F,
) -> Vec<[f32; 2]>
where
    F: FnMut(&Array3<f32>) -> f32,
{
    let (rows, cols, _) = img.dim();
    let centers = window_centers(rows, cols, param.patch_size, param.step);
    let mut scores = Vec::with_capacity(centers.len());
    let mut positives = Vec::new();
    for &center in &centers {
        let patch = normalize_patch(&extract_patch(img, center, param.patch_size));
        let score = score_patch(&patch);
        scores.push(score);
        if score > param.score_threshold {
            positives.push([center[0] as f32, center[1] as f32]);
        }
    }

    if IS_DEBUG && !centers.is_empty() {
        let log = set_log_config();
        let nx = (shift_count(cols, param.patch_size, param.step) + 1) as usize;
        let ny = (shift_count(rows, param.patch_size, param.step) + 1) as usize;
        let grid = Array2::from_shape_vec((nx, ny), scores).unwrap();
        write_npy("scan_scores.npy", &grid).unwrap();
        info!(
            log,
            "scanned {} windows, {} above threshold {}",
            nx * ny,
            positives.len(),
            param.score_threshold
        );
    }
    positives
}

#[cfg(test)]
mod tests {
    use super::{normalize_patch, scan_windows, shift_count, window_centers};
    use crate::stomata_detector::StomaDetectionParameter;
    use ndarray::Array3;

    #[test]
    fn test_window_count_formula() {
        for &(rows, cols, patch, step) in &[
            (500_usize, 700_usize, 120_usize, 10_usize),
            (240, 240, 120, 120),
            (121, 130, 120, 10),
            (360, 360, 120, 7),
        ] {
            let centers = window_centers(rows, cols, patch, step);
            let expected = (((rows - patch) / step + 1) * ((cols - patch) / step + 1)) as usize;
            assert_eq!(centers.len(), expected);
        }
    }

    #[test]
    fn test_centers_stay_inside_image() {
        let (rows, cols, patch, step) = (487, 623, 120, 10);
        for center in window_centers(rows, cols, patch, step) {
            assert!(center[0] >= patch / 2 && center[0] <= cols - patch / 2);
            assert!(center[1] >= patch / 2 && center[1] <= rows - patch / 2);
        }
    }

    #[test]
    fn test_image_smaller_than_patch_yields_no_windows() {
        assert_eq!(shift_count(100, 120, 10), -2);
        assert!(window_centers(100, 300, 120, 10).is_empty());
        assert!(window_centers(300, 100, 120, 10).is_empty());
    }

    #[test]
    fn test_single_window_scan() {
        //240x240 image with patch 120 and step 120 has exactly one window
        //position per axis, centered at (60, 60)
        let centers = window_centers(240, 240, 120, 120);
        assert_eq!(centers, vec![[60, 60]]);
    }

    #[test]
    fn test_normalized_values_in_unit_interval() {
        let img = Array3::<f32>::from_elem((8, 8, 3), 255.0);
        let patch = normalize_patch(&img.view());
        assert!(patch.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(patch.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_threshold_is_strict() {
        let img = Array3::<f32>::zeros((240, 240, 3));
        let param = StomaDetectionParameter::new(120, 120, 0.7);
        let at_threshold = scan_windows(&img, &param, |_| 0.7);
        assert!(at_threshold.is_empty());
        let above_threshold = scan_windows(&img, &param, |_| 0.7 + f32::EPSILON);
        assert_eq!(above_threshold, vec![[60.0, 60.0]]);
    }

    #[test]
    fn test_scan_order_is_row_major_over_xy() {
        let img = Array3::<f32>::zeros((130, 140, 3));
        let param = StomaDetectionParameter::new(120, 10, -1.0);
        let positives = scan_windows(&img, &param, |_| 0.0);
        // x outer, y inner: 3 x positions, 2 y positions
        assert_eq!(
            positives,
            vec![
                [60.0, 60.0],
                [60.0, 70.0],
                [70.0, 60.0],
                [70.0, 70.0],
                [80.0, 60.0],
                [80.0, 70.0]
            ]
        );
    }
}
