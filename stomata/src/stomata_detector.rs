use std::time::Instant;

use ndarray::Array3;
use slog::info;

use crate::mean_shift::mean_shift;
use crate::scanner::scan_windows;
use crate::utils::set_log_config;
use crate::IS_DEBUG;

/// StomaDetectionParameter
#[derive(Clone, Debug)]
pub struct StomaDetectionParameter {
    pub patch_size: usize,
    pub step: usize,
    pub score_threshold: f32,
    pub bandwidth: f32,
}

impl Default for StomaDetectionParameter {
    fn default() -> Self {
        StomaDetectionParameter::new(120, 10, 0.7)
    }
}

impl StomaDetectionParameter {
    /// Clustering bandwidth defaults to half the patch size.
    pub fn new(patch_size: usize, step: usize, score_threshold: f32) -> StomaDetectionParameter {
        StomaDetectionParameter {
            patch_size,
            step,
            score_threshold,
            bandwidth: patch_size as f32 / 2.0,
        }
    }
}

/// Detect stomata on a full micrograph.
///
/// Slides the classifier over every window position, keeps centers scored
/// strictly above the threshold and merges them into one center per stoma
/// with mean-shift. The classifier is passed as a scoring closure over a
/// normalized (patch_size, patch_size, 3) patch.
pub fn detect_stomata<F>(
    img: &Array3<f32>,
    param: &StomaDetectionParameter,
    score_patch: F,
) -> Vec<[f32; 2]>
where
    F: FnMut(&Array3<f32>) -> f32,
{
    let log = set_log_config();

    let tick = Instant::now();
    let positives = scan_windows(img, param, score_patch);
    if IS_DEBUG {
        info!(
            log,
            "scan_windows took {:.3}s, {} positive windows",
            tick.elapsed().as_millis() as f64 / 1000.0,
            positives.len()
        );
    }
    if positives.is_empty() {
        return Vec::new();
    }

    let tick = Instant::now();
    let centers = mean_shift(&positives, param.bandwidth);
    if IS_DEBUG {
        info!(
            log,
            "mean_shift took {:.3}s, {} stomata",
            tick.elapsed().as_millis() as f64 / 1000.0,
            centers.len()
        );
    }
    centers
}
