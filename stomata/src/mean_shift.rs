use itertools::Itertools;
use std::collections::HashMap;

use crate::utils::pt_dist;

const MAX_ITER: usize = 300;

/// Seed the search from occupied cells of a bandwidth-sized grid instead of
/// from every point. Seeds are the cell centers of cells holding at least one
/// point, in sorted cell order so the procedure is deterministic.
fn bin_seeds(points: &[[f32; 2]], bin_size: f32) -> Vec<[f32; 2]> {
    let mut bins = HashMap::<[i64; 2], usize>::new();
    for pt in points {
        let key = [
            (pt[0] / bin_size).round() as i64,
            (pt[1] / bin_size).round() as i64,
        ];
        *bins.entry(key).or_insert(0) += 1;
    }
    bins.keys()
        .sorted()
        .map(|key| [key[0] as f32 * bin_size, key[1] as f32 * bin_size])
        .collect_vec()
}

/// Flat-kernel mean-shift over 2d detection centers.
///
/// Each seed is shifted to the mean of the points within one bandwidth until
/// the shift stalls, then modes closer than one bandwidth are merged with the
/// higher-support mode winning. Returns one center per cluster, ordered by
/// descending support.
pub fn mean_shift(points: &[[f32; 2]], bandwidth: f32) -> Vec<[f32; 2]> {
    assert!(bandwidth > 0.0, "bandwidth must be positive");
    if points.is_empty() {
        return Vec::new();
    }

    let kd_tree = kd_tree::KdIndexTree::build_by_ordered_float(points);
    let stop_distance = 1e-3 * bandwidth;

    let mut modes = Vec::<([f32; 2], usize)>::new();
    for seed in bin_seeds(points, bandwidth) {
        let mut mean = seed;
        let mut support = 0;
        for _ in 0..MAX_ITER {
            let neighbors = kd_tree.within_radius(&mean, bandwidth);
            if neighbors.is_empty() {
                support = 0;
                break;
            }
            support = neighbors.len();
            let mut next = [0.0_f32, 0.0];
            for &idx in &neighbors {
                next[0] += points[*idx][0];
                next[1] += points[*idx][1];
            }
            next[0] /= support as f32;
            next[1] /= support as f32;
            let shift = pt_dist(&next, &mean);
            mean = next;
            if shift < stop_distance {
                break;
            }
        }
        if support > 0 {
            modes.push((mean, support));
        }
    }

    //merge near-duplicate modes, strongest first
    modes.sort_by(|a, b| b.1.cmp(&a.1));
    let mut centers = Vec::<[f32; 2]>::new();
    for (mode, _) in modes {
        if centers.iter().all(|kept| pt_dist(kept, &mode) >= bandwidth) {
            centers.push(mode);
        }
    }
    centers
}

#[cfg(test)]
mod tests {
    use super::{bin_seeds, mean_shift};
    use crate::utils::pt_dist;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn jittered_group(rng: &mut StdRng, center: [f32; 2], n: usize, spread: f32) -> Vec<[f32; 2]> {
        (0..n)
            .map(|_| {
                [
                    center[0] + rng.gen_range(-spread..spread),
                    center[1] + rng.gen_range(-spread..spread),
                ]
            })
            .collect()
    }

    fn centroid(points: &[[f32; 2]]) -> [f32; 2] {
        let n = points.len() as f32;
        let sum = points
            .iter()
            .fold([0.0_f32, 0.0], |acc, p| [acc[0] + p[0], acc[1] + p[1]]);
        [sum[0] / n, sum[1] / n]
    }

    #[test]
    fn test_two_separated_groups_give_two_centers() {
        let mut rng = StdRng::seed_from_u64(7);
        let group_a = jittered_group(&mut rng, [100.0, 100.0], 40, 10.0);
        let group_b = jittered_group(&mut rng, [300.0, 320.0], 30, 10.0);
        let mut points = group_a.clone();
        points.extend_from_slice(&group_b);

        let centers = mean_shift(&points, 60.0);
        assert_eq!(centers.len(), 2);
        //ordered by support, so the larger group comes first
        assert!(pt_dist(&centers[0], &centroid(&group_a)) < 5.0);
        assert!(pt_dist(&centers[1], &centroid(&group_b)) < 5.0);
    }

    #[test]
    fn test_single_point_is_its_own_center() {
        let centers = mean_shift(&[[42.0, 17.0]], 60.0);
        assert_eq!(centers.len(), 1);
        assert_approx_eq!(centers[0][0], 42.0);
        assert_approx_eq!(centers[0][1], 17.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(mean_shift(&[], 60.0).is_empty());
    }

    #[test]
    fn test_bin_seeds_deduplicates_dense_points() {
        let points = vec![[10.0_f32, 10.0], [11.0, 9.0], [10.5, 10.5], [200.0, 200.0]];
        let seeds = bin_seeds(&points, 60.0);
        assert_eq!(seeds.len(), 2);
        assert_approx_eq!(seeds[0][0], 0.0);
        assert_approx_eq!(seeds[1][0], 180.0);
    }
}
