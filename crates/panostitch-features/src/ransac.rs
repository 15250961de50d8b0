use nalgebra::Point2;
use panostitch_core::{
    estimate_homography, homography_from_4pt, reprojection_error, Homography, HomographyLimits,
};
use rand::{rngs::StdRng, seq::index::sample, SeedableRng};
use serde::{Deserialize, Serialize};

/// RANSAC configuration for homography fitting.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Inlier threshold (reprojection error in pixels).
    pub threshold: f64,
    /// Probability of drawing at least one all-inlier sample; drives the
    /// adaptive iteration count.
    pub confidence: f64,
    /// Hard cap on iterations.
    pub max_iterations: usize,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            threshold: 5.0,
            confidence: 0.995,
            max_iterations: 2000,
        }
    }
}

/// Result of RANSAC homography fitting.
#[derive(Clone, Debug)]
pub struct RansacFit {
    pub homography: Homography,
    /// `true` for correspondences within the threshold of `homography`.
    pub inlier_mask: Vec<bool>,
    pub n_inliers: usize,
    pub iterations: usize,
}

/// Iterations needed to hit `confidence` with inlier ratio `w` and 4-point samples.
fn required_iterations(confidence: f64, w: f64, cap: usize) -> usize {
    let p_good = w.powi(4);
    if p_good >= 1.0 - f64::EPSILON {
        return 1;
    }
    if p_good <= f64::EPSILON {
        return cap;
    }
    let n = (1.0 - confidence).ln() / (1.0 - p_good).ln();
    if n.is_finite() && n > 0.0 {
        (n.ceil() as usize).clamp(1, cap)
    } else {
        cap
    }
}

fn score(
    h: &Homography,
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    threshold: f64,
) -> (usize, Vec<bool>) {
    let mask: Vec<bool> = src
        .iter()
        .zip(dst)
        .map(|(&s, &d)| reprojection_error(h, s, d) <= threshold)
        .collect();
    (mask.iter().filter(|&&m| m).count(), mask)
}

/// Fit `dst ~ H * src` robustly.
///
/// Minimal samples whose homography violates `limits` are skipped. The best
/// consensus set is refit with the normalized DLT and the inliers recounted;
/// the refit replaces the minimal model only if it keeps at least as many
/// inliers. Returns `None` when no valid model was found.
pub fn fit_homography_ransac(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    params: &RansacParams,
    limits: &HomographyLimits,
    seed: u64,
) -> Option<RansacFit> {
    let n = src.len();
    if n < 4 || dst.len() != n {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut budget = params.max_iterations.max(1);
    let mut best: Option<(Homography, usize, Vec<bool>)> = None;
    let mut iterations = 0;

    while iterations < budget {
        iterations += 1;
        let idx = sample(&mut rng, n, 4);
        let s = [src[idx.index(0)], src[idx.index(1)], src[idx.index(2)], src[idx.index(3)]];
        let d = [dst[idx.index(0)], dst[idx.index(1)], dst[idx.index(2)], dst[idx.index(3)]];
        let Some(h) = homography_from_4pt(&s, &d) else {
            continue;
        };
        if h.validate(limits).is_err() {
            continue;
        }

        let (count, mask) = score(&h, src, dst, params.threshold);
        if best.as_ref().map_or(true, |(_, c, _)| count > *c) {
            budget = required_iterations(params.confidence, count as f64 / n as f64, params.max_iterations.max(1));
            best = Some((h, count, mask));
        }
    }

    let (mut h, mut count, mut mask) = best?;
    if count < 4 {
        return None;
    }

    let (in_src, in_dst): (Vec<_>, Vec<_>) = src
        .iter()
        .zip(dst)
        .zip(&mask)
        .filter(|(_, m)| **m)
        .map(|((&s, &d), _)| (s, d))
        .unzip();
    if let Some(refit) = estimate_homography(&in_src, &in_dst) {
        if refit.validate(limits).is_ok() {
            let (refit_count, refit_mask) = score(&refit, src, dst, params.threshold);
            if refit_count >= count {
                h = refit;
                count = refit_count;
                mask = refit_mask;
            }
        }
    }

    Some(RansacFit {
        homography: h,
        inlier_mask: mask,
        n_inliers: count,
        iterations,
    })
}
