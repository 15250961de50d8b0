use panostitch_core::HomographyLimits;
use serde::{Deserialize, Serialize};

use crate::detector::DetectorKind;
use crate::ransac::RansacParams;

/// Multi-scale FAST + steered BRIEF settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastParams {
    /// Total keypoint budget across all pyramid levels.
    pub max_features: usize,
    /// Segment-test contrast threshold (gray levels).
    pub threshold: u8,
    pub levels: usize,
    pub scale_factor: f32,
    /// Gaussian smoothing applied before the BRIEF comparisons.
    pub blur_sigma: f32,
}

impl Default for FastParams {
    fn default() -> Self {
        Self {
            max_features: 5000,
            threshold: 20,
            levels: 4,
            scale_factor: 1.2,
            blur_sigma: 2.0,
        }
    }
}

/// Multi-scale Shi–Tomasi + gradient histogram settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccurateParams {
    pub max_features: usize,
    /// Corners weaker than `quality_level × strongest` are dropped (per level).
    pub quality_level: f32,
    /// Minimum spacing between corners of one level, in level pixels.
    pub min_distance: f32,
    /// Half-size of the structure tensor window.
    pub window_radius: usize,
    pub levels: usize,
    pub scale_factor: f32,
    /// Gaussian smoothing before differentiation.
    pub gradient_sigma: f32,
}

impl Default for AccurateParams {
    fn default() -> Self {
        Self {
            max_features: 3000,
            quality_level: 0.01,
            min_distance: 4.0,
            window_radius: 2,
            levels: 3,
            scale_factor: 1.5,
            gradient_sigma: 1.0,
        }
    }
}

/// Everything the pairwise matcher needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchParams {
    /// Primary detector strategy.
    pub detector: DetectorKind,
    /// Retry with the accurate detector when the fast one is rejected.
    pub fallback: bool,
    /// Lowe ratio threshold in `(0, 1]`.
    pub ratio_threshold: f32,
    /// Minimum ratio-test survivors before geometric estimation.
    pub min_matches: usize,
    /// Minimum RANSAC inliers for an accepted pair.
    pub min_inliers: usize,
    /// Minimum `inliers / survivors`.
    pub min_inlier_ratio: f32,
    pub ransac: RansacParams,
    pub limits: HomographyLimits,
    pub fast: FastParams,
    pub accurate: AccurateParams,
    /// Base seed for the per-pair RANSAC generators.
    pub seed: u64,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            detector: DetectorKind::Fast,
            fallback: true,
            ratio_threshold: 0.75,
            min_matches: 20,
            min_inliers: 20,
            min_inlier_ratio: 0.1,
            ransac: RansacParams::default(),
            limits: HomographyLimits::default(),
            fast: FastParams::default(),
            accurate: AccurateParams::default(),
            seed: 0x9E37_79B9_7F4A_7C15,
        }
    }
}

impl MatchParams {
    /// Deterministic RANSAC seed for the ordered pair `(i, j)`.
    pub fn pair_seed(&self, i: usize, j: usize) -> u64 {
        self.seed ^ ((i as u64) << 32) ^ (j as u64)
    }
}
