//! The two interchangeable detect-and-describe strategies.

use std::fmt;

use log::debug;
use panostitch_core::GrayImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::brief::{BriefPattern, PATCH_RADIUS};
use crate::descriptor::{Descriptors, FeatureSet};
use crate::fast::{fast_corners, intensity_centroid_angle};
use crate::filters::{build_pyramid, gaussian_blur};
use crate::gradient::{self, GradientField};
use crate::keypoint::{distribute_budget, retain_strongest, Keypoint};
use crate::params::{AccurateParams, FastParams};

/// Keypoints closer than this to a FAST level border are discarded.
pub const FAST_BORDER: usize = 16;
const CENTROID_RADIUS: usize = 15;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// FAST corners + steered BRIEF, Hamming distance.
    #[default]
    Fast,
    /// Shi–Tomasi corners + gradient histograms, Euclidean distance.
    Accurate,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Fast => "fast",
            DetectorKind::Accurate => "accurate",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DetectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(DetectorKind::Fast),
            "accurate" => Ok(DetectorKind::Accurate),
            other => Err(format!("unknown detector '{other}' (expected fast|accurate)")),
        }
    }
}

/// Multi-scale FAST-9 keypoints with steered BRIEF descriptors.
pub fn extract_fast(gray: &GrayImage, params: &FastParams) -> FeatureSet {
    let pyramid = build_pyramid(gray, params.levels, params.scale_factor, 2 * FAST_BORDER + 1);
    let budget = distribute_budget(params.max_features, pyramid.len(), params.scale_factor);
    let pattern = BriefPattern::standard();
    debug_assert!(PATCH_RADIUS + 1.0 < FAST_BORDER as f32);

    let per_level: Vec<(Vec<Keypoint>, Vec<_>)> = pyramid
        .par_iter()
        .zip(budget.par_iter())
        .enumerate()
        .map(|(level, (lvl, &n))| {
            let view = lvl.image.view();
            let mut corners = fast_corners(&view, params.threshold, FAST_BORDER);
            retain_strongest(&mut corners, n);
            let smoothed = gaussian_blur(&view, params.blur_sigma);
            let smoothed = smoothed.view();

            let mut kps = Vec::with_capacity(corners.len());
            let mut descs = Vec::with_capacity(corners.len());
            for (x, y, response) in corners {
                let angle = intensity_centroid_angle(&view, x, y, CENTROID_RADIUS);
                descs.push(pattern.describe(&smoothed, x as f32, y as f32, angle));
                let (bx, by) = lvl.to_base(x as f32, y as f32);
                kps.push(Keypoint {
                    x: bx,
                    y: by,
                    angle,
                    response,
                    level: level as u8,
                });
            }
            (kps, descs)
        })
        .collect();

    let mut keypoints = Vec::new();
    let mut descriptors = Vec::new();
    for (k, d) in per_level {
        keypoints.extend(k);
        descriptors.extend(d);
    }
    debug!(
        "fast: {} keypoints over {} levels ({}x{})",
        keypoints.len(),
        pyramid.len(),
        gray.width,
        gray.height
    );
    FeatureSet {
        kind: DetectorKind::Fast,
        keypoints,
        descriptors: Descriptors::Binary(descriptors),
    }
}

/// Multi-scale Shi–Tomasi keypoints with gradient histogram descriptors.
pub fn extract_accurate(gray: &GrayImage, params: &AccurateParams) -> FeatureSet {
    let pyramid = build_pyramid(gray, params.levels, params.scale_factor, 2 * gradient::BORDER + 1);
    let budget = distribute_budget(params.max_features, pyramid.len(), params.scale_factor);

    let per_level: Vec<(Vec<Keypoint>, Vec<_>)> = pyramid
        .par_iter()
        .zip(budget.par_iter())
        .enumerate()
        .map(|(level, (lvl, &n))| {
            let view = lvl.image.view();
            let field = GradientField::new(&view, params.gradient_sigma);
            let response = field.min_eigenvalue_map(params.window_radius);
            let corners = gradient::select_corners(
                view.width,
                view.height,
                &response,
                params.quality_level,
                params.min_distance,
                n,
            );

            let mut kps = Vec::with_capacity(corners.len());
            let mut descs = Vec::with_capacity(corners.len());
            for (x, y, r) in corners {
                let angle = field.dominant_orientation(x, y);
                let Some(d) = field.describe(x as f32, y as f32, angle) else {
                    continue;
                };
                let (bx, by) = lvl.to_base(x as f32, y as f32);
                kps.push(Keypoint {
                    x: bx,
                    y: by,
                    angle,
                    response: r,
                    level: level as u8,
                });
                descs.push(d);
            }
            (kps, descs)
        })
        .collect();

    let mut keypoints = Vec::new();
    let mut descriptors = Vec::new();
    for (k, d) in per_level {
        keypoints.extend(k);
        descriptors.extend(d);
    }
    debug!(
        "accurate: {} keypoints over {} levels ({}x{})",
        keypoints.len(),
        pyramid.len(),
        gray.width,
        gray.height
    );
    FeatureSet {
        kind: DetectorKind::Accurate,
        keypoints,
        descriptors: Descriptors::Float(descriptors),
    }
}
