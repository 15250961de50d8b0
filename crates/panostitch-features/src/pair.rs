use std::sync::OnceLock;

use log::{debug, warn};
use nalgebra::Point2;
use panostitch_core::{GrayImage, Homography, HomographyError, SourceImage};
use rayon::prelude::*;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::descriptor::FeatureSet;
use crate::detector::{extract_accurate, extract_fast, DetectorKind};
use crate::error::MatchRejection;
use crate::matcher::ratio_match;
use crate::params::MatchParams;
use crate::ransac::fit_homography_ransac;

/// Per-image detection state; each strategy's features are computed at most once.
#[derive(Debug)]
pub struct ImageFeatures {
    pub index: usize,
    pub gray: GrayImage,
    fast: OnceLock<FeatureSet>,
    accurate: OnceLock<FeatureSet>,
}

impl ImageFeatures {
    pub fn new(image: &SourceImage) -> Self {
        Self {
            index: image.index,
            gray: image.pixels.to_gray(),
            fast: OnceLock::new(),
            accurate: OnceLock::new(),
        }
    }

    /// Features for `kind`, extracting them on first use.
    pub fn features(&self, kind: DetectorKind, params: &MatchParams) -> &FeatureSet {
        match kind {
            DetectorKind::Fast => self.fast.get_or_init(|| extract_fast(&self.gray, &params.fast)),
            DetectorKind::Accurate => self
                .accurate
                .get_or_init(|| extract_accurate(&self.gray, &params.accurate)),
        }
    }

    /// Whether features for `kind` were already extracted.
    pub fn has_features(&self, kind: DetectorKind) -> bool {
        match kind {
            DetectorKind::Fast => self.fast.get().is_some(),
            DetectorKind::Accurate => self.accurate.get().is_some(),
        }
    }
}

/// Convert every image and extract the primary detector's features.
///
/// Runs on the current rayon pool; each image fills only its own slot.
pub fn extract_all(images: &[SourceImage], params: &MatchParams) -> Vec<ImageFeatures> {
    images
        .par_iter()
        .map(|img| {
            let f = ImageFeatures::new(img);
            let n = f.features(params.detector, params).len();
            debug!("image {} ({}): {} {} keypoints", img.index, img.name, n, params.detector);
            f
        })
        .collect()
}

/// An accepted correspondence between two images.
#[derive(Clone, Debug)]
pub struct PairwiseMatch {
    pub from: usize,
    pub to: usize,
    /// Maps `from` pixel coordinates into `to`'s frame.
    pub homography: Homography,
    /// Exact matrix inverse of `homography`.
    pub inverse: Homography,
    /// Ratio-test survivors.
    pub matches: usize,
    pub inliers: usize,
    pub detector: DetectorKind,
}

/// Outcome for one unordered pair `from < to`.
#[derive(Clone, Debug)]
pub struct PairOutcome {
    pub from: usize,
    pub to: usize,
    pub result: Result<PairwiseMatch, MatchRejection>,
}

#[derive(Clone, Debug, Default)]
pub struct PairMatcher {
    pub params: MatchParams,
}

impl PairMatcher {
    pub fn new(params: MatchParams) -> Self {
        Self { params }
    }

    /// Match `a` against `b`, retrying with the accurate detector when the fast
    /// one is rejected and fallback is enabled.
    ///
    /// The primary rejection is reported when the fallback fails as well.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, a, b), fields(from = a.index, to = b.index))
    )]
    pub fn match_pair(
        &self,
        a: &ImageFeatures,
        b: &ImageFeatures,
    ) -> Result<PairwiseMatch, MatchRejection> {
        let primary = self.params.detector;
        match self.match_with(primary, a, b) {
            Ok(m) => Ok(m),
            Err(err) if self.params.fallback && primary == DetectorKind::Fast => {
                debug!(
                    "pair ({}, {}): fast rejected ({err}), trying accurate",
                    a.index, b.index
                );
                self.match_with(DetectorKind::Accurate, a, b).map_err(|fallback_err| {
                    debug!(
                        "pair ({}, {}): accurate rejected ({fallback_err})",
                        a.index, b.index
                    );
                    err
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Match `a` against `b` with one detector strategy.
    pub fn match_with(
        &self,
        kind: DetectorKind,
        a: &ImageFeatures,
        b: &ImageFeatures,
    ) -> Result<PairwiseMatch, MatchRejection> {
        let p = &self.params;
        let fa = a.features(kind, p);
        let fb = b.features(kind, p);

        let fewest = fa.len().min(fb.len());
        if fewest < p.min_matches.max(4) {
            return Err(MatchRejection::TooFewKeypoints {
                found: fewest,
                required: p.min_matches.max(4),
            });
        }

        let matches = ratio_match(&fa.descriptors, &fb.descriptors, p.ratio_threshold);
        if matches.len() < p.min_matches.max(4) {
            return Err(MatchRejection::TooFewMatches {
                found: matches.len(),
                required: p.min_matches.max(4),
            });
        }

        let (src, dst): (Vec<Point2<f64>>, Vec<Point2<f64>>) = matches
            .iter()
            .map(|m| {
                let ka = &fa.keypoints[m.query];
                let kb = &fb.keypoints[m.train];
                (
                    Point2::new(ka.x as f64, ka.y as f64),
                    Point2::new(kb.x as f64, kb.y as f64),
                )
            })
            .unzip();

        let fit = fit_homography_ransac(
            &src,
            &dst,
            &p.ransac,
            &p.limits,
            p.pair_seed(a.index, b.index),
        )
        .ok_or(MatchRejection::EstimationFailed)?;

        if fit.n_inliers < p.min_inliers {
            return Err(MatchRejection::TooFewInliers {
                found: fit.n_inliers,
                required: p.min_inliers,
            });
        }
        let ratio = fit.n_inliers as f32 / matches.len() as f32;
        if ratio < p.min_inlier_ratio {
            return Err(MatchRejection::LowInlierRatio {
                ratio,
                required: p.min_inlier_ratio,
            });
        }

        let homography = fit.homography;
        homography.validate(&p.limits)?;
        let inverse = homography
            .inverse()
            .ok_or(HomographyError::Singular {
                det: homography.h.determinant(),
            })?;
        inverse.validate(&p.limits)?;

        Ok(PairwiseMatch {
            from: a.index,
            to: b.index,
            homography,
            inverse,
            matches: matches.len(),
            inliers: fit.n_inliers,
            detector: kind,
        })
    }

    /// Match every unordered pair `i < j` on the current rayon pool.
    ///
    /// Each pair writes only its own outcome slot; outcomes are in `(i, j)` order.
    pub fn match_all_pairs(&self, features: &[ImageFeatures]) -> Vec<PairOutcome> {
        let pairs: Vec<(usize, usize)> = (0..features.len())
            .flat_map(|i| (i + 1..features.len()).map(move |j| (i, j)))
            .collect();

        pairs
            .par_iter()
            .map(|&(i, j)| {
                let (a, b) = (&features[i], &features[j]);
                let result = self.match_pair(a, b);
                match &result {
                    Ok(m) => debug!(
                        "pair ({}, {}): {} inliers / {} matches via {}",
                        a.index, b.index, m.inliers, m.matches, m.detector
                    ),
                    Err(e) => warn!("pair ({}, {}) dropped: {e}", a.index, b.index),
                }
                PairOutcome {
                    from: a.index,
                    to: b.index,
                    result,
                }
            })
            .collect()
    }
}
