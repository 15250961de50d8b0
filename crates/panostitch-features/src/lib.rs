//! Pairwise feature matching for panorama stitching.
//!
//! Two detect-and-describe strategies share one matching interface:
//!
//! - [`DetectorKind::Fast`]: multi-scale FAST-9 corners with intensity-centroid
//!   orientation and 256-bit steered BRIEF, compared by Hamming distance.
//! - [`DetectorKind::Accurate`]: multi-scale Shi–Tomasi corners with 128-D
//!   gradient-orientation histograms, compared by Euclidean distance.
//!
//! [`PairMatcher`] runs the ratio test, seeded RANSAC and homography validity
//! checks, and reports every failure as a recoverable [`MatchRejection`].

pub mod brief;
mod descriptor;
mod detector;
mod error;
pub mod fast;
pub mod filters;
pub mod gradient;
mod keypoint;
mod matcher;
mod pair;
mod params;
mod ransac;

pub use descriptor::{Descriptors, FeatureSet};
pub use detector::{extract_accurate, extract_fast, DetectorKind, FAST_BORDER};
pub use error::MatchRejection;
pub use keypoint::{distribute_budget, Keypoint, PyramidLevel};
pub use matcher::{ratio_match, DescriptorMatch};
pub use pair::{extract_all, ImageFeatures, PairMatcher, PairOutcome, PairwiseMatch};
pub use params::{AccurateParams, FastParams, MatchParams};
pub use ransac::{fit_homography_ransac, RansacFit, RansacParams};
