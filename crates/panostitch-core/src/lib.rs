//! Core types and utilities for panorama stitching.
//!
//! This crate is intentionally small and purely geometric: pixel buffers,
//! bilinear sampling, projective transforms and a region-of-interest warp.
//! It does *not* depend on any image codec or feature detector.

mod geometry;
mod homography;
mod image;
mod logger;
mod warp;

pub use geometry::{BoundingBox, PixelRect};
pub use homography::{
    estimate_homography, homography_from_4pt, reprojection_error, Homography, HomographyError,
    HomographyLimits,
};
pub use image::{
    downsample_area, luminance, resize_bilinear, sample_bilinear, sample_rgb_clamped,
    GrayImage, GrayImageView, RgbImage, SourceImage, LUMA_WEIGHTS,
};
pub use warp::{warp_rgb_roi, WarpedPatch};

#[cfg(feature = "tracing")]
pub use logger::{init_tracing, tracing_filter};

pub use logger::{init_from_env, init_with_level, parse_level, LOG_ENV_VAR};
