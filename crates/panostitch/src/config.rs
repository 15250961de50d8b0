//! Run configuration, loadable from JSON.

use std::{fs, path::Path};

use panostitch_blend::{BlendParams, ExposureParams};
use panostitch_features::MatchParams;
use serde::{Deserialize, Serialize};

use crate::StitchError;

/// Every knob of a stitching run.
///
/// Missing JSON fields take their defaults, so `{}` is a valid config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    /// Detector, ratio test, RANSAC and inlier thresholds.
    pub matching: MatchParams,
    /// Fixed reference image; `None` picks the best-connected one.
    pub reference_index: Option<usize>,
    pub exposure: ExposureParams,
    /// Blend mode, tile size, per-tile image cap and pyramid depth.
    pub blend: BlendParams,
    /// Rayon worker threads; 0 uses the available parallelism.
    pub worker_count: usize,
    /// Blend at `1 / downsample` of the input resolution. Matching and the
    /// persisted transforms stay at full resolution.
    pub downsample: usize,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            matching: MatchParams::default(),
            reference_index: None,
            exposure: ExposureParams::default(),
            blend: BlendParams::default(),
            worker_count: 0,
            downsample: 1,
        }
    }
}

impl StitchConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, StitchError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), StitchError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reject settings no run could satisfy.
    pub fn validate(&self) -> Result<(), StitchError> {
        let invalid = |msg: String| Err(StitchError::InvalidConfig(msg));
        let m = &self.matching;
        if !(m.ratio_threshold > 0.0 && m.ratio_threshold <= 1.0) {
            return invalid(format!("ratio_threshold {} not in (0, 1]", m.ratio_threshold));
        }
        if !(m.ransac.threshold > 0.0) {
            return invalid(format!("ransac threshold {} must be positive", m.ransac.threshold));
        }
        if m.min_inliers < 4 {
            return invalid(format!("min_inliers {} below the 4 a homography needs", m.min_inliers));
        }
        if self.blend.tile_size == 0 {
            return invalid("tile_size must be positive".into());
        }
        if self.downsample == 0 {
            return invalid("downsample must be at least 1".into());
        }
        if self.blend.max_images_per_tile == Some(0) {
            return invalid("max_images_per_tile must be positive when set".into());
        }
        let e = &self.exposure;
        if !(e.gain_bounds[0] <= e.gain_bounds[1]) || !(e.bias_bounds[0] <= e.bias_bounds[1]) {
            return invalid(format!(
                "inverted exposure bounds: gain {:?}, bias {:?}",
                e.gain_bounds, e.bias_bounds
            ));
        }
        Ok(())
    }
}
