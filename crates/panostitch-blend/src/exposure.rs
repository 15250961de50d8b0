use log::{debug, info};
use nalgebra::Point2;
use panostitch_align::GlobalTransforms;
use panostitch_core::{luminance, sample_rgb_clamped, RgbImage, SourceImage, LUMA_WEIGHTS};
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Linear brightness normalization against the reference image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureParams {
    pub enabled: bool,
    /// Overlap pixels used for the fit; larger overlaps are subsampled.
    pub max_samples: usize,
    /// Images overlapping the reference by fewer pixels are left untouched.
    pub min_overlap: usize,
    /// `[min, max]` clamp for the multiplicative gain `a`.
    pub gain_bounds: [f64; 2],
    /// `[min, max]` clamp for the additive bias `b`.
    pub bias_bounds: [f64; 2],
    pub seed: u64,
}

impl Default for ExposureParams {
    fn default() -> Self {
        Self {
            enabled: false,
            max_samples: 20_000,
            min_overlap: 500,
            gain_bounds: [0.6, 1.6],
            bias_bounds: [-50.0, 50.0],
            seed: 0x5EED_0E4B,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GainStatus {
    Reference,
    Applied,
    SmallOverlap,
    Degenerate,
}

/// Correction `I' = clamp(gain · I + bias)` for one image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExposureGain {
    pub index: usize,
    pub gain: f64,
    pub bias: f64,
    /// Reference pixels covered by the warped image.
    pub overlap: usize,
    pub samples: usize,
    pub status: GainStatus,
}

impl ExposureGain {
    fn identity(index: usize, overlap: usize, status: GainStatus) -> Self {
        Self {
            index,
            gain: 1.0,
            bias: 0.0,
            overlap,
            samples: 0,
            status,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.status == GainStatus::Applied
    }
}

/// Corrected copies of the inputs plus the fitted gains.
#[derive(Clone, Debug)]
pub struct ExposureOutcome {
    pub images: Vec<SourceImage>,
    pub gains: Vec<ExposureGain>,
}

/// Apply `gain · I + bias` to every channel, rounded and clipped to `0..=255`.
pub fn apply_gain(image: &RgbImage, gain: f64, bias: f64) -> RgbImage {
    let data = image
        .data
        .iter()
        .map(|&v| (gain * v as f64 + bias).round().clamp(0.0, 255.0) as u8)
        .collect();
    RgbImage {
        width: image.width,
        height: image.height,
        data,
    }
}

/// Least squares `dst ≈ a · src + b`; `None` when `src` has no spread.
fn fit_line(src: &[f64], dst: &[f64]) -> Option<(f64, f64)> {
    let n = src.len() as f64;
    if src.is_empty() {
        return None;
    }
    let mean_s = src.iter().sum::<f64>() / n;
    let mean_d = dst.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var = 0.0;
    for (s, d) in src.iter().zip(dst) {
        cov += (s - mean_s) * (d - mean_d);
        var += (s - mean_s) * (s - mean_s);
    }
    if var / n < 1e-6 {
        return None;
    }
    let a = cov / var;
    Some((a, mean_d - a * mean_s))
}

/// Fit one image against the reference. The image is warped into the
/// reference frame; only reference pixels it covers take part.
fn estimate_gain(
    image: &SourceImage,
    reference: &RgbImage,
    transforms: &GlobalTransforms,
    params: &ExposureParams,
) -> Option<ExposureGain> {
    let to_ref = transforms.transform(image.index)?;
    if image.index == transforms.reference() {
        return Some(ExposureGain::identity(image.index, 0, GainStatus::Reference));
    }
    let from_ref = to_ref.inverse()?;
    let src = &image.pixels;
    if src.is_empty() {
        return Some(ExposureGain::identity(image.index, 0, GainStatus::SmallOverlap));
    }
    let (sw, sh) = (src.width as f64, src.height as f64);

    let mut overlap: Vec<(usize, Point2<f64>)> = Vec::new();
    for y in 0..reference.height {
        for x in 0..reference.width {
            let Some(p) = from_ref.try_apply(Point2::new(x as f64, y as f64)) else {
                continue;
            };
            if p.x > -0.5 && p.x < sw - 0.5 && p.y > -0.5 && p.y < sh - 0.5 {
                overlap.push((y * reference.width + x, p));
            }
        }
    }
    let count = overlap.len();
    if count < params.min_overlap.max(2) {
        debug!("image {}: overlap {count} px, exposure left unchanged", image.index);
        return Some(ExposureGain::identity(image.index, count, GainStatus::SmallOverlap));
    }

    let selected: Vec<usize> = if count > params.max_samples && params.max_samples > 0 {
        let mut rng = StdRng::seed_from_u64(params.seed ^ image.index as u64);
        let mut idx = rand::seq::index::sample(&mut rng, count, params.max_samples).into_vec();
        idx.sort_unstable();
        idx
    } else {
        (0..count).collect()
    };

    let (src_lum, dst_lum): (Vec<f64>, Vec<f64>) = selected
        .iter()
        .map(|&k| {
            let (ref_idx, p) = overlap[k];
            let rgb = sample_rgb_clamped(src, p.x, p.y);
            let s = LUMA_WEIGHTS[0] * rgb[0] + LUMA_WEIGHTS[1] * rgb[1] + LUMA_WEIGHTS[2] * rgb[2];
            let d = luminance([
                reference.data[ref_idx * 3],
                reference.data[ref_idx * 3 + 1],
                reference.data[ref_idx * 3 + 2],
            ]);
            (s as f64, d as f64)
        })
        .unzip();

    let Some((a, b)) = fit_line(&src_lum, &dst_lum) else {
        debug!("image {}: flat overlap, exposure left unchanged", image.index);
        return Some(ExposureGain::identity(image.index, count, GainStatus::Degenerate));
    };
    let gain = a.clamp(params.gain_bounds[0], params.gain_bounds[1]);
    let bias = b.clamp(params.bias_bounds[0], params.bias_bounds[1]);
    debug!(
        "image {}: fitted a={a:.4} b={b:.3}, applying a={gain:.4} b={bias:.3} from {} samples",
        image.index,
        selected.len()
    );
    Some(ExposureGain {
        index: image.index,
        gain,
        bias,
        overlap: count,
        samples: selected.len(),
        status: GainStatus::Applied,
    })
}

/// Gains for every registered image, in index order.
///
/// Unregistered images get no entry. Each image is fitted independently on the
/// current rayon pool.
pub fn estimate_gains(
    images: &[SourceImage],
    transforms: &GlobalTransforms,
    params: &ExposureParams,
) -> Vec<ExposureGain> {
    let Some(reference) = images.iter().find(|i| i.index == transforms.reference()) else {
        return Vec::new();
    };
    images
        .par_iter()
        .filter_map(|img| estimate_gain(img, &reference.pixels, transforms, params))
        .collect()
}

/// Fit gains and produce corrected copies. Inputs are never modified; images
/// without an applied gain are cloned unchanged.
pub fn compensate_exposure(
    images: &[SourceImage],
    transforms: &GlobalTransforms,
    params: &ExposureParams,
) -> ExposureOutcome {
    let gains = estimate_gains(images, transforms, params);
    let corrected: Vec<SourceImage> = images
        .par_iter()
        .map(|img| match gains.iter().find(|g| g.index == img.index && g.is_applied()) {
            Some(g) => SourceImage {
                index: img.index,
                name: img.name.clone(),
                pixels: apply_gain(&img.pixels, g.gain, g.bias),
            },
            None => img.clone(),
        })
        .collect();
    info!(
        "exposure: corrected {} of {} images",
        gains.iter().filter(|g| g.is_applied()).count(),
        images.len()
    );
    ExposureOutcome {
        images: corrected,
        gains,
    }
}
