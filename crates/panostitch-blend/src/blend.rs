use std::fmt;
use std::str::FromStr;

use panostitch_core::{RgbImage, WarpedPatch};
use serde::{Deserialize, Serialize};

use crate::distance::distance_to_uncovered;
use crate::pyramid::{collapse, gaussian_pyramid, laplacian_pyramid, max_levels, FloatImage};

/// Blending strategy, chosen once per run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Distance,
    Multiband,
}

impl BlendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlendMode::Distance => "distance",
            BlendMode::Multiband => "multiband",
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "distance" => Ok(BlendMode::Distance),
            "multiband" => Ok(BlendMode::Multiband),
            other => Err(format!("unknown blend mode '{other}' (expected distance|multiband)")),
        }
    }
}

/// Source of the per-candidate blend weight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightField {
    /// Distance to the source image border, normalized by the image inradius.
    /// Depends only on the canvas position, not on the tile.
    #[default]
    Footprint,
    /// Distance transform of the tile-local coverage mask, normalized by its maximum.
    TileMask,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendParams {
    pub mode: BlendMode,
    pub tile_size: usize,
    /// Keep only this many candidates per tile, largest overlap first.
    /// `None` keeps every candidate.
    pub max_images_per_tile: Option<usize>,
    pub pyramid_levels: usize,
    pub weight_field: WeightField,
    pub background: [u8; 3],
}

impl Default for BlendParams {
    fn default() -> Self {
        Self {
            mode: BlendMode::Distance,
            tile_size: 2048,
            max_images_per_tile: Some(6),
            pyramid_levels: 4,
            weight_field: WeightField::Footprint,
            background: [255, 255, 255],
        }
    }
}

/// Pyramid depth for `candidates` sources on a `width × height` tile.
///
/// Depth drops by `log2(candidates / 2)` and the coarsest level keeps at least
/// two pixels on its shorter side.
pub fn effective_levels(requested: usize, candidates: usize, width: usize, height: usize) -> usize {
    let k = candidates.max(1) as f64;
    let reduced = (requested as f64 - (k / 2.0).log2()).trunc().max(1.0) as usize;
    requested.min(reduced).min(max_levels(width, height, 2))
}

/// Weight map for one warped patch; zero wherever the patch is uncovered.
///
/// `inradius` is half the shorter side of the source image.
pub fn weight_map(patch: &WarpedPatch, field: WeightField, inradius: f32) -> Vec<f32> {
    match field {
        WeightField::Footprint => {
            let scale = 1.0 / inradius.max(0.5);
            patch
                .coverage
                .iter()
                .zip(&patch.edge_distance)
                .map(|(&c, &d)| if c { (d * scale).min(1.0) } else { 0.0 })
                .collect()
        }
        WeightField::TileMask => {
            match distance_to_uncovered(&patch.coverage, patch.width, patch.height) {
                Some(dist) => {
                    let max = dist.iter().copied().fold(0.0f32, f32::max);
                    let scale = if max > 0.0 { 1.0 / max } else { 0.0 };
                    dist.iter().map(|d| d * scale).collect()
                }
                None => patch.coverage.iter().map(|&c| if c { 1.0 } else { 0.0 }).collect(),
            }
        }
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Copy covered pixels of a single patch; the rest is background.
pub fn copy_patch(patch: &WarpedPatch, background: [u8; 3]) -> RgbImage {
    let mut out = RgbImage::filled(patch.width, patch.height, background);
    for (i, &c) in patch.coverage.iter().enumerate() {
        if c {
            let [r, g, b] = patch.rgb(i);
            out.data[i * 3..i * 3 + 3].copy_from_slice(&[to_u8(r), to_u8(g), to_u8(b)]);
        }
    }
    out
}

/// Weighted mean colour and weight sum per pixel, accumulated in slice order.
fn weighted_mean(patches: &[WarpedPatch], weights: &[Vec<f32>], n: usize) -> (Vec<f32>, Vec<f32>) {
    let mut num = vec![0.0f32; n * 3];
    let mut den = vec![0.0f32; n];
    for (patch, weight) in patches.iter().zip(weights) {
        for (i, &wt) in weight.iter().enumerate() {
            if wt <= 0.0 {
                continue;
            }
            den[i] += wt;
            for c in 0..3 {
                num[i * 3 + c] += wt * patch.color[i * 3 + c];
            }
        }
    }
    for (i, &d) in den.iter().enumerate() {
        if d > 0.0 {
            for c in 0..3 {
                num[i * 3 + c] /= d;
            }
        }
    }
    (num, den)
}

/// Per-pixel `Σ wₖ·cₖ / Σ wₖ`; pixels with no weight get `background`.
pub fn blend_distance(patches: &[WarpedPatch], weights: &[Vec<f32>], background: [u8; 3]) -> RgbImage {
    let Some(first) = patches.first() else {
        return RgbImage::new(0, 0);
    };
    let (w, h) = (first.width, first.height);
    let (mean, den) = weighted_mean(patches, weights, w * h);
    let mut out = RgbImage::filled(w, h, background);
    for (i, &d) in den.iter().enumerate() {
        if d > 0.0 {
            for c in 0..3 {
                out.data[i * 3 + c] = to_u8(mean[i * 3 + c]);
            }
        }
    }
    out
}

/// Laplacian-pyramid blend of `patches` over `levels` band-pass levels.
///
/// Before decomposition every patch is completed outside its own coverage with
/// the distance-weighted mean of the others (and the tile's mean colour where
/// nothing covers), so coarse bands never pull in empty pixels. Weights are
/// normalized per pixel at full resolution, reduced alongside the images, and
/// renormalized by their sum on every level. Uncovered pixels are set to
/// `background` after reconstruction.
pub fn blend_multiband(
    patches: &[WarpedPatch],
    weights: &[Vec<f32>],
    levels: usize,
    background: [u8; 3],
) -> RgbImage {
    let Some(first) = patches.first() else {
        return RgbImage::new(0, 0);
    };
    let (w, h) = (first.width, first.height);
    let n = w * h;

    let (mut fill, total) = weighted_mean(patches, weights, n);
    let covered: Vec<bool> = total.iter().map(|&t| t > 0.0).collect();
    let count = covered.iter().filter(|&&c| c).count();
    if count == 0 {
        return RgbImage::filled(w, h, background);
    }
    let mut sum = [0.0f64; 3];
    for (px, _) in fill.chunks_exact(3).zip(&covered).filter(|(_, c)| **c) {
        for (s, &v) in sum.iter_mut().zip(px) {
            *s += v as f64;
        }
    }
    let mean = sum.map(|s| (s / count as f64) as f32);
    for (px, _) in fill.chunks_exact_mut(3).zip(&covered).filter(|(_, c)| !**c) {
        px.copy_from_slice(&mean);
    }

    let mut acc: Vec<FloatImage> = Vec::new();
    let mut sums: Vec<FloatImage> = Vec::new();
    for (patch, weight) in patches.iter().zip(weights) {
        let normalized: Vec<f32> = weight
            .iter()
            .zip(&total)
            .map(|(&v, &t)| if t > 0.0 { v / t } else { 0.0 })
            .collect();
        let mut color = patch.color.clone();
        for (i, &c) in patch.coverage.iter().enumerate() {
            if !c {
                color[i * 3..i * 3 + 3].copy_from_slice(&fill[i * 3..i * 3 + 3]);
            }
        }
        let (Some(wimg), Some(cimg)) = (
            FloatImage::from_vec(w, h, 1, normalized),
            FloatImage::from_vec(w, h, 3, color),
        ) else {
            continue;
        };
        let wpyr = gaussian_pyramid(&wimg, levels);
        let lpyr = laplacian_pyramid(&cimg, levels);
        if acc.is_empty() {
            acc = lpyr.iter().map(|l| FloatImage::new(l.width, l.height, 3)).collect();
            sums = wpyr.iter().map(|l| FloatImage::new(l.width, l.height, 1)).collect();
        }
        for ((band, wl), (a, s)) in lpyr.iter().zip(&wpyr).zip(acc.iter_mut().zip(sums.iter_mut())) {
            for (i, &wv) in wl.data.iter().enumerate() {
                s.data[i] += wv;
                for c in 0..3 {
                    a.data[i * 3 + c] += wv * band.data[i * 3 + c];
                }
            }
        }
    }

    for (a, s) in acc.iter_mut().zip(&sums) {
        for (i, &sv) in s.data.iter().enumerate() {
            let inv = if sv > 1e-8 { 1.0 / sv } else { 0.0 };
            for c in 0..3 {
                a.data[i * 3 + c] *= inv;
            }
        }
    }

    let mut out = RgbImage::filled(w, h, background);
    if let Some(img) = collapse(&acc) {
        for (i, &c) in covered.iter().enumerate() {
            if c {
                for ch in 0..3 {
                    out.data[i * 3 + ch] = to_u8(img.data[i * 3 + ch]);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(width: usize, height: usize, color: [f32; 3], covered: impl Fn(usize, usize) -> bool) -> WarpedPatch {
        let mut p = WarpedPatch::empty(width, height);
        for y in 0..height {
            for x in 0..width {
                let i = y * width + x;
                if covered(x, y) {
                    p.coverage[i] = true;
                    p.color[i * 3..i * 3 + 3].copy_from_slice(&color);
                    p.edge_distance[i] = 1.0 + x.min(width - 1 - x) as f32;
                }
            }
        }
        p
    }

    #[test]
    fn levels_shrink_with_candidates_and_tile_size() {
        assert_eq!(effective_levels(4, 1, 2048, 2048), 4);
        assert_eq!(effective_levels(4, 2, 2048, 2048), 4);
        assert_eq!(effective_levels(4, 3, 2048, 2048), 3);
        assert_eq!(effective_levels(4, 6, 2048, 2048), 2);
        assert_eq!(effective_levels(4, 64, 2048, 2048), 1);
        assert_eq!(effective_levels(4, 2, 8, 2048), 2);
        assert_eq!(effective_levels(4, 2, 1, 1), 0);
    }

    #[test]
    fn distance_weights_are_a_partition_of_unity() {
        let a = patch(10, 4, [200.0, 100.0, 0.0], |x, _| x < 7);
        let b = patch(10, 4, [0.0, 100.0, 200.0], |x, _| x >= 3);
        let wa = weight_map(&a, WeightField::Footprint, 2.0);
        let wb = weight_map(&b, WeightField::Footprint, 2.0);
        let out = blend_distance(&[a.clone(), b.clone()], &[wa.clone(), wb.clone()], [255; 3]);
        for x in 0..10 {
            let (ta, tb) = (wa[x], wb[x]);
            let px = out.pixel(x, 0);
            let expected_r = (200.0 * ta / (ta + tb)).round() as u8;
            assert_eq!(px[0], expected_r, "x={x}");
            // the green channel is identical in both, so any convex mix keeps it
            assert_eq!(px[1], 100);
        }
    }

    #[test]
    fn uncovered_pixels_are_background() {
        let a = patch(6, 2, [10.0, 20.0, 30.0], |x, _| x < 2);
        let w = weight_map(&a, WeightField::TileMask, 3.0);
        for out in [
            blend_distance(&[a.clone()], &[w.clone()], [255, 254, 253]),
            blend_multiband(&[a.clone()], &[w.clone()], 1, [255, 254, 253]),
        ] {
            assert_eq!(out.pixel(5, 1), [255, 254, 253]);
            assert_eq!(out.pixel(0, 0), [10, 20, 30]);
        }
    }

    #[test]
    fn copy_matches_single_patch_distance_blend() {
        let a = patch(9, 5, [12.4, 200.6, 99.3], |x, y| x + y > 2);
        let w = weight_map(&a, WeightField::Footprint, 2.5);
        assert_eq!(copy_patch(&a, [255; 3]), blend_distance(&[a], &[w], [255; 3]));
    }

    #[test]
    fn multiband_blends_two_constant_halves_smoothly() {
        let a = patch(32, 16, [100.0, 100.0, 100.0], |x, _| x < 20);
        let b = patch(32, 16, [140.0, 140.0, 140.0], |x, _| x >= 12);
        let wa = weight_map(&a, WeightField::TileMask, 8.0);
        let wb = weight_map(&b, WeightField::TileMask, 8.0);
        let out = blend_multiband(&[a, b], &[wa, wb], 3, [255; 3]);
        let row: Vec<u8> = (0..32).map(|x| out.pixel(x, 8)[0]).collect();
        assert!(row.iter().all(|&v| (95..=145).contains(&v)), "{row:?}");
        assert!(row[2] < row[29]);
        // no hard step larger than the exposure gap inside the overlap
        for x in 12..19 {
            assert!((row[x + 1] as i32 - row[x] as i32).abs() < 40, "{row:?}");
        }
    }

    #[test]
    fn tile_mask_without_background_is_flat() {
        let a = patch(4, 4, [1.0, 2.0, 3.0], |_, _| true);
        assert!(weight_map(&a, WeightField::TileMask, 2.0).iter().all(|&w| w == 1.0));
    }

    #[test]
    fn blend_mode_parses_case_insensitively() {
        assert_eq!("MultiBand".parse::<BlendMode>(), Ok(BlendMode::Multiband));
        assert!("feather".parse::<BlendMode>().is_err());
        assert_eq!(BlendMode::Distance.to_string(), "distance");
    }
}
