//! Shi–Tomasi corners with gradient-orientation histogram descriptors.
//!
//! The descriptor is a 4×4 grid of 8-bin orientation histograms over a 16×16
//! sample window rotated to the dominant gradient direction, normalized,
//! clipped at 0.2 and renormalized.

use std::f32::consts::TAU;

use crate::filters::{convolve_separable, gaussian_kernel, sample_plane, sobel, to_f32};
use panostitch_core::GrayImageView;

pub const GRID: usize = 4;
pub const ORIENTATION_BINS: usize = 8;
pub const FLOAT_DIM: usize = GRID * GRID * ORIENTATION_BINS;

const WINDOW: usize = 16;
const CLIP: f32 = 0.2;
const ORIENT_HIST_BINS: usize = 36;
const ORIENT_RADIUS: isize = 6;

/// Minimum distance from the level border for detected corners.
pub const BORDER: usize = 12;

pub type FloatDescriptor = [f32; FLOAT_DIM];

/// Smoothed gradients of one pyramid level.
pub struct GradientField {
    pub width: usize,
    pub height: usize,
    pub gx: Vec<f32>,
    pub gy: Vec<f32>,
}

impl GradientField {
    pub fn new(img: &GrayImageView<'_>, sigma: f32) -> Self {
        let smooth = convolve_separable(img.width, img.height, &to_f32(img), &gaussian_kernel(sigma));
        let (gx, gy) = sobel(img.width, img.height, &smooth);
        Self {
            width: img.width,
            height: img.height,
            gx,
            gy,
        }
    }

    /// Minimum eigenvalue of the structure tensor summed over a `(2r+1)²` window.
    pub fn min_eigenvalue_map(&self, r: usize) -> Vec<f32> {
        let (w, h) = (self.width, self.height);
        let mut out = vec![0.0f32; w * h];
        if w <= 2 * r || h <= 2 * r {
            return out;
        }
        for y in r..h - r {
            for x in r..w - r {
                let (mut sxx, mut syy, mut sxy) = (0.0f32, 0.0f32, 0.0f32);
                for yy in y - r..=y + r {
                    for xx in x - r..=x + r {
                        let i = yy * w + xx;
                        let (gx, gy) = (self.gx[i], self.gy[i]);
                        sxx += gx * gx;
                        syy += gy * gy;
                        sxy += gx * gy;
                    }
                }
                let tr = sxx + syy;
                let disc = ((sxx - syy) * (sxx - syy) + 4.0 * sxy * sxy).sqrt();
                out[y * w + x] = 0.5 * (tr - disc);
            }
        }
        out
    }

    /// Dominant gradient direction around `(x, y)` from a 36-bin weighted histogram.
    pub fn dominant_orientation(&self, x: usize, y: usize) -> f32 {
        let mut hist = [0.0f32; ORIENT_HIST_BINS];
        let sigma = ORIENT_RADIUS as f32 / 2.0;
        for dy in -ORIENT_RADIUS..=ORIENT_RADIUS {
            for dx in -ORIENT_RADIUS..=ORIENT_RADIUS {
                if dx * dx + dy * dy > ORIENT_RADIUS * ORIENT_RADIUS {
                    continue;
                }
                let px = x as isize + dx;
                let py = y as isize + dy;
                if px < 0 || py < 0 || px >= self.width as isize || py >= self.height as isize {
                    continue;
                }
                let i = py as usize * self.width + px as usize;
                let (gx, gy) = (self.gx[i], self.gy[i]);
                let mag = (gx * gx + gy * gy).sqrt();
                if mag <= 0.0 {
                    continue;
                }
                let weight = (-((dx * dx + dy * dy) as f32) / (2.0 * sigma * sigma)).exp();
                let theta = gy.atan2(gx).rem_euclid(TAU);
                let bin = ((theta / TAU * ORIENT_HIST_BINS as f32) as usize).min(ORIENT_HIST_BINS - 1);
                hist[bin] += weight * mag;
            }
        }

        let mut best = 0;
        for (i, &v) in hist.iter().enumerate() {
            if v > hist[best] {
                best = i;
            }
        }
        let left = hist[(best + ORIENT_HIST_BINS - 1) % ORIENT_HIST_BINS];
        let right = hist[(best + 1) % ORIENT_HIST_BINS];
        let center = hist[best];
        let denom = left - 2.0 * center + right;
        let offset = if denom.abs() > f32::EPSILON {
            (0.5 * (left - right) / denom).clamp(-0.5, 0.5)
        } else {
            0.0
        };
        (best as f32 + 0.5 + offset) * TAU / ORIENT_HIST_BINS as f32
    }

    /// Orientation-histogram descriptor; `None` for a textureless window.
    pub fn describe(&self, x: f32, y: f32, angle: f32) -> Option<FloatDescriptor> {
        let (s, c) = angle.sin_cos();
        let mut desc = [0.0f32; FLOAT_DIM];
        let half = WINDOW as f32 / 2.0;
        let sigma = half;
        let cell = WINDOW / GRID;
        let bin_width = TAU / ORIENTATION_BINS as f32;

        for i in 0..WINDOW {
            let v = i as f32 - half + 0.5;
            for j in 0..WINDOW {
                let u = j as f32 - half + 0.5;
                let sx = x + c * u - s * v;
                let sy = y + s * u + c * v;
                let gx = sample_plane(self.width, self.height, &self.gx, sx, sy);
                let gy = sample_plane(self.width, self.height, &self.gy, sx, sy);
                // gradient in the keypoint frame
                let gu = c * gx + s * gy;
                let gv = -s * gx + c * gy;
                let mag = (gu * gu + gv * gv).sqrt();
                if mag <= 0.0 {
                    continue;
                }
                let weight = (-(u * u + v * v) / (2.0 * sigma * sigma)).exp() * mag;
                let theta = gv.atan2(gu).rem_euclid(TAU) / bin_width;
                let b0 = (theta.floor() as usize) % ORIENTATION_BINS;
                let b1 = (b0 + 1) % ORIENTATION_BINS;
                let frac = theta - theta.floor();
                let base = ((i / cell) * GRID + j / cell) * ORIENTATION_BINS;
                desc[base + b0] += weight * (1.0 - frac);
                desc[base + b1] += weight * frac;
            }
        }

        normalize(&mut desc)?;
        for v in desc.iter_mut() {
            *v = v.min(CLIP);
        }
        normalize(&mut desc)?;
        Some(desc)
    }
}

fn normalize(v: &mut FloatDescriptor) -> Option<()> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if !(norm > 1e-12) {
        return None;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    Some(())
}

/// Local maxima of `response` above `quality × max`, thinned to `min_distance`.
///
/// Returns `(x, y, response)` strongest first, at most `max_corners` entries.
pub fn select_corners(
    width: usize,
    height: usize,
    response: &[f32],
    quality: f32,
    min_distance: f32,
    max_corners: usize,
) -> Vec<(usize, usize, f32)> {
    if width <= 2 * BORDER || height <= 2 * BORDER {
        return Vec::new();
    }
    let max = response.iter().copied().fold(0.0f32, f32::max);
    if !(max > 0.0) {
        return Vec::new();
    }
    let floor = max * quality;

    let mut candidates = Vec::new();
    for y in BORDER..height - BORDER {
        for x in BORDER..width - BORDER {
            let r = response[y * width + x];
            if r < floor || r <= 0.0 {
                continue;
            }
            let mut is_max = true;
            for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    let n = response[(y as isize + dy) as usize * width + (x as isize + dx) as usize];
                    let earlier = dy < 0 || (dy == 0 && dx < 0);
                    if n > r || (earlier && n == r && (dx, dy) != (0, 0)) {
                        is_max = false;
                    }
                }
            }
            if is_max {
                candidates.push((x, y, r));
            }
        }
    }
    crate::keypoint::retain_strongest(&mut candidates, usize::MAX);

    // grid buckets of side min_distance for the spacing check
    let cell = min_distance.max(1.0);
    let gw = (width as f32 / cell).ceil() as usize + 1;
    let gh = (height as f32 / cell).ceil() as usize + 1;
    let mut grid: Vec<Vec<(f32, f32)>> = vec![Vec::new(); gw * gh];
    let min_d2 = min_distance * min_distance;
    let mut out = Vec::new();
    for (x, y, r) in candidates {
        if out.len() >= max_corners {
            break;
        }
        let (fx, fy) = (x as f32, y as f32);
        let cx = (fx / cell) as usize;
        let cy = (fy / cell) as usize;
        let mut close = false;
        'search: for gy in cy.saturating_sub(1)..=(cy + 1).min(gh - 1) {
            for gx in cx.saturating_sub(1)..=(cx + 1).min(gw - 1) {
                for &(ox, oy) in &grid[gy * gw + gx] {
                    if (ox - fx).powi(2) + (oy - fy).powi(2) < min_d2 {
                        close = true;
                        break 'search;
                    }
                }
            }
        }
        if !close {
            grid[cy * gw + cx].push((fx, fy));
            out.push((x, y, r));
        }
    }
    out
}

#[inline]
pub fn l2_squared(a: &FloatDescriptor, b: &FloatDescriptor) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use panostitch_core::GrayImage;

    fn checker(w: usize, h: usize, cell: usize) -> GrayImage {
        let data = (0..w * h)
            .map(|i| {
                let (x, y) = (i % w, i / w);
                if ((x / cell) + (y / cell)) % 2 == 0 {
                    40
                } else {
                    210
                }
            })
            .collect();
        GrayImage {
            width: w,
            height: h,
            data,
        }
    }

    #[test]
    fn corners_are_found_at_checker_junctions() {
        let img = checker(80, 80, 16);
        let field = GradientField::new(&img.view(), 1.0);
        let resp = field.min_eigenvalue_map(2);
        let corners = select_corners(80, 80, &resp, 0.1, 4.0, 100);
        assert!(!corners.is_empty());
        for &(x, y, _) in &corners {
            let dx = (x as f32 + 0.5) % 16.0;
            let dy = (y as f32 + 0.5) % 16.0;
            let near = |d: f32| d < 3.0 || d > 13.0;
            assert!(near(dx) && near(dy), "corner at ({x},{y})");
        }
    }

    #[test]
    fn min_distance_is_respected() {
        let img = checker(96, 96, 8);
        let field = GradientField::new(&img.view(), 1.0);
        let resp = field.min_eigenvalue_map(2);
        let corners = select_corners(96, 96, &resp, 0.01, 6.0, 1000);
        for (i, a) in corners.iter().enumerate() {
            for b in &corners[i + 1..] {
                let d2 = (a.0 as f32 - b.0 as f32).powi(2) + (a.1 as f32 - b.1 as f32).powi(2);
                assert!(d2 >= 36.0);
            }
        }
    }

    #[test]
    fn descriptor_is_unit_length() {
        let img = checker(64, 64, 8);
        let field = GradientField::new(&img.view(), 1.0);
        let d = field.describe(31.5, 31.5, 0.0).expect("textured");
        let norm = d.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-4);
        assert!(d.iter().all(|&v| v >= 0.0));
        assert!(d.iter().filter(|&&v| v > 0.0).count() > 8);
    }

    #[test]
    fn flat_window_has_no_descriptor() {
        let img = GrayImage {
            width: 40,
            height: 40,
            data: vec![128; 1600],
        };
        let field = GradientField::new(&img.view(), 1.0);
        assert!(field.describe(20.0, 20.0, 0.0).is_none());
    }
}
