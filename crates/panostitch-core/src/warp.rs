use nalgebra::Point2;

use crate::{sample_rgb_clamped, Homography, RgbImage};

/// A source image resampled onto a rectangular region of the output canvas.
///
/// All buffers are row-major over `width × height`; `color` is interleaved RGB.
#[derive(Clone, Debug, PartialEq)]
pub struct WarpedPatch {
    pub width: usize,
    pub height: usize,
    pub color: Vec<f32>,
    pub coverage: Vec<bool>,
    /// Distance (in source pixels) from the sample point to the nearest
    /// uncovered source position; zero where `coverage` is false.
    pub edge_distance: Vec<f32>,
}

impl WarpedPatch {
    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            color: vec![0.0; width * height * 3],
            coverage: vec![false; width * height],
            edge_distance: vec![0.0; width * height],
        }
    }

    pub fn covered_pixels(&self) -> usize {
        self.coverage.iter().filter(|&&c| c).count()
    }

    #[inline]
    pub fn rgb(&self, idx: usize) -> [f32; 3] {
        [
            self.color[idx * 3],
            self.color[idx * 3 + 1],
            self.color[idx * 3 + 2],
        ]
    }
}

/// Warp `src` into the canvas region `[origin_x, origin_x + width) × [origin_y, origin_y + height)`.
///
/// `src_from_canvas` maps integer canvas coordinates to source coordinates. A
/// canvas pixel is covered when its source position lies strictly inside the
/// half-pixel-extended source rectangle. Each output pixel depends only on its
/// absolute canvas coordinate, so any tiling of the canvas produces the same values.
pub fn warp_rgb_roi(
    src: &RgbImage,
    src_from_canvas: &Homography,
    origin_x: usize,
    origin_y: usize,
    width: usize,
    height: usize,
) -> WarpedPatch {
    let mut patch = WarpedPatch::empty(width, height);
    if src.is_empty() {
        return patch;
    }
    let sw = src.width as f64;
    let sh = src.height as f64;

    for y in 0..height {
        let cy = (origin_y + y) as f64;
        for x in 0..width {
            let cx = (origin_x + x) as f64;
            let Some(p) = src_from_canvas.try_apply(Point2::new(cx, cy)) else {
                continue;
            };
            let d = (p.x + 0.5)
                .min(sw - 0.5 - p.x)
                .min(p.y + 0.5)
                .min(sh - 0.5 - p.y);
            if !(d > 0.0) {
                continue;
            }
            let idx = y * width + x;
            let rgb = sample_rgb_clamped(src, p.x, p.y);
            patch.color[idx * 3..idx * 3 + 3].copy_from_slice(&rgb);
            patch.coverage[idx] = true;
            patch.edge_distance[idx] = d as f32;
        }
    }
    patch
}
