//! Separable smoothing, gradients and the detection pyramid.

use panostitch_core::{resize_bilinear, GrayImage, GrayImageView};

use crate::keypoint::PyramidLevel;

/// Normalized 1D Gaussian taps with radius `ceil(3σ)`.
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    if !(sigma > 0.0) {
        return vec![1.0];
    }
    let radius = (3.0 * sigma).ceil() as i32;
    let denom = 2.0 * sigma * sigma;
    let mut taps: Vec<f32> = (-radius..=radius)
        .map(|i| (-(i * i) as f32 / denom).exp())
        .collect();
    let sum: f32 = taps.iter().sum();
    for t in &mut taps {
        *t /= sum;
    }
    taps
}

/// Separable convolution with edge clamping on a float plane.
pub fn convolve_separable(width: usize, height: usize, src: &[f32], taps: &[f32]) -> Vec<f32> {
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let r = (taps.len() / 2) as isize;
    let max_x = width as isize - 1;
    let max_y = height as isize - 1;

    let mut tmp = vec![0.0f32; width * height];
    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            let mut acc = 0.0;
            for (k, &t) in taps.iter().enumerate() {
                let sx = (x as isize + k as isize - r).clamp(0, max_x) as usize;
                acc += t * row[sx];
            }
            tmp[y * width + x] = acc;
        }
    }

    let mut out = vec![0.0f32; width * height];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, &t) in taps.iter().enumerate() {
                let sy = (y as isize + k as isize - r).clamp(0, max_y) as usize;
                acc += t * tmp[sy * width + x];
            }
            out[y * width + x] = acc;
        }
    }
    out
}

pub fn to_f32(src: &GrayImageView<'_>) -> Vec<f32> {
    src.data.iter().map(|&v| v as f32).collect()
}

/// Gaussian blur of an 8-bit image, rounded back to 8 bits.
pub fn gaussian_blur(src: &GrayImageView<'_>, sigma: f32) -> GrayImage {
    let taps = gaussian_kernel(sigma);
    let plane = convolve_separable(src.width, src.height, &to_f32(src), &taps);
    GrayImage {
        width: src.width,
        height: src.height,
        data: plane
            .into_iter()
            .map(|v| (v + 0.5).clamp(0.0, 255.0) as u8)
            .collect(),
    }
}

/// 3×3 Sobel gradients `(gx, gy)` with edge clamping.
pub fn sobel(width: usize, height: usize, src: &[f32]) -> (Vec<f32>, Vec<f32>) {
    let mut gx = vec![0.0f32; width * height];
    let mut gy = vec![0.0f32; width * height];
    if width == 0 || height == 0 {
        return (gx, gy);
    }
    let at = |x: isize, y: isize| -> f32 {
        let xc = x.clamp(0, width as isize - 1) as usize;
        let yc = y.clamp(0, height as isize - 1) as usize;
        src[yc * width + xc]
    };
    for y in 0..height as isize {
        for x in 0..width as isize {
            let dx = (at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2.0 * at(x - 1, y) + at(x - 1, y + 1));
            let dy = (at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2.0 * at(x, y - 1) + at(x + 1, y - 1));
            let i = y as usize * width + x as usize;
            gx[i] = dx;
            gy[i] = dy;
        }
    }
    (gx, gy)
}

/// Bilinear sample of a float plane with edge clamping.
#[inline]
pub fn sample_plane(width: usize, height: usize, plane: &[f32], x: f32, y: f32) -> f32 {
    let x = x.clamp(0.0, (width - 1) as f32);
    let y = y.clamp(0.0, (height - 1) as f32);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let a = plane[y0 * width + x0] + fx * (plane[y0 * width + x1] - plane[y0 * width + x0]);
    let b = plane[y1 * width + x0] + fx * (plane[y1 * width + x1] - plane[y1 * width + x0]);
    a + fy * (b - a)
}

/// Downscaled copies of `base`, each level `scale` times smaller than the previous.
///
/// Stops early once a level would be smaller than `min_side` on either axis.
pub fn build_pyramid(base: &GrayImage, levels: usize, scale: f32, min_side: usize) -> Vec<PyramidLevel> {
    let mut out = Vec::with_capacity(levels);
    if base.width < min_side || base.height < min_side || levels == 0 {
        return out;
    }
    out.push(PyramidLevel {
        image: base.clone(),
        scale_x: 1.0,
        scale_y: 1.0,
    });
    for l in 1..levels {
        let f = scale.powi(l as i32);
        let w = (base.width as f32 / f).round() as usize;
        let h = (base.height as f32 / f).round() as usize;
        if w < min_side || h < min_side {
            break;
        }
        let image = resize_bilinear(&base.view(), w, h);
        out.push(PyramidLevel {
            image,
            scale_x: base.width as f32 / w as f32,
            scale_y: base.height as f32 / h as f32,
        });
    }
    out
}
