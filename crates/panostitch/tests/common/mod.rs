#![allow(dead_code)]

use panostitch::{RgbImage, SourceImage};
use rand::{rngs::StdRng, Rng, SeedableRng};

pub const SCENE_WIDTH: usize = 544;
pub const SCENE_HEIGHT: usize = 240;
pub const CROP_WIDTH: usize = 320;
/// Offset of the right crop; the two crops overlap by 96 px (30%).
pub const RIGHT_OFFSET: usize = 224;

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Smooth value noise with hard-edged rectangles on top.
pub fn scene(width: usize, height: usize, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let cell = 6usize;
    let gw = width / cell + 2;
    let gh = height / cell + 2;
    let grid: Vec<f32> = (0..gw * gh).map(|_| rng.gen_range(0.0..255.0)).collect();

    let mut gray = vec![0.0f32; width * height];
    for y in 0..height {
        let fy = y as f32 / cell as f32;
        let y0 = fy.floor() as usize;
        let ty = fy - y0 as f32;
        for x in 0..width {
            let fx = x as f32 / cell as f32;
            let x0 = fx.floor() as usize;
            let tx = fx - x0 as f32;
            let g = |i: usize, j: usize| grid[j * gw + i];
            let a = g(x0, y0) + tx * (g(x0 + 1, y0) - g(x0, y0));
            let b = g(x0, y0 + 1) + tx * (g(x0 + 1, y0 + 1) - g(x0, y0 + 1));
            gray[y * width + x] = a + ty * (b - a);
        }
    }
    for _ in 0..60 {
        let x0 = rng.gen_range(0..width);
        let y0 = rng.gen_range(0..height);
        let rw = rng.gen_range(5..30);
        let rh = rng.gen_range(5..30);
        let v = rng.gen_range(0.0..255.0);
        for y in y0..(y0 + rh).min(height) {
            for x in x0..(x0 + rw).min(width) {
                gray[y * width + x] = v;
            }
        }
    }

    let mut img = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let v = gray[y * width + x];
            img.set_pixel(x, y, [v as u8, (v * 0.7 + 40.0) as u8, (255.0 - v) as u8]);
        }
    }
    img
}

pub fn crop(src: &RgbImage, x0: usize, width: usize) -> RgbImage {
    let mut out = RgbImage::new(width, src.height);
    for y in 0..src.height {
        for x in 0..width {
            out.set_pixel(x, y, src.pixel(x0 + x, y));
        }
    }
    out
}

pub fn full_scene() -> RgbImage {
    scene(SCENE_WIDTH, SCENE_HEIGHT, 11)
}

pub fn overlapping_pair() -> Vec<SourceImage> {
    let full = full_scene();
    vec![
        SourceImage::new(0, "left.png", crop(&full, 0, CROP_WIDTH)),
        SourceImage::new(1, "right.png", crop(&full, RIGHT_OFFSET, CROP_WIDTH)),
    ]
}

/// A picture sharing nothing with [`full_scene`].
pub fn unrelated(index: usize) -> SourceImage {
    SourceImage::new(index, "unrelated.png", scene(CROP_WIDTH, SCENE_HEIGHT, 99))
}

pub fn scale_brightness(img: &RgbImage, factor: f32) -> RgbImage {
    let data = img
        .data
        .iter()
        .map(|&v| (v as f32 * factor).round().clamp(0.0, 255.0) as u8)
        .collect();
    RgbImage::from_raw(img.width, img.height, data).expect("same size")
}
