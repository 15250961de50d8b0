use panostitch_align::GlobalTransforms;
use panostitch_blend::{
    apply_gain, blend_tiles, compensate_exposure, plan_canvas, BlendMode, BlendParams,
    ExposureParams, GainStatus, TileGrid, WeightField,
};
use panostitch_core::{Homography, RgbImage, SourceImage};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn textured(width: usize, height: usize, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let v = ((x * 5 + y * 3) % 180) as u8 + rng.gen_range(0..40u8);
            img.set_pixel(x, y, [v, 255 - v, v / 2 + 60]);
        }
    }
    img
}

fn crop(src: &RgbImage, x0: usize, width: usize) -> RgbImage {
    let mut out = RgbImage::new(width, src.height);
    for y in 0..src.height {
        for x in 0..width {
            out.set_pixel(x, y, src.pixel(x0 + x, y));
        }
    }
    out
}

fn pair() -> (Vec<SourceImage>, GlobalTransforms) {
    let scene = textured(260, 90, 3);
    let images = vec![
        SourceImage::new(0, "left", crop(&scene, 0, 160)),
        SourceImage::new(1, "right", crop(&scene, 100, 160)),
    ];
    let table =
        GlobalTransforms::from_table(0, 2, [(1, Homography::translation(100.0, 0.0))]).expect("table");
    (images, table)
}

fn sizes(images: &[SourceImage]) -> Vec<(usize, usize)> {
    images.iter().map(|i| (i.pixels.width, i.pixels.height)).collect()
}

#[test]
fn exact_overlap_reproduces_the_scene() {
    let (images, table) = pair();
    let plan = plan_canvas(&sizes(&images), &table).expect("plan");
    assert_eq!((plan.width, plan.height), (260, 90));
    let out = blend_tiles(&images, &plan, &BlendParams { tile_size: 64, ..BlendParams::default() });
    assert_eq!(out.canvas, textured(260, 90, 3));
    assert!(out.stats.blended_tiles > 0);
}

#[test]
fn halving_the_tile_size_keeps_every_pixel() {
    let (images, table) = pair();
    let plan = plan_canvas(&sizes(&images), &table).expect("plan");
    let params = BlendParams {
        tile_size: 50,
        ..BlendParams::default()
    };
    let a = blend_tiles(&images, &plan, &params);
    let b = blend_tiles(&images, &plan, &BlendParams { tile_size: 25, ..params });
    assert_eq!(a.canvas, b.canvas);
    assert_eq!(
        b.stats.tiles,
        TileGrid::new(plan.width, plan.height, 25).len()
    );
}

#[test]
fn exposure_correction_closes_the_brightness_gap() {
    let (mut images, table) = pair();
    images[1].pixels = apply_gain(&images[1].pixels, 0.75, 0.0);
    let out = compensate_exposure(
        &images,
        &table,
        &ExposureParams {
            enabled: true,
            ..ExposureParams::default()
        },
    );
    assert_eq!(out.gains[1].status, GainStatus::Applied);
    let before = (images[1].pixels.pixel(10, 10)[0] as i32 - images[0].pixels.pixel(110, 10)[0] as i32).abs();
    let after = (out.images[1].pixels.pixel(10, 10)[0] as i32 - images[0].pixels.pixel(110, 10)[0] as i32).abs();
    assert!(after < before, "{after} >= {before}");
    // inputs are left untouched
    assert_ne!(out.images[1].pixels, images[1].pixels);
}

#[test]
fn multiband_with_tile_mask_weights_covers_the_union() {
    let (images, table) = pair();
    let plan = plan_canvas(&sizes(&images), &table).expect("plan");
    let out = blend_tiles(
        &images,
        &plan,
        &BlendParams {
            mode: BlendMode::Multiband,
            weight_field: WeightField::TileMask,
            tile_size: 128,
            ..BlendParams::default()
        },
    );
    let scene = textured(260, 90, 3);
    let mut max_err = 0i32;
    for y in 0..90 {
        for x in 0..260 {
            let (a, b) = (out.canvas.pixel(x, y), scene.pixel(x, y));
            for c in 0..3 {
                max_err = max_err.max((a[c] as i32 - b[c] as i32).abs());
            }
        }
    }
    // identical content in the overlap: blending must not invent structure
    assert!(max_err <= 2, "max error {max_err}");
}
