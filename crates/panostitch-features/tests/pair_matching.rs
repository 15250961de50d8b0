use nalgebra::Point2;
use panostitch_core::{Homography, RgbImage, SourceImage};
use panostitch_features::{
    extract_all, DetectorKind, ImageFeatures, MatchParams, MatchRejection, PairMatcher,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Smooth value noise with a few hard-edged rectangles on top.
fn scene(width: usize, height: usize, seed: u64) -> RgbImage {
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

fn crop(src: &RgbImage, x0: usize, width: usize) -> RgbImage {
    let mut out = RgbImage::new(width, src.height);
    for y in 0..src.height {
        for x in 0..width {
            out.set_pixel(x, y, src.pixel(x0 + x, y));
        }
    }
    out
}

fn overlapping_pair() -> Vec<SourceImage> {
    let full = scene(544, 240, 11);
    vec![
        SourceImage::new(0, "left.png", crop(&full, 0, 320)),
        SourceImage::new(1, "right.png", crop(&full, 224, 320)),
    ]
}

fn assert_translation(h: &Homography, dx: f64) {
    for p in [Point2::new(250.0, 40.0), Point2::new(300.0, 200.0), Point2::new(240.0, 120.0)] {
        let q = h.apply(p);
        assert!(
            (q.x - (p.x + dx)).abs() < 1.5 && (q.y - p.y).abs() < 1.5,
            "({:.2},{:.2}) -> ({:.2},{:.2})",
            p.x,
            p.y,
            q.x,
            q.y
        );
    }
}

#[test]
fn overlapping_crops_are_matched_with_fast_features() {
    let images = overlapping_pair();
    let params = MatchParams {
        fallback: false,
        ..MatchParams::default()
    };
    let features = extract_all(&images, &params);
    let matcher = PairMatcher::new(params);

    let m = matcher
        .match_pair(&features[0], &features[1])
        .expect("pair should match");
    assert_eq!((m.from, m.to), (0, 1));
    assert_eq!(m.detector, DetectorKind::Fast);
    assert!(m.inliers >= 20, "{} inliers", m.inliers);
    assert_translation(&m.homography, -224.0);

    let product = m.homography.h * m.inverse.h;
    for r in 0..3 {
        for c in 0..3 {
            let expected = if r == c { 1.0 } else { 0.0 };
            assert!((product[(r, c)] - expected).abs() < 1e-9);
        }
    }
    assert!(!features[0].has_features(DetectorKind::Accurate));
}

#[test]
fn accurate_strategy_matches_the_same_pair() {
    let images = overlapping_pair();
    let params = MatchParams {
        detector: DetectorKind::Accurate,
        ..MatchParams::default()
    };
    let features = extract_all(&images, &params);
    let m = PairMatcher::new(params)
        .match_pair(&features[0], &features[1])
        .expect("pair should match");
    assert_eq!(m.detector, DetectorKind::Accurate);
    assert_translation(&m.homography, -224.0);
}

#[test]
fn pair_matching_is_reproducible() {
    let images = overlapping_pair();
    let params = MatchParams::default();
    let features = extract_all(&images, &params);
    let matcher = PairMatcher::new(params);
    let a = matcher.match_pair(&features[0], &features[1]).expect("match");
    let b = matcher.match_pair(&features[0], &features[1]).expect("match");
    assert_eq!(a.homography, b.homography);
    assert_eq!(a.inliers, b.inliers);
}

#[test]
fn unrelated_images_are_rejected_not_fatal() {
    let a = SourceImage::new(0, "a.png", scene(320, 240, 1));
    let b = SourceImage::new(1, "b.png", scene(320, 240, 2));
    let params = MatchParams::default();
    let features = extract_all(&[a, b], &params);
    let outcomes = PairMatcher::new(params).match_all_pairs(&features);
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].result.is_err());
}

#[test]
fn featureless_images_report_too_few_keypoints() {
    let flat = |i| SourceImage::new(i, format!("flat{i}.png"), RgbImage::filled(120, 90, [90, 90, 90]));
    let params = MatchParams {
        fallback: false,
        ..MatchParams::default()
    };
    let features: Vec<ImageFeatures> = extract_all(&[flat(0), flat(1)], &params);
    let err = PairMatcher::new(params)
        .match_pair(&features[0], &features[1])
        .expect_err("flat images cannot match");
    assert!(matches!(err, MatchRejection::TooFewKeypoints { found: 0, .. }));
}
