//! FAST-9 segment-test corners with 3×3 non-maximum suppression.

use panostitch_core::GrayImageView;

/// Bresenham circle of radius 3, clockwise from 12 o'clock.
const CIRCLE: [(isize, isize); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

const ARC: usize = 9;

/// Segment-test score at `(x, y)`, or `None` when no 9-pixel arc is uniformly
/// brighter or darker than the center by more than `threshold`.
///
/// Score is the summed excess contrast of the winning side over the circle.
/// Caller guarantees the full circle is inside the image.
fn corner_score(img: &GrayImageView<'_>, x: usize, y: usize, threshold: u8) -> Option<f32> {
    let w = img.width as isize;
    let center = img.data[y * img.width + x] as i16;
    let t = threshold as i16;
    let base = y as isize * w + x as isize;

    let mut diffs = [0i16; 16];
    for (d, &(dx, dy)) in diffs.iter_mut().zip(CIRCLE.iter()) {
        *d = img.data[(base + dy * w + dx) as usize] as i16 - center;
    }

    // Any 9-arc covers at least two compass points.
    let compass_bright = [0, 4, 8, 12].iter().filter(|&&i| diffs[i] > t).count();
    let compass_dark = [0, 4, 8, 12].iter().filter(|&&i| diffs[i] < -t).count();
    if compass_bright < 2 && compass_dark < 2 {
        return None;
    }

    let longest_run = |pred: &dyn Fn(i16) -> bool| -> usize {
        let mut best = 0;
        let mut run = 0;
        for i in 0..32 {
            if pred(diffs[i % 16]) {
                run += 1;
                best = best.max(run);
            } else {
                run = 0;
            }
        }
        best.min(16)
    };

    let bright = longest_run(&|d| d > t) >= ARC;
    let dark = !bright && longest_run(&|d| d < -t) >= ARC;
    if !bright && !dark {
        return None;
    }
    let score = diffs
        .iter()
        .map(|&d| if bright { d - t } else { -d - t })
        .filter(|&e| e > 0)
        .map(|e| e as f32)
        .sum();
    Some(score)
}

/// Detect FAST-9 corners at least `border` pixels away from the image edges.
///
/// Returns `(x, y, score)` for local maxima of the score map. Equal scores are
/// resolved in favor of the earlier pixel in raster order.
pub fn fast_corners(img: &GrayImageView<'_>, threshold: u8, border: usize) -> Vec<(usize, usize, f32)> {
    let border = border.max(3);
    let (w, h) = (img.width, img.height);
    if w <= 2 * border || h <= 2 * border {
        return Vec::new();
    }

    let mut scores = vec![0.0f32; w * h];
    for y in border..h - border {
        for x in border..w - border {
            if let Some(s) = corner_score(img, x, y, threshold) {
                scores[y * w + x] = s;
            }
        }
    }

    let mut out = Vec::new();
    for y in border..h - border {
        for x in border..w - border {
            let s = scores[y * w + x];
            if s <= 0.0 {
                continue;
            }
            let mut is_max = true;
            'nbhd: for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let n = scores[((y as isize + dy) as usize) * w + (x as isize + dx) as usize];
                    let earlier = dy < 0 || (dy == 0 && dx < 0);
                    if n > s || (earlier && n == s) {
                        is_max = false;
                        break 'nbhd;
                    }
                }
            }
            if is_max {
                out.push((x, y, s));
            }
        }
    }
    out
}

/// Orientation from the intensity centroid of a disc of `radius` around `(x, y)`.
pub fn intensity_centroid_angle(img: &GrayImageView<'_>, x: usize, y: usize, radius: usize) -> f32 {
    let r = radius as isize;
    let mut m01 = 0.0f64;
    let mut m10 = 0.0f64;
    for dy in -r..=r {
        let span = (((r * r - dy * dy) as f64).sqrt()) as isize;
        let py = y as isize + dy;
        if py < 0 || py >= img.height as isize {
            continue;
        }
        for dx in -span..=span {
            let px = x as isize + dx;
            if px < 0 || px >= img.width as isize {
                continue;
            }
            let v = img.data[py as usize * img.width + px as usize] as f64;
            m10 += dx as f64 * v;
            m01 += dy as f64 * v;
        }
    }
    m01.atan2(m10) as f32
}
