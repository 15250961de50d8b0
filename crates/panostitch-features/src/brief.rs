//! Steered BRIEF: 256 intensity comparisons rotated by the keypoint angle.

use std::sync::OnceLock;

use panostitch_core::{sample_bilinear, GrayImageView};
use rand::{rngs::StdRng, Rng, SeedableRng};

pub const BRIEF_BITS: usize = 256;
/// Sampling pairs lie inside a disc of this radius (level pixels).
pub const PATCH_RADIUS: f32 = 13.0;

const PATTERN_SEED: u64 = 0x5EED_B41E_F000_0256;

pub type BinaryDescriptor = [u64; BRIEF_BITS / 64];

#[derive(Clone, Debug)]
pub struct BriefPattern {
    pairs: Vec<[(f32, f32); 2]>,
}

impl BriefPattern {
    /// Random test pairs drawn uniformly from the patch disc.
    pub fn generate(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut point = move || loop {
            let x = rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS);
            let y = rng.gen_range(-PATCH_RADIUS..=PATCH_RADIUS);
            if x * x + y * y <= PATCH_RADIUS * PATCH_RADIUS {
                return (x, y);
            }
        };
        let pairs = (0..BRIEF_BITS).map(|_| [point(), point()]).collect();
        Self { pairs }
    }

    /// Shared pattern used by every extractor so descriptors are comparable.
    pub fn standard() -> &'static BriefPattern {
        static PATTERN: OnceLock<BriefPattern> = OnceLock::new();
        PATTERN.get_or_init(|| BriefPattern::generate(PATTERN_SEED))
    }

    /// Describe the smoothed patch at `(x, y)` rotated by `angle`.
    pub fn describe(&self, smoothed: &GrayImageView<'_>, x: f32, y: f32, angle: f32) -> BinaryDescriptor {
        let (s, c) = angle.sin_cos();
        let mut d = [0u64; BRIEF_BITS / 64];
        for (i, [(x1, y1), (x2, y2)]) in self.pairs.iter().copied().enumerate() {
            let v1 = sample_bilinear(smoothed, x + c * x1 - s * y1, y + s * x1 + c * y1);
            let v2 = sample_bilinear(smoothed, x + c * x2 - s * y2, y + s * x2 + c * y2);
            if v1 < v2 {
                d[i / 64] |= 1u64 << (i % 64);
            }
        }
        d
    }
}

#[inline]
pub fn hamming(a: &BinaryDescriptor, b: &BinaryDescriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use panostitch_core::GrayImage;

    fn textured(w: usize, h: usize) -> GrayImage {
        let data = (0..w * h)
            .map(|i| {
                let (x, y) = (i % w, i / w);
                ((x * 37 + y * 91 + (x * y) % 13 * 17) % 256) as u8
            })
            .collect();
        GrayImage {
            width: w,
            height: h,
            data,
        }
    }

    #[test]
    fn pattern_is_deterministic_and_inside_disc() {
        let a = BriefPattern::generate(7);
        let b = BriefPattern::generate(7);
        assert_eq!(a.pairs, b.pairs);
        assert_eq!(a.pairs.len(), BRIEF_BITS);
        for [(x1, y1), (x2, y2)] in &a.pairs {
            assert!(x1 * x1 + y1 * y1 <= PATCH_RADIUS * PATCH_RADIUS + 1e-3);
            assert!(x2 * x2 + y2 * y2 <= PATCH_RADIUS * PATCH_RADIUS + 1e-3);
        }
    }

    #[test]
    fn identical_patches_have_zero_distance() {
        let img = textured(64, 64);
        let p = BriefPattern::standard();
        let d1 = p.describe(&img.view(), 30.0, 30.0, 0.3);
        let d2 = p.describe(&img.view(), 30.0, 30.0, 0.3);
        assert_eq!(hamming(&d1, &d2), 0);
        let d3 = p.describe(&img.view(), 20.0, 41.0, 0.3);
        assert!(hamming(&d1, &d3) > 0);
    }

    #[test]
    fn hamming_counts_bits() {
        let a = [0u64, 0, 0, 0];
        let b = [0b1011u64, 0, 1, u64::MAX];
        assert_eq!(hamming(&a, &b), 3 + 1 + 64);
    }
}
