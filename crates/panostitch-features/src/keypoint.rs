/// A detected interest point in base-image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// Orientation in radians, measured in the pyramid level it was detected in.
    pub angle: f32,
    /// Detector response; larger is stronger.
    pub response: f32,
    /// Pyramid level index (0 = full resolution).
    pub level: u8,
}

/// One level of a detection pyramid.
#[derive(Clone, Debug)]
pub struct PyramidLevel {
    pub image: panostitch_core::GrayImage,
    /// Ratio `base_width / level_width`.
    pub scale_x: f32,
    /// Ratio `base_height / level_height`.
    pub scale_y: f32,
}

impl PyramidLevel {
    /// Map level pixel coordinates back to the base image (pixel-center aligned).
    #[inline]
    pub fn to_base(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x + 0.5) * self.scale_x - 0.5,
            (y + 0.5) * self.scale_y - 0.5,
        )
    }
}

/// Split a feature budget over `levels` pyramid levels, geometrically by `scale`.
///
/// The shares sum to `total`; level 0 gets the largest share.
pub fn distribute_budget(total: usize, levels: usize, scale: f32) -> Vec<usize> {
    if levels == 0 {
        return Vec::new();
    }
    let factor = 1.0 / scale.max(1.0 + f32::EPSILON);
    let denom: f32 = (0..levels).map(|l| factor.powi(l as i32)).sum();
    let mut shares: Vec<usize> = (0..levels)
        .map(|l| (total as f32 * factor.powi(l as i32) / denom).floor() as usize)
        .collect();
    let assigned: usize = shares.iter().sum();
    shares[0] += total.saturating_sub(assigned);
    shares
}

/// Keep the `n` strongest candidates, breaking ties by raster order.
pub(crate) fn retain_strongest(candidates: &mut Vec<(usize, usize, f32)>, n: usize) {
    candidates.sort_by(|a, b| {
        b.2.total_cmp(&a.2)
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.0.cmp(&b.0))
    });
    candidates.truncate(n);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_sums_to_total_and_decreases() {
        let shares = distribute_budget(5000, 4, 1.2);
        assert_eq!(shares.iter().sum::<usize>(), 5000);
        assert!(shares.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn strongest_candidates_are_stable_on_ties() {
        let mut c = vec![(5, 1, 3.0), (2, 1, 3.0), (0, 0, 1.0), (9, 9, 7.0)];
        retain_strongest(&mut c, 3);
        assert_eq!(c, vec![(9, 9, 7.0), (2, 1, 3.0), (5, 1, 3.0)]);
    }
}
