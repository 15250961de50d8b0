use nalgebra::{DMatrix, Matrix2, Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Reasons a 3×3 matrix is rejected as a usable planar homography.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HomographyError {
    #[error("homography has non-finite entries")]
    NonFinite,
    #[error("homography is singular (|det| = {det:e})")]
    Singular { det: f64 },
    #[error("homography scale factor {scale:.4} outside [1/{max_scale}, {max_scale}]")]
    ScaleOutOfBounds { scale: f64, max_scale: f64 },
}

/// Acceptance limits for estimated homographies.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomographyLimits {
    /// Minimal `|det(H)|` after normalizing `h33 = 1`.
    pub min_abs_det: f64,
    /// Maximal isotropic scale `sqrt|det(A)|` of the upper-left 2×2 block
    /// (and its reciprocal as the lower bound).
    pub max_scale: f64,
}

impl Default for HomographyLimits {
    fn default() -> Self {
        Self {
            min_abs_det: 1e-8,
            max_scale: 8.0,
        }
    }
}

/// A 3×3 projective transform `p_dst ~ H * p_src`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(Matrix3::new(
            1.0, 0.0, tx, //
            0.0, 1.0, ty, //
            0.0, 0.0, 1.0,
        ))
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        Point2::new(v[0] / w, v[1] / w)
    }

    /// Map a point, returning `None` when it lands on or behind the line at infinity.
    #[inline]
    pub fn try_apply(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        if !(w > 1e-12) {
            return None;
        }
        let q = Point2::new(v[0] / w, v[1] / w);
        (q.x.is_finite() && q.y.is_finite()).then_some(q)
    }

    /// The same mapping between frames whose pixel coordinates are both scaled by `s`.
    pub fn rescaled(&self, s: f64) -> Self {
        let scale = Matrix3::new(s, 0.0, 0.0, 0.0, s, 0.0, 0.0, 0.0, 1.0);
        let unscale = Matrix3::new(1.0 / s, 0.0, 0.0, 0.0, 1.0 / s, 0.0, 0.0, 0.0, 1.0);
        Self::new(scale * self.h * unscale)
    }

    /// Exact matrix inverse (not rescaled).
    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    /// Scale so that `h33 = 1`.
    pub fn normalized(&self) -> Option<Self> {
        normalize_homography(self.h).map(Self::new)
    }

    /// Check that `H` is finite, non-singular, and within the configured scale bounds.
    pub fn validate(&self, limits: &HomographyLimits) -> Result<(), HomographyError> {
        if self.h.iter().any(|v| !v.is_finite()) {
            return Err(HomographyError::NonFinite);
        }
        let n = self.normalized().ok_or(HomographyError::Singular { det: 0.0 })?;
        let det = n.h.determinant();
        if !det.is_finite() || det.abs() < limits.min_abs_det {
            return Err(HomographyError::Singular { det });
        }
        let a = Matrix2::new(n.h[(0, 0)], n.h[(0, 1)], n.h[(1, 0)], n.h[(1, 1)]);
        let scale = a.determinant().abs().sqrt();
        if !(scale >= 1.0 / limits.max_scale && scale <= limits.max_scale) {
            return Err(HomographyError::ScaleOutOfBounds {
                scale,
                max_scale: limits.max_scale,
            });
        }
        Ok(())
    }
}

/// `a * b` maps through `b` first, then `a`.
impl Mul for Homography {
    type Output = Homography;

    fn mul(self, rhs: Homography) -> Homography {
        Homography::new(self.h * rhs.h)
    }
}

/// Euclidean distance between `H(src)` and `dst`; infinite for points at infinity.
pub fn reprojection_error(h: &Homography, src: Point2<f64>, dst: Point2<f64>) -> f64 {
    match h.try_apply(src) {
        Some(p) => ((p.x - dst.x).powi(2) + (p.y - dst.y).powi(2)).sqrt(),
        None => f64::INFINITY,
    }
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    // Hartley normalization: translate to centroid, scale so mean distance = sqrt(2)
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let t = hartley_normalization(cx, cy, mean_dist);
    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x, p.y, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    (out, t)
}

fn normalize_homography(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    if s.abs() < 1e-12 || !s.is_finite() {
        return None;
    }
    Some(h / s)
}

fn denormalize_homography(
    hn: Matrix3<f64>,
    t_src: Matrix3<f64>,
    t_dst: Matrix3<f64>,
) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    Some(t_dst_inv * hn * t_src)
}

/// Estimate `H` such that `dst ~ H * src` from ≥ 4 correspondences (normalized DLT).
pub fn estimate_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }

    if src.len() == 4 {
        let s: &[Point2<f64>; 4] = src.try_into().ok()?;
        let d: &[Point2<f64>; 4] = dst.try_into().ok()?;
        return homography_from_4pt(s, d);
    }

    let (s, ts) = normalize_points(src);
    let (d, td) = normalize_points(dst);

    // Build A (2N x 9)
    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);

    for k in 0..n {
        let x = s[k].x;
        let y = s[k].y;
        let u = d[k].x;
        let v = d[k].y;

        // [ -x -y -1   0  0  0   u*x u*y u ]
        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        // [ 0  0  0  -x -y -1   v*x v*y v ]
        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    // Solve Ah = 0 -> h is right singular vector with smallest singular value
    let svd = a.svd(true, true);
    let vt = svd.v_t?;
    let last = vt.nrows().checked_sub(1)?;
    let h = vt.row(last);

    let hn =
        Matrix3::<f64>::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);

    // Denormalize: H = Td^{-1} * Hn * Ts
    let h_den = denormalize_homography(hn, ts, td)?;
    let h_den = normalize_homography(h_den)?;

    h_den
        .iter()
        .all(|v| v.is_finite())
        .then_some(Homography::new(h_den))
}

/// Compute `H` such that `dst ~ H * src` from exactly 4 correspondences.
///
/// Returns `None` for degenerate (e.g. collinear) configurations.
pub fn homography_from_4pt(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Homography> {
    // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], with h33 = 1
    // For each correspondence (x,y)->(u,v):
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = normalize_points(src);
    let (dst_n, t_dst) = normalize_points(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let x = src_n[k].x;
        let y = src_n[k].y;
        let u = dst_n[k].x;
        let v = dst_n[k].y;

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    let h_den = denormalize_homography(hn, t_src, t_dst)?;
    let h_den = normalize_homography(h_den)?;

    h_den
        .iter()
        .all(|v| v.is_finite())
        .then_some(Homography::new(h_den))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_close(a: Point2<f64>, b: Point2<f64>, tol: f64) {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        assert!(
            dx < tol && dy < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    fn perspective() -> Homography {
        Homography::new(Matrix3::new(
            1.2, 0.1, 5.0, //
            -0.05, 0.9, 3.0, //
            0.001, 0.0005, 1.0,
        ))
    }

    #[test]
    fn inverse_round_trips_points() {
        let h = perspective();
        let inv = h.inverse().expect("invertible");

        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(50.0, -20.0),
            Point2::new(320.0, 200.0),
        ] {
            let q = h.apply(p);
            let back = inv.apply(q);
            assert_close(back, p, 1e-9);
        }
    }

    #[test]
    fn composition_applies_right_operand_first() {
        let t = Homography::translation(10.0, -4.0);
        let h = perspective();
        let p = Point2::new(30.0, 40.0);
        assert_close((t * h).apply(p), t.apply(h.apply(p)), 1e-9);
    }

    #[test]
    fn four_point_specialization_recovers_h() {
        let ground_truth = Homography::new(Matrix3::new(
            0.8, 0.05, 120.0, //
            -0.02, 1.1, 80.0, //
            0.0009, -0.0004, 1.0,
        ));

        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(180.0, 0.0),
            Point2::new(180.0, 130.0),
            Point2::new(0.0, 130.0),
        ];
        let dst = src.map(|p| ground_truth.apply(p));

        let recovered = homography_from_4pt(&src, &dst).expect("recoverable");

        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(60.0, 40.0),
            Point2::new(150.0, 120.0),
        ] {
            assert_close(recovered.apply(p), ground_truth.apply(p), 1e-6);
        }
    }

    #[test]
    fn dlt_handles_overdetermined_case() {
        let ground_truth = Homography::new(Matrix3::new(
            1.0, 0.2, 12.0, //
            -0.1, 0.9, 6.0, //
            0.0006, 0.0004, 1.0,
        ));

        let src: Vec<Point2<f64>> = (0..3)
            .flat_map(|y| (0..3).map(move |x| Point2::new(x as f64 * 40.0, y as f64 * 50.0)))
            .collect();
        let dst: Vec<Point2<f64>> = src.iter().map(|&p| ground_truth.apply(p)).collect();

        let estimated = estimate_homography(&src, &dst).expect("estimate");
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(60.0, 40.0),
            Point2::new(80.0, 90.0),
        ] {
            assert_close(estimated.apply(p), ground_truth.apply(p), 1e-6);
        }
    }

    #[test]
    fn mismatched_input_lengths_fail() {
        let src = [Point2::new(0.0, 0.0); 4];
        let dst = [Point2::new(1.0, 1.0); 3];
        assert!(estimate_homography(&src, &dst).is_none());
    }

    #[test]
    fn validation_rejects_degenerate_matrices() {
        let limits = HomographyLimits::default();
        assert!(Homography::identity().validate(&limits).is_ok());
        assert!(perspective().validate(&limits).is_ok());

        let mut nan = Homography::identity();
        nan.h[(0, 1)] = f64::NAN;
        assert_eq!(nan.validate(&limits), Err(HomographyError::NonFinite));

        let singular = Homography::new(Matrix3::new(1.0, 2.0, 0.0, 2.0, 4.0, 0.0, 0.0, 0.0, 1.0));
        assert!(matches!(
            singular.validate(&limits),
            Err(HomographyError::Singular { .. })
        ));

        let blown_up = Homography::new(Matrix3::new(20.0, 0.0, 0.0, 0.0, 20.0, 0.0, 0.0, 0.0, 1.0));
        assert!(matches!(
            blown_up.validate(&limits),
            Err(HomographyError::ScaleOutOfBounds { .. })
        ));
    }

    #[test]
    fn array_round_trip_is_exact() {
        let h = perspective();
        let back = Homography::from_array(h.to_array());
        assert_eq!(h, back);
        assert_relative_eq!(back.h[(2, 0)], 0.001);
    }

    #[test]
    fn rescaled_maps_scaled_points() {
        let h = perspective();
        let half = h.rescaled(0.5);
        for p in [Point2::new(0.0, 0.0), Point2::new(120.0, 40.0), Point2::new(33.0, 71.0)] {
            let q = h.apply(p);
            let r = half.apply(Point2::new(p.x * 0.5, p.y * 0.5));
            assert_relative_eq!(r.x, q.x * 0.5, epsilon = 1e-9);
            assert_relative_eq!(r.y, q.y * 0.5, epsilon = 1e-9);
        }
        assert_eq!(Homography::identity().rescaled(0.25), Homography::identity());
    }

    #[test]
    fn try_apply_rejects_points_at_infinity() {
        let h = Homography::new(Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, -0.01, 0.0, 1.0));
        assert!(h.try_apply(Point2::new(100.0, 0.0)).is_none());
        assert!(h.try_apply(Point2::new(10.0, 0.0)).is_some());
    }
}
