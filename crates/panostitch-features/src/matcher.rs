//! Brute-force two-nearest-neighbor matching with Lowe's ratio test.

use rayon::prelude::*;

use crate::brief::hamming;
use crate::descriptor::Descriptors;
use crate::gradient::l2_squared;

/// A surviving correspondence `query[query] ↔ train[train]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DescriptorMatch {
    pub query: usize,
    pub train: usize,
    pub distance: f32,
}

/// Two smallest distances from `query` into `train`: `(best_index, best, second)`.
///
/// Ties keep the lower train index as best.
fn two_nearest<T, F>(query: &T, train: &[T], dist: F) -> Option<(usize, f32, f32)>
where
    F: Fn(&T, &T) -> f32,
{
    if train.len() < 2 {
        return None;
    }
    let mut best = (usize::MAX, f32::INFINITY);
    let mut second = f32::INFINITY;
    for (i, t) in train.iter().enumerate() {
        let d = dist(query, t);
        if d < best.1 {
            second = best.1;
            best = (i, d);
        } else if d < second {
            second = d;
        }
    }
    Some((best.0, best.1, second))
}

fn ratio_match_with<T, F>(query: &[T], train: &[T], ratio: f32, dist: F) -> Vec<DescriptorMatch>
where
    T: Sync,
    F: Fn(&T, &T) -> f32 + Sync,
{
    query
        .par_iter()
        .enumerate()
        .filter_map(|(qi, q)| {
            let (ti, best, second) = two_nearest(q, train, &dist)?;
            (best < ratio * second).then_some(DescriptorMatch {
                query: qi,
                train: ti,
                distance: best,
            })
        })
        .collect()
}

/// Keep each query's nearest neighbor only when it is clearly better than the runner-up.
///
/// A query needs at least two train descriptors to be judged; descriptors of
/// different kinds never match.
pub fn ratio_match(query: &Descriptors, train: &Descriptors, ratio: f32) -> Vec<DescriptorMatch> {
    match (query, train) {
        (Descriptors::Binary(q), Descriptors::Binary(t)) => {
            ratio_match_with(q, t, ratio, |a, b| hamming(a, b) as f32)
        }
        (Descriptors::Float(q), Descriptors::Float(t)) => {
            ratio_match_with(q, t, ratio, |a, b| l2_squared(a, b).sqrt())
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::FLOAT_DIM;

    #[test]
    fn unambiguous_binary_matches_survive() {
        let q = vec![[0u64, 0, 0, 0], [u64::MAX, 0, 0, 0]];
        let t = vec![
            [u64::MAX, 0, 0, 1],
            [0u64, 0, 0, 0],
            [0u64, u64::MAX, u64::MAX, 0],
        ];
        let m = ratio_match(&Descriptors::Binary(q), &Descriptors::Binary(t), 0.75);
        assert_eq!(m.len(), 2);
        assert_eq!((m[0].query, m[0].train, m[0].distance), (0, 1, 0.0));
        assert_eq!((m[1].query, m[1].train), (1, 0));
    }

    #[test]
    fn ambiguous_matches_are_rejected() {
        let q = vec![[0b1u64, 0, 0, 0]];
        let t = vec![[0b11u64, 0, 0, 0], [0b101u64, 0, 0, 0]];
        let m = ratio_match(&Descriptors::Binary(q), &Descriptors::Binary(t), 0.75);
        assert!(m.is_empty());
    }

    #[test]
    fn single_train_descriptor_cannot_pass_ratio_test() {
        let q = vec![[0u64; 4]];
        let t = vec![[0u64; 4]];
        assert!(ratio_match(&Descriptors::Binary(q), &Descriptors::Binary(t), 0.75).is_empty());
    }

    #[test]
    fn float_descriptors_use_euclidean_distance() {
        let mut a = [0.0f32; FLOAT_DIM];
        a[0] = 1.0;
        let mut b = [0.0f32; FLOAT_DIM];
        b[1] = 1.0;
        let mut near_a = a;
        near_a[2] = 0.1;
        let m = ratio_match(
            &Descriptors::Float(vec![near_a]),
            &Descriptors::Float(vec![b, a]),
            0.75,
        );
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].train, 1);
        assert!((m[0].distance - 0.1).abs() < 1e-6);
    }

    #[test]
    fn mixed_kinds_do_not_match() {
        let m = ratio_match(
            &Descriptors::Binary(vec![[0; 4]; 3]),
            &Descriptors::Float(vec![[0.0; FLOAT_DIM]; 3]),
            0.75,
        );
        assert!(m.is_empty());
    }
}
