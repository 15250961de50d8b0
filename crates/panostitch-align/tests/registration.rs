use approx::assert_abs_diff_eq;
use nalgebra::Point2;
use panostitch_align::{compose_global_transforms, AlignmentGraphBuilder};
use panostitch_core::Homography;
use panostitch_features::{DetectorKind, MatchRejection, PairOutcome, PairwiseMatch};

fn accepted(from: usize, to: usize, h: Homography, inliers: usize) -> PairOutcome {
    PairOutcome {
        from,
        to,
        result: Ok(PairwiseMatch {
            from,
            to,
            homography: h,
            inverse: h.inverse().expect("invertible"),
            matches: inliers * 2,
            inliers,
            detector: DetectorKind::Fast,
        }),
    }
}

fn rejected(from: usize, to: usize) -> PairOutcome {
    PairOutcome {
        from,
        to,
        result: Err(MatchRejection::TooFewInliers {
            found: 7,
            required: 20,
        }),
    }
}

/// A strip of five photos: 0-1-2 overlap, 3-4 overlap, nothing links the two groups.
fn strip() -> Vec<PairOutcome> {
    vec![
        accepted(0, 1, Homography::translation(-200.0, 0.0), 150),
        accepted(1, 2, Homography::translation(-210.0, 3.0), 90),
        rejected(0, 2),
        rejected(0, 3),
        rejected(1, 3),
        rejected(2, 3),
        rejected(0, 4),
        rejected(1, 4),
        rejected(2, 4),
        accepted(3, 4, Homography::translation(-180.0, 0.0), 400),
    ]
}

#[test]
fn clusters_resolve_to_their_own_reference() {
    let graph = AlignmentGraphBuilder::new(5).add_outcomes(&strip()).build();
    assert_eq!(graph.edges().len(), 6);

    // 3 and 4 carry the most inlier mass, so the heavier cluster wins by default
    let auto = compose_global_transforms(&graph, None).expect("compose");
    assert_eq!(auto.reference(), 3);
    assert_eq!(auto.registered(), vec![3, 4]);
    assert_eq!(auto.unregistered(), vec![0, 1, 2]);

    let fixed = compose_global_transforms(&graph, Some(1)).expect("compose");
    assert_eq!(fixed.registered(), vec![0, 1, 2]);
    assert_eq!(fixed.get(2).expect("2").path, Some(vec![2, 1]));

    // image 2's origin lands where 1 → 2 put it, expressed in 1's frame
    let q = fixed.transform(2).expect("2").apply(Point2::new(0.0, 0.0));
    assert_abs_diff_eq!(q.x, 210.0, epsilon = 1e-9);
    assert_abs_diff_eq!(q.y, -3.0, epsilon = 1e-9);
    let q = fixed.transform(0).expect("0").apply(Point2::new(0.0, 0.0));
    assert_abs_diff_eq!(q.x, -200.0, epsilon = 1e-9);
}

#[test]
fn stored_inverse_is_used_for_the_reverse_direction() {
    let graph = AlignmentGraphBuilder::new(5).add_outcomes(&strip()).build();
    let fwd = graph.edge(0, 1).expect("forward").homography;
    let back = graph.edge(1, 0).expect("reverse").homography;
    let round = back * fwd;
    for (i, row) in round.to_array().iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(v / round.to_array()[2][2], expected, epsilon = 1e-12);
        }
    }
}
