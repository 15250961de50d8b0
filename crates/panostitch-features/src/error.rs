use panostitch_core::HomographyError;

/// Why a candidate image pair did not produce a usable homography.
///
/// Always recoverable: the pair is dropped and the run continues.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MatchRejection {
    #[error("too few keypoints ({found} < {required})")]
    TooFewKeypoints { found: usize, required: usize },
    #[error("too few ratio-test matches ({found} < {required})")]
    TooFewMatches { found: usize, required: usize },
    #[error("robust estimation found no valid homography")]
    EstimationFailed,
    #[error("too few inliers ({found} < {required})")]
    TooFewInliers { found: usize, required: usize },
    #[error("inlier ratio {ratio:.3} below {required:.3}")]
    LowInlierRatio { ratio: f32, required: f32 },
    #[error("degenerate homography: {0}")]
    Degenerate(#[from] HomographyError),
}
