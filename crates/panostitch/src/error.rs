use panostitch_align::ComposeError;
use panostitch_blend::CanvasError;

/// The single fatal error a stitching run can end with.
///
/// Per-pair, per-image and per-tile problems are never reported here; they are
/// recorded in [`Diagnostics`](crate::Diagnostics) and the run continues.
#[derive(thiserror::Error, Debug)]
pub enum StitchError {
    #[error("need at least two input images, got {count}")]
    TooFewImages { count: usize },

    #[error("reference image {index} out of range for {count} images")]
    InvalidReference { index: usize, count: usize },

    #[error("no image could be registered to reference {reference} ({unregistered} left unregistered)")]
    Disconnected { reference: usize, unregistered: usize },

    #[error(transparent)]
    InvalidCanvas(#[from] CanvasError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("alignment store does not match the input images: {0}")]
    StoreMismatch(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "image")]
    #[error(transparent)]
    Image(#[from] ::image::ImageError),
}

impl From<ComposeError> for StitchError {
    fn from(err: ComposeError) -> Self {
        match err {
            ComposeError::EmptyGraph => StitchError::TooFewImages { count: 0 },
            ComposeError::InvalidReference { index, count } => {
                StitchError::InvalidReference { index, count }
            }
        }
    }
}
