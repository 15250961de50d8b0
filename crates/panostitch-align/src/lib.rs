//! Global registration from pairwise matches.
//!
//! [`AlignmentGraphBuilder`] turns accepted pairwise matches into a directed
//! graph weighted by `1 / max(1, inliers)`. [`compose_global_transforms`] picks
//! (or accepts) a reference image and runs Dijkstra over the reversed graph to
//! compose one image-to-reference homography per reachable image.

mod compose;
mod graph;

pub use compose::{compose_global_transforms, ComposeError, GlobalTransforms, RegisteredImage};
pub use graph::{AlignmentGraph, AlignmentGraphBuilder, CorrespondenceEdge, NodeStats};
