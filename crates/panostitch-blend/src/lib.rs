//! Canvas planning and tiled blending for panorama stitching.
//!
//! Given a [`GlobalTransforms`](panostitch_align::GlobalTransforms) table this
//! crate:
//!
//! - optionally fits a per-image linear exposure correction against the
//!   reference ([`compensate_exposure`]),
//! - computes the output canvas and every image's final transform
//!   ([`plan_canvas`]),
//! - splits the canvas into a strict tile partition and warps/blends each tile
//!   independently on the rayon pool ([`blend_tiles`]).
//!
//! Only the tile-sized region of each source is ever resampled, so peak memory
//! is bounded by the tile size and the per-tile candidate cap rather than by
//! the canvas size.

mod blend;
mod canvas;
pub mod distance;
mod engine;
mod exposure;
pub mod pyramid;
mod tiles;

pub use blend::{
    blend_distance, blend_multiband, copy_patch, effective_levels, weight_map, BlendMode,
    BlendParams, WeightField,
};
pub use canvas::{plan_canvas, CanvasError, CanvasPlan, CanvasSummary, ImagePlacement, MAX_CANVAS_SIDE};
pub use engine::{
    blend_tiles, process_tile, select_candidates, BlendOutput, BlendStats, DegradedTile,
    TileError, TileOutput,
};
pub use exposure::{
    apply_gain, compensate_exposure, estimate_gains, ExposureGain, ExposureOutcome,
    ExposureParams, GainStatus,
};
pub use tiles::{Tile, TileGrid};
