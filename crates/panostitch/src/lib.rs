//! Panorama stitching from overlapping photographs.
//!
//! This is the facade crate of the `panostitch-*` workspace. It re-exports the
//! stage crates and adds the orchestration around them:
//!
//! - [`Stitcher`]: runs matching, graph registration, optional exposure
//!   compensation, canvas planning and tiled blending on its own worker pool,
//! - [`StitchConfig`]: every run option, loadable from JSON,
//! - [`AlignmentStore`]: the persisted image-to-reference transforms, so a
//!   later run can re-blend without matching again,
//! - [`Diagnostics`]: registered/unregistered images, accepted and rejected
//!   pairs, canvas, exposure gains and tile statistics.
//!
//! ## Quickstart
//!
//! ```no_run
//! use panostitch::{io, StitchConfig, Stitcher};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let images = io::load_images(&["left.jpg", "middle.jpg", "right.jpg"])?;
//! let stitcher = Stitcher::new(StitchConfig::default())?;
//! let out = stitcher.run(&images)?;
//! println!("unregistered: {:?}", out.diagnostics.unregistered);
//! io::save_image(&out.canvas, "panorama.png")?;
//! out.store.write_json("alignment.json")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `panostitch::core`: pixel buffers, homographies, ROI warp, logger.
//! - `panostitch::features`: detectors, ratio matching, RANSAC, pair matcher.
//! - `panostitch::align`: alignment graph and shortest-path composition.
//! - `panostitch::blend`: exposure, canvas planning, tiled blending.
//! - `panostitch::io` (feature `image`): file decoding/encoding.

pub use panostitch_align as align;
pub use panostitch_blend as blend;
pub use panostitch_core as core;
pub use panostitch_features as features;

pub use panostitch_blend::{BlendMode, BlendParams, ExposureParams, WeightField};
pub use panostitch_core::{RgbImage, SourceImage};
pub use panostitch_features::{DetectorKind, MatchParams};

mod config;
mod diagnostics;
mod error;
mod stitcher;
mod store;

#[cfg(feature = "image")]
pub mod io;

pub use config::StitchConfig;
pub use diagnostics::{Diagnostics, EdgeReport, ImageReport, RejectedPair};
pub use error::StitchError;
pub use stitcher::{Alignment, StitchOutput, Stitcher};
pub use store::{AlignmentStore, StoreEntry, STORE_VERSION};
