use std::borrow::Cow;

use log::{info, warn};
use panostitch_align::{compose_global_transforms, AlignmentGraphBuilder, GlobalTransforms};
use panostitch_blend::{blend_tiles, compensate_exposure, plan_canvas, ExposureOutcome};
use panostitch_core::{downsample_area, RgbImage, SourceImage};
use panostitch_features::{extract_all, PairMatcher};
use rayon::{ThreadPool, ThreadPoolBuilder};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{AlignmentStore, Diagnostics, StitchConfig, StitchError};

/// Registration result: everything needed to blend later.
#[derive(Clone, Debug)]
pub struct Alignment {
    pub transforms: GlobalTransforms,
    pub store: AlignmentStore,
    pub diagnostics: Diagnostics,
}

/// A composed panorama.
#[derive(Clone, Debug)]
pub struct StitchOutput {
    pub canvas: RgbImage,
    pub store: AlignmentStore,
    pub diagnostics: Diagnostics,
}

/// Sequences matching, global registration, exposure compensation, canvas
/// planning and tiled blending on a dedicated rayon pool.
///
/// Input images must be given in index order (`images[i].index == i`).
#[derive(Clone, Debug)]
pub struct Stitcher {
    config: StitchConfig,
}

impl Stitcher {
    pub fn new(config: StitchConfig) -> Result<Self, StitchError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &StitchConfig {
        &self.config
    }

    /// Full pipeline.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(images = images.len(), mode = %self.config.blend.mode))
    )]
    pub fn run(&self, images: &[SourceImage]) -> Result<StitchOutput, StitchError> {
        self.pool()?.install(|| {
            let alignment = self.align_images(images)?;
            self.blend_images(images, &alignment.transforms, alignment.store, alignment.diagnostics)
        })
    }

    /// Matching and registration only.
    pub fn align(&self, images: &[SourceImage]) -> Result<Alignment, StitchError> {
        self.pool()?.install(|| self.align_images(images))
    }

    /// Re-blend with transforms from a previous run; no matching is done.
    ///
    /// The configured reference and matching options are ignored, the store's
    /// reference is used for exposure compensation. A store that registers
    /// only its reference is as fatal as a disconnected alignment.
    pub fn blend_from_store(
        &self,
        images: &[SourceImage],
        store: &AlignmentStore,
    ) -> Result<StitchOutput, StitchError> {
        check_images(images)?;
        let transforms = store.to_transforms(images)?;
        info!(
            "loaded {} of {} transforms from store (reference {})",
            transforms.len(),
            images.len(),
            transforms.reference()
        );
        if transforms.len() < 2 {
            return Err(StitchError::Disconnected {
                reference: transforms.reference(),
                unregistered: transforms.unregistered().len(),
            });
        }
        let diagnostics = Diagnostics::from_transforms(images, &transforms);
        self.pool()?
            .install(|| self.blend_images(images, &transforms, store.clone(), diagnostics))
    }

    fn pool(&self) -> Result<ThreadPool, StitchError> {
        ThreadPoolBuilder::new()
            .num_threads(self.config.worker_count)
            .thread_name(|i| format!("panostitch-{i}"))
            .build()
            .map_err(|e| StitchError::InvalidConfig(format!("worker pool: {e}")))
    }

    fn align_images(&self, images: &[SourceImage]) -> Result<Alignment, StitchError> {
        check_images(images)?;
        let n = images.len();
        if let Some(index) = self.config.reference_index.filter(|&r| r >= n) {
            return Err(StitchError::InvalidReference { index, count: n });
        }

        let features = extract_all(images, &self.config.matching);
        let outcomes = PairMatcher::new(self.config.matching.clone()).match_all_pairs(&features);
        let graph = AlignmentGraphBuilder::new(n).add_outcomes(&outcomes).build();
        info!(
            "alignment graph: {} of {} pairs accepted",
            graph.edges().len() / 2,
            outcomes.len()
        );

        let transforms = compose_global_transforms(&graph, self.config.reference_index)?;
        let unregistered = transforms.unregistered();
        if transforms.len() < 2 {
            return Err(StitchError::Disconnected {
                reference: transforms.reference(),
                unregistered: unregistered.len(),
            });
        }
        for &i in &unregistered {
            warn!("image {i} ({}) has no path to the reference and is left out", images[i].name);
        }

        let store = AlignmentStore::from_transforms(&transforms, images);
        let diagnostics = Diagnostics::from_alignment(images, &outcomes, &graph, &transforms);
        Ok(Alignment {
            transforms,
            store,
            diagnostics,
        })
    }

    fn blend_images(
        &self,
        images: &[SourceImage],
        transforms: &GlobalTransforms,
        store: AlignmentStore,
        mut diagnostics: Diagnostics,
    ) -> Result<StitchOutput, StitchError> {
        let factor = self.config.downsample;
        let (images, transforms): (Cow<'_, [SourceImage]>, Cow<'_, GlobalTransforms>) =
            if factor > 1 {
                let scaled = downsample_images(images, factor)?;
                info!("blending at 1/{factor} resolution");
                let table = transforms.rescaled(1.0 / factor as f64);
                (Cow::Owned(scaled), Cow::Owned(table))
            } else {
                (Cow::Borrowed(images), Cow::Borrowed(transforms))
            };
        let (images, transforms) = (&*images, &*transforms);

        let sizes: Vec<(usize, usize)> = images
            .iter()
            .map(|img| (img.pixels.width, img.pixels.height))
            .collect();
        let plan = plan_canvas(&sizes, transforms)?;
        diagnostics.canvas = Some(plan.summary());

        let sources: Cow<'_, [SourceImage]> = if self.config.exposure.enabled {
            let ExposureOutcome { images, gains } =
                compensate_exposure(images, transforms, &self.config.exposure);
            diagnostics.exposure = gains;
            Cow::Owned(images)
        } else {
            Cow::Borrowed(images)
        };

        let output = blend_tiles(&sources, &plan, &self.config.blend);
        diagnostics.blend = Some(output.stats);
        info!(
            "stitched {} of {} images into {}x{}",
            transforms.len(),
            images.len(),
            plan.width,
            plan.height
        );
        Ok(StitchOutput {
            canvas: output.canvas,
            store,
            diagnostics,
        })
    }
}

fn downsample_images(images: &[SourceImage], factor: usize) -> Result<Vec<SourceImage>, StitchError> {
    images
        .iter()
        .map(|img| {
            let pixels = downsample_area(&img.pixels, factor);
            if pixels.is_empty() {
                return Err(StitchError::InvalidConfig(format!(
                    "downsample {factor} leaves image {} ({}) empty",
                    img.index, img.name
                )));
            }
            Ok(SourceImage::new(img.index, img.name.clone(), pixels))
        })
        .collect()
}

fn check_images(images: &[SourceImage]) -> Result<(), StitchError> {
    if images.len() < 2 {
        return Err(StitchError::TooFewImages {
            count: images.len(),
        });
    }
    for (i, img) in images.iter().enumerate() {
        if img.index != i {
            return Err(StitchError::InvalidConfig(format!(
                "image at position {i} carries index {}",
                img.index
            )));
        }
        if img.pixels.is_empty() {
            return Err(StitchError::InvalidConfig(format!("image {i} ({}) is empty", img.name)));
        }
    }
    Ok(())
}
