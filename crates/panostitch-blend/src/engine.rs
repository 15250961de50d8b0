use std::cmp::Ordering;

use log::{debug, info, warn};
use panostitch_core::{warp_rgb_roi, PixelRect, RgbImage, SourceImage, WarpedPatch};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::blend::{
    blend_distance, blend_multiband, copy_patch, effective_levels, weight_map, BlendMode,
    BlendParams,
};
use crate::canvas::{CanvasPlan, ImagePlacement};
use crate::tiles::{Tile, TileGrid};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TileError {
    #[error("image {index} is not among the inputs")]
    MissingImage { index: usize },
    #[error("image {index} is {found:?} but was planned as {expected:?}")]
    SizeMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// Result of one tile.
#[derive(Clone, Debug, PartialEq)]
pub struct TileOutput {
    pub tile: Tile,
    pub pixels: RgbImage,
    /// Images whose canvas box intersects the tile, before the per-tile cap.
    pub candidates: usize,
    /// Images that actually cover at least one tile pixel.
    pub contributors: usize,
    /// Pyramid depth used, for multiband tiles with several contributors.
    pub levels: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedTile {
    pub row: usize,
    pub col: usize,
    pub reason: String,
}

/// Per-run tile accounting, surfaced in diagnostics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlendStats {
    pub tile_size: usize,
    pub rows: usize,
    pub cols: usize,
    pub tiles: usize,
    pub background_tiles: usize,
    pub single_source_tiles: usize,
    pub blended_tiles: usize,
    /// Tiles where the per-tile cap dropped candidates.
    pub capped_tiles: usize,
    pub max_contributors: usize,
    pub degraded: Vec<DegradedTile>,
}

#[derive(Clone, Debug)]
pub struct BlendOutput {
    pub canvas: RgbImage,
    pub stats: BlendStats,
}

/// Placements whose canvas box overlaps `rect`, largest overlap first (ties by
/// image index), limited to `max` when set. Returned in ascending image order.
pub fn select_candidates<'a>(
    plan: &'a CanvasPlan,
    rect: &PixelRect,
    max: Option<usize>,
) -> (Vec<&'a ImagePlacement>, usize) {
    let mut hits: Vec<(f64, &ImagePlacement)> = plan
        .placements
        .iter()
        .map(|p| (p.bounds.overlap_area(rect), p))
        .filter(|(area, _)| *area > 0.0)
        .collect();
    let found = hits.len();
    if let Some(max) = max.filter(|&m| m > 0 && m < found) {
        hits.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.index.cmp(&b.1.index))
        });
        hits.truncate(max);
    }
    let mut selected: Vec<&ImagePlacement> = hits.into_iter().map(|(_, p)| p).collect();
    selected.sort_by_key(|p| p.index);
    (selected, found)
}

fn source_for<'a>(
    images: &'a [SourceImage],
    placement: &ImagePlacement,
) -> Result<&'a SourceImage, TileError> {
    let index = placement.index;
    let image = images
        .get(index)
        .filter(|img| img.index == index)
        .or_else(|| images.iter().find(|img| img.index == index))
        .ok_or(TileError::MissingImage { index })?;
    let found = (image.pixels.width, image.pixels.height);
    if found != (placement.width, placement.height) {
        return Err(TileError::SizeMismatch {
            index,
            expected: (placement.width, placement.height),
            found,
        });
    }
    Ok(image)
}

/// Warp and blend every image overlapping `tile`.
///
/// Only the tile-sized region of each candidate is resampled. Distance mode
/// always goes through the weighted mean so a pixel's value never depends on
/// which other images share its tile; multiband copies a lone contributor.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(plan, images, params), fields(row = tile.row, col = tile.col))
)]
pub fn process_tile(
    tile: Tile,
    plan: &CanvasPlan,
    images: &[SourceImage],
    params: &BlendParams,
) -> Result<TileOutput, TileError> {
    let rect = tile.rect;
    let (selected, candidates) = select_candidates(plan, &rect, params.max_images_per_tile);

    let mut patches: Vec<WarpedPatch> = Vec::with_capacity(selected.len());
    let mut weights: Vec<Vec<f32>> = Vec::with_capacity(selected.len());
    for placement in selected {
        let image = source_for(images, placement)?;
        let patch = warp_rgb_roi(
            &image.pixels,
            &placement.image_from_canvas,
            rect.x,
            rect.y,
            rect.width,
            rect.height,
        );
        if patch.covered_pixels() == 0 {
            continue;
        }
        let inradius = placement.width.min(placement.height) as f32 / 2.0;
        weights.push(weight_map(&patch, params.weight_field, inradius));
        patches.push(patch);
    }

    let contributors = patches.len();
    let (pixels, levels) = match (params.mode, contributors) {
        (_, 0) => (RgbImage::filled(rect.width, rect.height, params.background), None),
        (BlendMode::Distance, _) => (blend_distance(&patches, &weights, params.background), None),
        (BlendMode::Multiband, 1) => (copy_patch(&patches[0], params.background), None),
        (BlendMode::Multiband, k) => {
            let levels = effective_levels(params.pyramid_levels, k, rect.width, rect.height);
            (
                blend_multiband(&patches, &weights, levels, params.background),
                Some(levels),
            )
        }
    };
    debug!(
        "tile ({}, {}): {} candidates, {} contributors",
        tile.row, tile.col, candidates, contributors
    );
    Ok(TileOutput {
        tile,
        pixels,
        candidates,
        contributors,
        levels,
    })
}

enum TileRecord {
    Done { contributors: usize, capped: bool },
    Degraded(DegradedTile),
}

/// Blend the whole canvas tile by tile on the current rayon pool.
///
/// The canvas is split into disjoint row bands, one per tile row; each band is
/// written only by the tiles of its row. A tile that fails is filled with the
/// background colour and reported in the stats.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(width = plan.width, height = plan.height, mode = %params.mode))
)]
pub fn blend_tiles(images: &[SourceImage], plan: &CanvasPlan, params: &BlendParams) -> BlendOutput {
    let grid = TileGrid::new(plan.width, plan.height, params.tile_size);
    let mut canvas = RgbImage::filled(plan.width, plan.height, params.background);
    let mut stats = BlendStats {
        tile_size: grid.tile_size,
        rows: grid.rows(),
        cols: grid.cols(),
        tiles: grid.len(),
        ..BlendStats::default()
    };
    if grid.is_empty() {
        return BlendOutput { canvas, stats };
    }
    info!(
        "blending {}x{} canvas as {} tiles of {} px ({} mode)",
        plan.width,
        plan.height,
        grid.len(),
        grid.tile_size,
        params.mode
    );

    let stride = plan.width * 3;
    let records: Vec<Vec<TileRecord>> = canvas
        .data
        .par_chunks_mut(grid.tile_size.saturating_mul(stride))
        .enumerate()
        .map(|(row, band)| {
            let tiles: Vec<Tile> = grid.row(row).collect();
            let outputs: Vec<(Tile, Result<TileOutput, TileError>)> = tiles
                .par_iter()
                .map(|&t| (t, process_tile(t, plan, images, params)))
                .collect();

            let mut records = Vec::with_capacity(outputs.len());
            for (tile, result) in outputs {
                match result {
                    Ok(out) => {
                        let rect = out.tile.rect;
                        let w = rect.width * 3;
                        for y in 0..rect.height {
                            let dst = y * stride + rect.x * 3;
                            band[dst..dst + w].copy_from_slice(&out.pixels.data[y * w..(y + 1) * w]);
                        }
                        records.push(TileRecord::Done {
                            contributors: out.contributors,
                            capped: params
                                .max_images_per_tile
                                .is_some_and(|m| m > 0 && out.candidates > m),
                        });
                    }
                    Err(err) => {
                        // band already holds the background colour
                        warn!("tile ({}, {}) degraded to background: {err}", tile.row, tile.col);
                        records.push(TileRecord::Degraded(DegradedTile {
                            row: tile.row,
                            col: tile.col,
                            reason: err.to_string(),
                        }));
                    }
                }
            }
            records
        })
        .collect();

    for record in records.into_iter().flatten() {
        match record {
            TileRecord::Done {
                contributors,
                capped,
            } => {
                match contributors {
                    0 => stats.background_tiles += 1,
                    1 => stats.single_source_tiles += 1,
                    _ => stats.blended_tiles += 1,
                }
                if capped {
                    stats.capped_tiles += 1;
                }
                stats.max_contributors = stats.max_contributors.max(contributors);
            }
            TileRecord::Degraded(d) => stats.degraded.push(d),
        }
    }
    info!(
        "blended {} tiles: {} multi-source, {} single-source, {} background, {} degraded",
        stats.tiles,
        stats.blended_tiles,
        stats.single_source_tiles,
        stats.background_tiles,
        stats.degraded.len()
    );
    BlendOutput { canvas, stats }
}
