//! Machine-readable record of what a run registered, dropped and produced.

use std::{fs, path::Path};

use panostitch_align::{AlignmentGraph, GlobalTransforms, NodeStats};
use panostitch_blend::{BlendStats, CanvasSummary, ExposureGain};
use panostitch_core::SourceImage;
use panostitch_features::{DetectorKind, PairOutcome};
use serde::{Deserialize, Serialize};

use crate::StitchError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageReport {
    pub index: usize,
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub registered: bool,
    /// Connectivity in the alignment graph; zero when re-blending from a store.
    pub stats: NodeStats,
    /// Hops to the reference, both ends included. `None` when unregistered
    /// or when the transform came from a store.
    pub path: Option<Vec<usize>>,
    pub cost: Option<f64>,
}

/// An accepted pairwise match (one per unordered pair).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EdgeReport {
    pub from: usize,
    pub to: usize,
    pub matches: usize,
    pub inliers: usize,
    pub detector: DetectorKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RejectedPair {
    pub from: usize,
    pub to: usize,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub reference: usize,
    pub images: Vec<ImageReport>,
    pub registered: Vec<usize>,
    pub unregistered: Vec<usize>,
    pub edges: Vec<EdgeReport>,
    pub rejected: Vec<RejectedPair>,
    pub canvas: Option<CanvasSummary>,
    pub exposure: Vec<ExposureGain>,
    pub blend: Option<BlendStats>,
}

impl Diagnostics {
    /// Registration part of the record, without pairwise information.
    pub fn from_transforms(images: &[SourceImage], transforms: &GlobalTransforms) -> Self {
        let images = images
            .iter()
            .enumerate()
            .map(|(index, img)| {
                let reg = transforms.get(index);
                ImageReport {
                    index,
                    name: img.name.clone(),
                    width: img.pixels.width,
                    height: img.pixels.height,
                    registered: reg.is_some(),
                    stats: NodeStats::default(),
                    path: reg.and_then(|r| r.path.clone()),
                    cost: reg.and_then(|r| r.cost),
                }
            })
            .collect();
        Self {
            reference: transforms.reference(),
            images,
            registered: transforms.registered(),
            unregistered: transforms.unregistered(),
            ..Self::default()
        }
    }

    /// Full alignment record: registration plus the pairwise confidence graph.
    pub fn from_alignment(
        images: &[SourceImage],
        outcomes: &[PairOutcome],
        graph: &AlignmentGraph,
        transforms: &GlobalTransforms,
    ) -> Self {
        let mut diag = Self::from_transforms(images, transforms);
        for (report, stats) in diag.images.iter_mut().zip(graph.all_node_stats()) {
            report.stats = stats;
        }
        for outcome in outcomes {
            match &outcome.result {
                Ok(m) => diag.edges.push(EdgeReport {
                    from: m.from,
                    to: m.to,
                    matches: m.matches,
                    inliers: m.inliers,
                    detector: m.detector,
                }),
                Err(reason) => diag.rejected.push(RejectedPair {
                    from: outcome.from,
                    to: outcome.to,
                    reason: reason.to_string(),
                }),
            }
        }
        diag
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), StitchError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
