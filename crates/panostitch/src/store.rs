//! Persisted Global Transform Table.
//!
//! The store lets a later run re-blend (different mode, tile size, exposure
//! settings) without repeating feature matching. Matrices are written with
//! shortest round-trip float formatting and read back with exact parsing, so a
//! reloaded store reproduces the canvas bit for bit.

use std::{collections::BTreeSet, fs, path::Path};

use panostitch_align::GlobalTransforms;
use panostitch_core::{Homography, SourceImage};
use serde::{Deserialize, Serialize};

use crate::StitchError;

pub const STORE_VERSION: u32 = 1;

/// One registered image: `(index, image → reference matrix, filename)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub index: usize,
    pub matrix: [[f64; 3]; 3],
    pub filename: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignmentStore {
    pub version: u32,
    pub reference: usize,
    /// Number of input images the table was computed for.
    pub image_count: usize,
    pub entries: Vec<StoreEntry>,
}

impl AlignmentStore {
    /// Snapshot of `transforms`, naming each entry after its source image.
    pub fn from_transforms(transforms: &GlobalTransforms, images: &[SourceImage]) -> Self {
        let entries = transforms
            .iter()
            .map(|(index, reg)| StoreEntry {
                index,
                matrix: reg.to_reference.to_array(),
                filename: images
                    .get(index)
                    .map(|img| img.name.clone())
                    .unwrap_or_default(),
            })
            .collect();
        Self {
            version: STORE_VERSION,
            reference: transforms.reference(),
            image_count: transforms.image_count(),
            entries,
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, StitchError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), StitchError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Rebuild the transform table for `images`.
    ///
    /// The image count must match, every entry must name the image at its index
    /// and carry a finite, invertible matrix, and the reference must be listed.
    pub fn to_transforms(&self, images: &[SourceImage]) -> Result<GlobalTransforms, StitchError> {
        let mismatch = |msg: String| Err(StitchError::StoreMismatch(msg));
        if self.version != STORE_VERSION {
            return mismatch(format!("unsupported store version {}", self.version));
        }
        if self.image_count != images.len() {
            return mismatch(format!(
                "store was written for {} images, got {}",
                self.image_count,
                images.len()
            ));
        }
        if !self.entries.iter().any(|e| e.index == self.reference) {
            return mismatch(format!("reference {} has no entry", self.reference));
        }

        let mut seen = BTreeSet::new();
        let mut table = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let Some(image) = images.get(entry.index) else {
                return mismatch(format!("entry index {} out of range", entry.index));
            };
            if !seen.insert(entry.index) {
                return mismatch(format!("duplicate entry for image {}", entry.index));
            }
            if image.name != entry.filename {
                return mismatch(format!(
                    "image {} is {:?}, store expects {:?}",
                    entry.index, image.name, entry.filename
                ));
            }
            let h = Homography::from_array(entry.matrix);
            if entry.matrix.iter().flatten().any(|v| !v.is_finite()) || h.inverse().is_none() {
                return mismatch(format!("matrix of image {} is degenerate", entry.index));
            }
            table.push((entry.index, h));
        }
        Ok(GlobalTransforms::from_table(
            self.reference,
            self.image_count,
            table,
        )?)
    }
}
