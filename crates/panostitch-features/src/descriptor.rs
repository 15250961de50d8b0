use crate::brief::BinaryDescriptor;
use crate::detector::DetectorKind;
use crate::gradient::FloatDescriptor;
use crate::keypoint::Keypoint;

/// Descriptor storage; the variant follows the detector that produced it.
#[derive(Clone, Debug)]
pub enum Descriptors {
    Binary(Vec<BinaryDescriptor>),
    Float(Vec<FloatDescriptor>),
}

impl Descriptors {
    pub fn len(&self) -> usize {
        match self {
            Descriptors::Binary(d) => d.len(),
            Descriptors::Float(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keypoints of one image together with their descriptors (same order, same length).
#[derive(Clone, Debug)]
pub struct FeatureSet {
    pub kind: DetectorKind,
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Descriptors,
}

impl FeatureSet {
    pub fn empty(kind: DetectorKind) -> Self {
        let descriptors = match kind {
            DetectorKind::Fast => Descriptors::Binary(Vec::new()),
            DetectorKind::Accurate => Descriptors::Float(Vec::new()),
        };
        Self {
            kind,
            keypoints: Vec::new(),
            descriptors,
        }
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}
