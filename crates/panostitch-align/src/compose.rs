use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use log::{debug, info, warn};
use panostitch_core::Homography;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::graph::AlignmentGraph;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    #[error("alignment graph has no images")]
    EmptyGraph,
    #[error("reference index {index} out of range for {count} images")]
    InvalidReference { index: usize, count: usize },
}

/// Global registration of one image.
#[derive(Clone, Debug, PartialEq)]
pub struct RegisteredImage {
    /// Maps image pixels directly into the reference frame.
    pub to_reference: Homography,
    /// Hops from the image to the reference, both ends included.
    /// `None` when the transform was loaded rather than composed.
    pub path: Option<Vec<usize>>,
    /// Sum of edge weights along `path`; `None` alongside a missing path.
    pub cost: Option<f64>,
}

/// The Global Transform Table: a partial map image → reference frame.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalTransforms {
    reference: usize,
    image_count: usize,
    entries: BTreeMap<usize, RegisteredImage>,
}

impl GlobalTransforms {
    /// Table from already known transforms (e.g. a persisted store).
    ///
    /// Entries outside `0..image_count` are dropped; the reference always maps by identity.
    /// Loaded entries carry no path or cost since no graph search produced them.
    pub fn from_table(
        reference: usize,
        image_count: usize,
        table: impl IntoIterator<Item = (usize, Homography)>,
    ) -> Result<Self, ComposeError> {
        if image_count == 0 {
            return Err(ComposeError::EmptyGraph);
        }
        if reference >= image_count {
            return Err(ComposeError::InvalidReference {
                index: reference,
                count: image_count,
            });
        }
        let mut entries: BTreeMap<usize, RegisteredImage> = table
            .into_iter()
            .filter(|(i, _)| *i < image_count)
            .map(|(i, h)| {
                (
                    i,
                    RegisteredImage {
                        to_reference: h,
                        path: None,
                        cost: None,
                    },
                )
            })
            .collect();
        entries.insert(reference, RegisteredImage::reference(reference));
        Ok(Self {
            reference,
            image_count,
            entries,
        })
    }

    pub fn reference(&self) -> usize {
        self.reference
    }

    pub fn image_count(&self) -> usize {
        self.image_count
    }

    pub fn get(&self, index: usize) -> Option<&RegisteredImage> {
        self.entries.get(&index)
    }

    pub fn transform(&self, index: usize) -> Option<&Homography> {
        self.entries.get(&index).map(|r| &r.to_reference)
    }

    pub fn is_registered(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    /// Registered images in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &RegisteredImage)> {
        self.entries.iter().map(|(&i, r)| (i, r))
    }

    pub fn registered(&self) -> Vec<usize> {
        self.entries.keys().copied().collect()
    }

    pub fn unregistered(&self) -> Vec<usize> {
        (0..self.image_count)
            .filter(|i| !self.entries.contains_key(i))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The table for images whose pixel coordinates are all scaled by `s`.
    pub fn rescaled(&self, s: f64) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(&i, r)| {
                let scaled = RegisteredImage {
                    to_reference: r.to_reference.rescaled(s),
                    ..r.clone()
                };
                (i, scaled)
            })
            .collect();
        Self {
            reference: self.reference,
            image_count: self.image_count,
            entries,
        }
    }
}

impl RegisteredImage {
    fn reference(index: usize) -> Self {
        Self {
            to_reference: Homography::identity(),
            path: Some(vec![index]),
            cost: Some(0.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Frontier {
    cost: f64,
    node: usize,
}

impl Eq for Frontier {}

// Min-heap on cost, then on node index.
impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cheapest-path transform from every reachable image into the reference frame.
///
/// Dijkstra runs from the reference over the reversed graph, so `next[v]` is
/// the first hop on `v`'s path towards the reference. Equal-cost alternatives
/// keep the path discovered first (lower-index frontier nodes are expanded
/// first). The transform of `v` is the product of edge homographies along its
/// path, applied in path order. When `reference` is `None` the image with the
/// largest outgoing inlier mass is used.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(graph), fields(images = graph.node_count()))
)]
pub fn compose_global_transforms(
    graph: &AlignmentGraph,
    reference: Option<usize>,
) -> Result<GlobalTransforms, ComposeError> {
    let n = graph.node_count();
    if n == 0 {
        return Err(ComposeError::EmptyGraph);
    }
    let reference = match reference {
        Some(r) if r >= n => return Err(ComposeError::InvalidReference { index: r, count: n }),
        Some(r) => r,
        None => graph.choose_reference().ok_or(ComposeError::EmptyGraph)?,
    };

    let mut dist = vec![f64::INFINITY; n];
    let mut next: Vec<Option<usize>> = vec![None; n];
    let mut heap = BinaryHeap::new();
    dist[reference] = 0.0;
    heap.push(Frontier {
        cost: 0.0,
        node: reference,
    });

    while let Some(Frontier { cost, node }) = heap.pop() {
        if cost > dist[node] {
            continue;
        }
        // edges u -> node, traversed backwards
        for e in graph.incoming(node) {
            let candidate = cost + e.weight();
            if candidate < dist[e.from] {
                dist[e.from] = candidate;
                next[e.from] = Some(node);
                heap.push(Frontier {
                    cost: candidate,
                    node: e.from,
                });
            }
        }
    }

    let mut entries = BTreeMap::new();
    entries.insert(reference, RegisteredImage::reference(reference));
    for src in 0..n {
        if src == reference || next[src].is_none() {
            continue;
        }
        let mut path = vec![src];
        let mut cur = src;
        while let Some(hop) = next[cur] {
            path.push(hop);
            cur = hop;
            if cur == reference || path.len() > n {
                break;
            }
        }
        if cur != reference {
            warn!("image {src}: broken path to reference {reference}");
            continue;
        }

        let mut h = Homography::identity();
        let mut complete = true;
        for hop in path.windows(2) {
            match graph.edge(hop[0], hop[1]) {
                Some(e) => h = e.homography * h,
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if !complete {
            warn!("image {src}: missing edge on path {path:?}");
            continue;
        }
        debug!("image {src}: path {path:?} cost {:.5}", dist[src]);
        entries.insert(
            src,
            RegisteredImage {
                to_reference: h,
                path: Some(path),
                cost: Some(dist[src]),
            },
        );
    }

    let table = GlobalTransforms {
        reference,
        image_count: n,
        entries,
    };
    let unregistered = table.unregistered();
    if !unregistered.is_empty() {
        warn!(
            "{} of {} images not reachable from reference {}: {:?}",
            unregistered.len(),
            n,
            reference,
            unregistered
        );
    }
    info!(
        "registered {} of {} images against reference {}",
        table.len(),
        n,
        reference
    );
    Ok(table)
}
