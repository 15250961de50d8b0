use std::collections::HashMap;

use log::debug;
use panostitch_core::Homography;
use panostitch_features::{DetectorKind, PairOutcome, PairwiseMatch};
use serde::{Deserialize, Serialize};

/// Directed correspondence `from → to`.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrespondenceEdge {
    pub from: usize,
    pub to: usize,
    /// Maps `from` pixel coordinates into `to`'s frame.
    pub homography: Homography,
    pub inliers: usize,
    pub detector: DetectorKind,
}

impl CorrespondenceEdge {
    /// Traversal cost `1 / max(1, inliers)`; stronger evidence is cheaper.
    #[inline]
    pub fn weight(&self) -> f64 {
        1.0 / self.inliers.max(1) as f64
    }
}

/// Per-image connectivity summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStats {
    /// Number of distinct neighbors.
    pub degree: usize,
    /// Sum of inliers over outgoing edges.
    pub inlier_mass: usize,
}

/// Collects accepted pairwise matches; each contributes a forward and an inverse edge.
#[derive(Clone, Debug)]
pub struct AlignmentGraphBuilder {
    node_count: usize,
    edges: Vec<CorrespondenceEdge>,
    lookup: HashMap<(usize, usize), usize>,
}

impl AlignmentGraphBuilder {
    pub fn new(node_count: usize) -> Self {
        Self {
            node_count,
            edges: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// Insert one directed edge. A repeated `(from, to)` keeps the stronger edge.
    /// Self loops and out-of-range indices are ignored.
    pub fn add_edge(&mut self, edge: CorrespondenceEdge) -> &mut Self {
        if edge.from == edge.to || edge.from >= self.node_count || edge.to >= self.node_count {
            debug!("ignoring edge {} -> {}", edge.from, edge.to);
            return self;
        }
        match self.lookup.get(&(edge.from, edge.to)) {
            Some(&i) if self.edges[i].inliers >= edge.inliers => {}
            Some(&i) => self.edges[i] = edge,
            None => {
                self.lookup.insert((edge.from, edge.to), self.edges.len());
                self.edges.push(edge);
            }
        }
        self
    }

    /// Insert `H_{i→j}` and its stored inverse `H_{j→i}`.
    pub fn add_match(&mut self, m: &PairwiseMatch) -> &mut Self {
        self.add_edge(CorrespondenceEdge {
            from: m.from,
            to: m.to,
            homography: m.homography,
            inliers: m.inliers,
            detector: m.detector,
        });
        self.add_edge(CorrespondenceEdge {
            from: m.to,
            to: m.from,
            homography: m.inverse,
            inliers: m.inliers,
            detector: m.detector,
        })
    }

    /// Insert every accepted outcome; rejected pairs are skipped.
    pub fn add_outcomes(&mut self, outcomes: &[PairOutcome]) -> &mut Self {
        for o in outcomes {
            if let Ok(m) = &o.result {
                self.add_match(m);
            }
        }
        self
    }

    pub fn build(&self) -> AlignmentGraph {
        let mut outgoing = vec![Vec::new(); self.node_count];
        let mut incoming = vec![Vec::new(); self.node_count];
        for (i, e) in self.edges.iter().enumerate() {
            outgoing[e.from].push(i);
            incoming[e.to].push(i);
        }
        AlignmentGraph {
            node_count: self.node_count,
            edges: self.edges.clone(),
            outgoing,
            incoming,
            lookup: self.lookup.clone(),
        }
    }
}

/// Read-only directed graph over image indices.
#[derive(Clone, Debug)]
pub struct AlignmentGraph {
    node_count: usize,
    edges: Vec<CorrespondenceEdge>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    lookup: HashMap<(usize, usize), usize>,
}

impl AlignmentGraph {
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edges(&self) -> &[CorrespondenceEdge] {
        &self.edges
    }

    pub fn edge(&self, from: usize, to: usize) -> Option<&CorrespondenceEdge> {
        self.lookup.get(&(from, to)).map(|&i| &self.edges[i])
    }

    pub fn outgoing(&self, node: usize) -> impl Iterator<Item = &CorrespondenceEdge> {
        self.outgoing
            .get(node)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
    }

    pub fn incoming(&self, node: usize) -> impl Iterator<Item = &CorrespondenceEdge> {
        self.incoming
            .get(node)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
    }

    pub fn node_stats(&self, node: usize) -> NodeStats {
        let mut neighbors: Vec<usize> = self.outgoing(node).map(|e| e.to).collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        NodeStats {
            degree: neighbors.len(),
            inlier_mass: self.outgoing(node).map(|e| e.inliers).sum(),
        }
    }

    pub fn all_node_stats(&self) -> Vec<NodeStats> {
        (0..self.node_count).map(|i| self.node_stats(i)).collect()
    }

    /// Image with maximal outgoing inlier mass; ties pick the lowest index.
    pub fn choose_reference(&self) -> Option<usize> {
        let stats = self.all_node_stats();
        let mut best: Option<(usize, usize)> = None;
        for (i, s) in stats.iter().enumerate() {
            if best.map_or(true, |(_, mass)| s.inlier_mass > mass) {
                best = Some((i, s.inlier_mass));
            }
        }
        best.map(|(i, _)| i)
    }
}
