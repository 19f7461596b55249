//! Degree-2 chain contraction
//!
//! Every node of degree exactly 2 is eliminated by merging its two incident
//! edges, walking outward in both directions until a node of another degree
//! (or a node already visited) is reached. The whole chain becomes one edge
//! carrying the attributes of the first edge found at the seed node.
//!
//! Seeds are taken from an ordered worklist (ascending node id), so the
//! result does not depend on hash iteration order. Each attempt removes at
//! least its seed from the worklist, which bounds the loop.

use std::collections::VecDeque;

use geo::{LineString, MultiLineString, Point};
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use crate::degree::calculate_degree;
use crate::error::{Defect, DefectKind, Diagnostics, Result};
use crate::geometry::{
    line_endpoints, merge_multilinestring, point_distance, point_line_distance,
};
use crate::ids::reset_ids;
use crate::network::{Edge, Network, Node};
use crate::spatial::EdgeIndex;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractStats {
    pub seeds: usize,
    pub merged_chains: usize,
    pub edges_removed: usize,
    pub nodes_removed: usize,
    pub aborted: usize,
    /// Edge candidates measured while looking up incident edges
    pub candidates_checked: usize,
}

/// Working state of one contraction pass
struct Contraction<'a> {
    nodes: &'a [Node],
    edges: Vec<Edge>,
    ends: Vec<(usize, usize)>,
    alive: Vec<bool>,
    degree: Vec<usize>,
    index: EdgeIndex,
    /// Live edge each dead edge was merged into
    merged_into: Vec<usize>,
    tolerance: f64,
    checked: usize,
}

/// One direction of a chain
struct Walk {
    terminal: usize,
    edges: Vec<usize>,
}

impl Contraction<'_> {
    fn other_end(&self, edge: usize, node: usize) -> usize {
        let (from, to) = self.ends[edge];
        if from == node {
            to
        } else {
            from
        }
    }

    /// Live edge now holding the geometry of index entry `edge`
    fn resolve(&self, mut edge: usize) -> Option<usize> {
        while !self.alive[edge] {
            let next = self.merged_into[edge];
            if next == edge {
                return None;
            }
            edge = next;
        }
        Some(edge)
    }

    /// Live edges at `node`, nearest first (ties by position).
    ///
    /// The index still holds the pre-merge boxes. A merged edge covers the
    /// geometry of every edge merged into it, so each hit is resolved to the
    /// live edge that absorbed it. Candidates referencing the node are
    /// preferred over edges merely passing through it.
    fn incident(&mut self, node: usize) -> Vec<usize> {
        let point = self.nodes[node].geometry;
        let mut live: Vec<usize> = self
            .index
            .candidates_at(point, self.tolerance)
            .into_iter()
            .filter_map(|e| self.resolve(e))
            .collect();
        live.sort_unstable();
        live.dedup();
        self.checked += live.len();

        let mut candidates: Vec<(usize, f64)> = live
            .into_iter()
            .map(|e| (e, point_line_distance(point, &self.edges[e].geometry)))
            .filter(|(_, d)| *d <= self.tolerance)
            .collect();
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        let referencing: Vec<usize> = candidates
            .iter()
            .map(|c| c.0)
            .filter(|&e| self.ends[e].0 == node || self.ends[e].1 == node)
            .collect();
        if referencing.is_empty() {
            candidates.into_iter().map(|c| c.0).collect()
        } else {
            referencing
        }
    }

    /// Follow the chain from `seed` through `first` until it stops
    fn walk(
        &mut self,
        seed: usize,
        first: usize,
        visited: &mut FxHashSet<usize>,
        used: &mut FxHashSet<usize>,
    ) -> Walk {
        let mut edges = Vec::new();
        let mut node = self.other_end(first, seed);
        loop {
            if self.degree[node] != 2 || visited.contains(&node) {
                break;
            }
            let Some(next) = self
                .incident(node)
                .into_iter()
                .find(|e| !used.contains(e))
            else {
                break;
            };
            visited.insert(node);
            used.insert(next);
            edges.push(next);
            node = self.other_end(next, node);
        }
        Walk {
            terminal: node,
            edges,
        }
    }

    /// Merge the chain into one line running away from node `start`
    fn merged_geometry(
        &self,
        chain: &[usize],
        start: usize,
    ) -> std::result::Result<LineString<f64>, usize> {
        let lines: MultiLineString<f64> = chain
            .iter()
            .map(|&e| self.edges[e].geometry.clone())
            .collect();
        let mut merged =
            merge_multilinestring(&lines, self.tolerance).map_err(|parts| parts.0.len())?;
        if let Some((first, last)) = line_endpoints(&merged) {
            let anchor: Point<f64> = self.nodes[start].geometry;
            if point_distance(last, anchor) < point_distance(first, anchor) {
                merged.0.reverse();
            }
        }
        Ok(merged)
    }
}

/// Contract every degree-2 chain into a single edge.
///
/// `tolerance` is the distance within which an edge counts as incident to a
/// node. Aborted merges are reported as [`DefectKind::DegenerateMerge`] and
/// leave the original edges in place. Dead edges and degree-0 nodes are
/// removed at the end and ids are reset.
pub fn merge_degree2(
    network: &Network,
    tolerance: f64,
    diagnostics: &mut Diagnostics,
) -> Result<(Network, ContractStats)> {
    let degree = calculate_degree(network)?;
    let ends = network.edge_ends()?;
    let mut state = Contraction {
        nodes: &network.nodes,
        edges: network.edges.clone(),
        ends,
        alive: vec![true; network.edges.len()],
        degree,
        index: EdgeIndex::build(&network.edges),
        merged_into: (0..network.edges.len()).collect(),
        tolerance,
        checked: 0,
    };
    let mut stats = ContractStats::default();

    let mut pending: Vec<bool> = state.degree.iter().map(|&d| d == 2).collect();
    let mut worklist: VecDeque<usize> = (0..network.nodes.len()).filter(|&n| pending[n]).collect();
    stats.seeds = worklist.len();

    while let Some(seed) = worklist.pop_front() {
        if !pending[seed] {
            continue;
        }
        pending[seed] = false;
        if state.degree[seed] != 2 {
            continue;
        }

        let incident = state.incident(seed);
        if incident.len() < 2 {
            continue;
        }
        let (first, second) = (incident[0], incident[1]);
        let next1 = state.other_end(first, seed);
        let next2 = state.other_end(second, seed);
        if next1 == next2 {
            stats.aborted += 1;
            diagnostics.push(Defect::on_node(
                DefectKind::DegenerateMerge,
                network.nodes[seed].id,
                format!("both edges lead to node {}", network.nodes[next1].id),
            ));
            continue;
        }

        let mut visited: FxHashSet<usize> = FxHashSet::default();
        let mut used: FxHashSet<usize> = FxHashSet::default();
        visited.insert(seed);
        used.insert(first);
        used.insert(second);
        let walk1 = state.walk(seed, first, &mut visited, &mut used);
        let walk2 = state.walk(seed, second, &mut visited, &mut used);

        for &n in &visited {
            pending[n] = false;
        }

        // walk1 reversed, then the seed's two edges, then walk2
        let chain: Vec<usize> = walk1
            .edges
            .iter()
            .rev()
            .copied()
            .chain([first, second])
            .chain(walk2.edges.iter().copied())
            .collect();

        let merged = match state.merged_geometry(&chain, walk1.terminal) {
            Ok(merged) => merged,
            Err(parts) => {
                stats.aborted += 1;
                diagnostics.push(Defect::on_node(
                    DefectKind::DegenerateMerge,
                    network.nodes[seed].id,
                    format!("{} edges merged into {} disjoint parts", chain.len(), parts),
                ));
                continue;
            }
        };

        let target = first;
        state.edges[target].geometry = merged;
        state.edges[target].from_id = Some(network.nodes[walk1.terminal].id);
        state.edges[target].to_id = Some(network.nodes[walk2.terminal].id);
        state.ends[target] = (walk1.terminal, walk2.terminal);
        for &e in chain.iter().filter(|&&e| e != target) {
            state.alive[e] = false;
            state.merged_into[e] = target;
            stats.edges_removed += 1;
        }
        for &n in &visited {
            if n != walk1.terminal && n != walk2.terminal {
                state.degree[n] = 0;
            }
        }
        stats.merged_chains += 1;
    }

    let edges: Vec<Edge> = state
        .edges
        .into_iter()
        .zip(&state.alive)
        .filter(|(_, alive)| **alive)
        .map(|(e, _)| e)
        .collect();
    let nodes: Vec<Node> = network
        .nodes
        .iter()
        .zip(&state.degree)
        .filter(|(_, d)| **d > 0)
        .map(|(n, d)| Node {
            degree: Some(*d),
            ..n.clone()
        })
        .collect();
    stats.nodes_removed = network.nodes.len() - nodes.len();
    stats.candidates_checked = state.checked;

    if stats.aborted > 0 {
        warn!(aborted = stats.aborted, "Degree-2 merges aborted");
    }
    debug!(?stats, "Contraction details");
    info!(
        chains = stats.merged_chains,
        edges = edges.len(),
        nodes = nodes.len(),
        "Contracted degree-2 chains"
    );

    let contracted = reset_ids(&Network::new(nodes, edges))?;
    Ok((contracted, stats))
}
