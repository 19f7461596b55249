//! Hanging-node pruning
//!
//! Drops short stubs ending at a degree-1 node, and isolated segments whose
//! two ends both became degree 1. One pass over the edges initially touching
//! a degree-1 node, with a live degree array so later edges see earlier
//! drops. Degree-0 nodes are kept; contraction cleanup removes them.

use tracing::{debug, info};

use crate::degree::{calculate_degree, decrement};
use crate::error::Result;
use crate::geometry::line_length;
use crate::ids::assign_dense_ids;
use crate::network::Network;

/// Default stub length below which a hanging edge is dropped (CRS units)
pub const DEFAULT_HANGING_TOLERANCE: f64 = 0.005;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruneStats {
    pub candidates: usize,
    pub dropped_short: usize,
    pub dropped_isolated: usize,
}

impl PruneStats {
    pub fn dropped(&self) -> usize {
        self.dropped_short + self.dropped_isolated
    }
}

/// Drop hanging edges shorter than `tolerance`.
///
/// Candidates are visited once each in edge order:
/// 1. shorter than `tolerance`: dropped, both end degrees decremented;
/// 2. otherwise, both ends now degree 1: dropped as an isolated segment.
///
/// Output nodes carry the live degree; surviving edges get ids `0..n-1`.
pub fn drop_hanging_nodes(network: &Network, tolerance: f64) -> Result<(Network, PruneStats)> {
    let mut degree = calculate_degree(network)?;
    let ends = network.edge_ends()?;
    let mut stats = PruneStats::default();

    let candidates: Vec<usize> = ends
        .iter()
        .enumerate()
        .filter(|(_, (from, to))| degree[*from] == 1 || degree[*to] == 1)
        .map(|(i, _)| i)
        .collect();
    stats.candidates = candidates.len();

    let mut dropped = vec![false; network.edges.len()];
    for i in candidates {
        let (from, to) = ends[i];
        if line_length(&network.edges[i].geometry) < tolerance {
            dropped[i] = true;
            stats.dropped_short += 1;
            decrement(&mut degree, from);
            decrement(&mut degree, to);
        } else if degree[from] == 1 && degree[to] == 1 {
            dropped[i] = true;
            stats.dropped_isolated += 1;
            decrement(&mut degree, from);
            decrement(&mut degree, to);
        }
    }

    let mut edges: Vec<_> = network
        .edges
        .iter()
        .zip(&dropped)
        .filter(|(_, dropped)| !**dropped)
        .map(|(e, _)| e.clone())
        .collect();
    assign_dense_ids(&mut edges);

    let mut nodes = network.nodes.clone();
    for (node, d) in nodes.iter_mut().zip(&degree) {
        node.degree = Some(*d);
    }

    debug!(?stats, "Hanging node pass");
    info!(
        dropped = stats.dropped(),
        remaining = edges.len(),
        "Dropped hanging edges"
    );
    Ok((Network::new(nodes, edges), stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Edge, Node};
    use geo::{line_string, Point};

    fn node(id: usize, x: f64, y: f64) -> Node {
        Node::new(id, Point::new(x, y))
    }

    #[test]
    fn test_short_stub_is_dropped() {
        let network = Network::new(
            vec![node(0, 0.0, 0.0), node(1, 1.0, 0.0), node(2, 2.0, 0.0), node(3, 1.0, 0.001)],
            vec![
                Edge::new(0, line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]).with_ends(0, 1),
                Edge::new(1, line_string![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0)]).with_ends(1, 2),
                Edge::new(2, line_string![(x: 1.0, y: 0.0), (x: 1.0, y: 0.001)]).with_ends(1, 3),
            ],
        );
        let (pruned, stats) = drop_hanging_nodes(&network, DEFAULT_HANGING_TOLERANCE).unwrap();

        assert_eq!(stats.candidates, 3);
        assert_eq!(stats.dropped_short, 1);
        assert_eq!(pruned.edges.len(), 2);
        assert_eq!(pruned.nodes.len(), 4, "degree-0 nodes stay until cleanup");
        assert_eq!(pruned.nodes[3].degree, Some(0));
        assert_eq!(pruned.nodes[1].degree, Some(2));
        assert_eq!(pruned.edges.iter().map(|e| e.id).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_isolated_segment_is_dropped() {
        let network = Network::new(
            vec![node(0, 0.0, 0.0), node(1, 5.0, 0.0)],
            vec![Edge::new(0, line_string![(x: 0.0, y: 0.0), (x: 5.0, y: 0.0)]).with_ends(0, 1)],
        );
        let (pruned, stats) = drop_hanging_nodes(&network, DEFAULT_HANGING_TOLERANCE).unwrap();

        assert_eq!(stats.dropped_isolated, 1);
        assert!(pruned.edges.is_empty());
        assert!(pruned.nodes.iter().all(|n| n.degree == Some(0)));
    }

    #[test]
    fn test_long_hanging_edges_survive() {
        let network = Network::new(
            vec![node(0, 0.0, 0.0), node(1, 1.0, 0.0), node(2, 2.0, 0.0), node(3, 1.0, 1.0)],
            vec![
                Edge::new(0, line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]).with_ends(0, 1),
                Edge::new(1, line_string![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0)]).with_ends(1, 2),
                Edge::new(2, line_string![(x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]).with_ends(1, 3),
            ],
        );
        let (pruned, stats) = drop_hanging_nodes(&network, DEFAULT_HANGING_TOLERANCE).unwrap();
        assert_eq!(stats.dropped(), 0);
        assert_eq!(pruned.edges, network.edges);
    }
}
