//! Edge splitting
//!
//! Two flavours:
//! - [`split_edges_at_nodes`]: cut edges wherever a node sits on their
//!   interior (node linking, externally supplied junction points).
//! - [`split_edges_at_intersections`]: cut edges at vertices they share with
//!   other edges, so every junction becomes an edge end before nodes exist.
//!
//! Pieces inherit the parent's attributes. Topology is cleared on every
//! output edge and edge ids are reset; node ids are left alone.

use geo::Point;
use tracing::debug;

use crate::geometry::{point_line_distance, split_line_at_points};
use crate::ids::assign_dense_ids;
use crate::network::{Edge, Network};
use crate::spatial::{EdgeIndex, NodeIndex};

fn pieces_of(edge: &Edge, points: &[Point<f64>], tolerance: f64) -> Vec<Edge> {
    if points.is_empty() {
        let mut edge = edge.clone();
        edge.clear_topology();
        return vec![edge];
    }
    split_line_at_points(&edge.geometry, points, tolerance)
        .into_iter()
        .map(|geometry| Edge::new(edge.id, geometry).with_attributes(edge.attributes.clone()))
        .collect()
}

fn finish(network: &Network, mut edges: Vec<Edge>, what: &str) -> Network {
    assign_dense_ids(&mut edges);
    debug!(
        before = network.edges.len(),
        after = edges.len(),
        "Split edges at {}",
        what
    );
    Network::new(network.nodes.clone(), edges)
}

/// Split every edge at the nodes lying within `tolerance` of its interior.
///
/// Several nodes on one edge are handled in one pass: they are ordered along
/// the line and cut in sequence.
pub fn split_edges_at_nodes(network: &Network, tolerance: f64) -> Network {
    let index = NodeIndex::build(&network.nodes);
    let mut edges = Vec::with_capacity(network.edges.len());
    for edge in &network.edges {
        let points: Vec<Point<f64>> = index
            .query_intersecting(&edge.geometry, tolerance)
            .into_iter()
            .map(|i| network.nodes[i].geometry)
            .collect();
        edges.extend(pieces_of(edge, &points, tolerance));
    }
    finish(network, edges, "nodes")
}

/// Split every edge at the vertices of other edges lying on it.
///
/// Runs before nodes exist: the split points are the coordinates of the
/// other edges (endpoints and interior vertices) within `tolerance`.
pub fn split_edges_at_intersections(network: &Network, tolerance: f64) -> Network {
    let index = EdgeIndex::build(&network.edges);
    let mut edges = Vec::with_capacity(network.edges.len());
    for (i, edge) in network.edges.iter().enumerate() {
        let points: Vec<Point<f64>> = index
            .candidates(&edge.geometry, tolerance)
            .into_iter()
            .filter(|&j| j != i)
            .flat_map(|j| network.edges[j].geometry.points())
            .filter(|p| point_line_distance(*p, &edge.geometry) <= tolerance)
            .collect();
        edges.extend(pieces_of(edge, &points, tolerance));
    }
    finish(network, edges, "shared vertices")
}
