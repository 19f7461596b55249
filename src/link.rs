//! Node linking
//!
//! Connect free-standing nodes (stops, junction points from another source)
//! to the edge network, either by moving them onto the nearest edge or by
//! adding short connector edges. Modal routes (ferries, rail shuttles) are
//! attached to an already simplified network as extra edges.

use geo::{Geometry, LineString, Point};
use tracing::{debug, info, warn};

use crate::degree::add_degree;
use crate::error::{Defect, DefectKind, Diagnostics, Result};
use crate::geometry::{line_endpoints, merge_multilinestring, nearest_point_on_line, point_distance};
use crate::network::{Edge, Feature, Network, Node};
use crate::spatial::EdgeIndex;
use crate::split::split_edges_at_nodes;
use crate::topology::{drop_duplicate_geometries, geometry_name};

/// Move each node to the nearest point of the nearest edge.
///
/// Nodes farther than `threshold` from every edge stay where they are;
/// `None` snaps unconditionally.
pub fn snap_nodes(network: &Network, threshold: Option<f64>) -> Network {
    let index = EdgeIndex::build(&network.edges);
    let mut out = network.clone();
    let mut snapped = 0usize;
    for node in &mut out.nodes {
        let Some((edge, distance)) = index.nearest(&network.edges, node.geometry) else {
            continue;
        };
        if threshold.is_some_and(|t| distance > t) {
            continue;
        }
        if let Some(point) = nearest_point_on_line(node.geometry, &network.edges[edge].geometry) {
            if point != node.geometry {
                node.geometry = point;
                snapped += 1;
            }
        }
    }
    debug!(snapped, "Snapped nodes to edges");
    out
}

/// Connector geometry from `node` to its nearest point on `edge`, if apart
fn connector(node: &Node, edge: &Edge) -> Option<(Point<f64>, LineString<f64>)> {
    let point = nearest_point_on_line(node.geometry, &edge.geometry)?;
    if point == node.geometry {
        return None;
    }
    Some((point, LineString::from(vec![node.geometry.0, point.0])))
}

fn add_links(
    network: &Network,
    links: Vec<(Point<f64>, LineString<f64>)>,
    tolerance: f64,
) -> Network {
    let mut next_node = network.nodes.iter().map(|n| n.id + 1).max().unwrap_or(0);
    let mut next_edge = network.edges.iter().map(|e| e.id + 1).max().unwrap_or(0);
    let added = links.len();

    let mut unsplit = network.clone();
    for (point, line) in links {
        unsplit.nodes.push(Node::new(next_node, point));
        unsplit.edges.push(Edge::new(next_edge, line));
        next_node += 1;
        next_edge += 1;
    }
    let unsplit = drop_duplicate_geometries(&unsplit);
    info!(links = added, "Linked nodes to edges");
    split_edges_at_nodes(&unsplit, tolerance)
}

/// Link every node to all edges within `distance` accepted by `condition`.
///
/// Each link adds a node at the nearest point of the edge and a connector
/// edge from the original node; edges are then split at the new nodes.
pub fn link_nodes_to_edges_within(
    network: &Network,
    distance: f64,
    condition: impl Fn(&Node, &Edge) -> bool,
    tolerance: f64,
) -> Network {
    let index = EdgeIndex::build(&network.edges);
    let mut links = Vec::new();
    for node in &network.nodes {
        for (e, _) in index.within_distance(&network.edges, node.geometry, distance) {
            let edge = &network.edges[e];
            if !condition(node, edge) {
                continue;
            }
            links.extend(connector(node, edge));
        }
    }
    add_links(network, links, tolerance)
}

/// Link every node to its single nearest edge, when `condition` accepts it
pub fn link_nodes_to_nearest_edge(
    network: &Network,
    condition: impl Fn(&Node, &Edge) -> bool,
    tolerance: f64,
) -> Network {
    let index = EdgeIndex::build(&network.edges);
    let mut links = Vec::new();
    for node in &network.nodes {
        let Some((e, _)) = index.nearest(&network.edges, node.geometry) else {
            continue;
        };
        let edge = &network.edges[e];
        if condition(node, edge) {
            links.extend(connector(node, edge));
        }
    }
    add_links(network, links, tolerance)
}

/// Distance from a node to an edge's nearest point, for use in conditions
pub fn node_edge_distance(node: &Node, edge: &Edge) -> f64 {
    nearest_point_on_line(node.geometry, &edge.geometry)
        .map(|p| point_distance(p, node.geometry))
        .unwrap_or(f64::INFINITY)
}

/// Closer end node of the edge nearest to `point`, if within `threshold`
fn anchor_node(
    network: &Network,
    index: &EdgeIndex,
    ends: &[(usize, usize)],
    point: Point<f64>,
    threshold: f64,
) -> Option<(usize, usize)> {
    let (edge, distance) = index.nearest(&network.edges, point)?;
    if distance > threshold {
        return None;
    }
    let (from, to) = ends[edge];
    let from_is_closer = point_distance(point, network.nodes[from].geometry)
        < point_distance(point, network.nodes[to].geometry);
    Some((edge, if from_is_closer { from } else { to }))
}

/// Attach modal routes (ferry lines and the like) to a simplified network.
///
/// Each route end is anchored to the nearer end node of the nearest edge
/// within `threshold`. The route becomes a new edge between the two anchor
/// nodes, keeping its attributes, with the anchor coordinates added at
/// either end. Node degrees are refreshed afterwards.
///
/// Routes that are not lines, whose ends find no edge, or whose ends land
/// on the same edge are skipped and reported. Returns the network and the
/// number of routes added.
pub fn link_modal_routes(
    network: &Network,
    routes: &[Feature],
    threshold: f64,
    diagnostics: &mut Diagnostics,
) -> Result<(Network, usize)> {
    network.require_dense_node_ids()?;
    let ends = network.edge_ends()?;
    let index = EdgeIndex::build(&network.edges);
    let mut out = network.clone();
    let mut next_edge = network.edges.iter().map(|e| e.id + 1).max().unwrap_or(0);
    let mut skipped = 0usize;

    for (i, route) in routes.iter().enumerate() {
        let line = match &route.geometry {
            Geometry::LineString(line) => Some(line.clone()),
            Geometry::MultiLineString(multi) => merge_multilinestring(multi, 0.0).ok(),
            _ => None,
        };
        let Some((line, (start, end))) = line.and_then(|l| line_endpoints(&l).map(|e| (l, e)))
        else {
            skipped += 1;
            diagnostics.push(Defect::new(
                DefectKind::MalformedGeometry,
                format!(
                    "route {} is a {} and not a single line",
                    i,
                    geometry_name(&route.geometry)
                ),
            ));
            continue;
        };

        let near_start = anchor_node(network, &index, &ends, start, threshold);
        let near_end = anchor_node(network, &index, &ends, end, threshold);
        let (Some((start_edge, from)), Some((end_edge, to))) = (near_start, near_end) else {
            skipped += 1;
            diagnostics.push(Defect::new(
                DefectKind::UnresolvedEndpoint,
                format!("route {} has an end farther than {} from every edge", i, threshold),
            ));
            continue;
        };
        if start_edge == end_edge {
            skipped += 1;
            diagnostics.push(Defect::on_edge(
                DefectKind::UnresolvedEndpoint,
                network.edges[start_edge].id,
                format!("both ends of route {} land on the same edge", i),
            ));
            continue;
        }

        let mut coords = line.0;
        let (from_coord, to_coord) = (network.nodes[from].geometry.0, network.nodes[to].geometry.0);
        if coords.first() != Some(&from_coord) {
            coords.insert(0, from_coord);
        }
        if coords.last() != Some(&to_coord) {
            coords.push(to_coord);
        }
        out.edges.push(
            Edge::new(next_edge, LineString::new(coords))
                .with_ends(from, to)
                .with_attributes(route.attributes.clone()),
        );
        next_edge += 1;
    }

    let added = routes.len() - skipped;
    if skipped > 0 {
        warn!(skipped, "Modal routes not linked");
    }
    info!(routes = added, "Linked modal routes");
    Ok((add_degree(&out)?, added))
}
