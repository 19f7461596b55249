//! Topology building
//!
//! Turns raw features into a node/edge network: multi-part lines are
//! decomposed, a node is placed at every line end, and each edge end is
//! resolved to the nearest node within tolerance.

use geo::{Geometry, LineString, Point};
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use crate::error::{Defect, DefectKind, Diagnostics, Result};
use crate::geometry::{coord_key, line_endpoints, round_line, round_point};
use crate::network::{Attributes, Edge, Feature, Network, Node};
use crate::spatial::NodeIndex;

/// Split features into edges and nodes.
///
/// LineStrings become edges, each part of a MultiLineString becomes its own
/// edge carrying a copy of the parent's attributes. Points and MultiPoints
/// become nodes. Anything else, and lines with fewer than two coordinates,
/// is reported as [`DefectKind::MalformedGeometry`] and left out.
pub fn decompose_features(features: &[Feature]) -> (Network, Vec<Defect>) {
    let mut lines: Vec<(LineString<f64>, &Attributes)> = Vec::new();
    let mut points: Vec<Point<f64>> = Vec::new();
    let mut defects = Vec::new();

    for (i, feature) in features.iter().enumerate() {
        match &feature.geometry {
            Geometry::LineString(line) => lines.push((line.clone(), &feature.attributes)),
            Geometry::MultiLineString(multi) => {
                lines.extend(multi.0.iter().map(|l| (l.clone(), &feature.attributes)));
            }
            Geometry::Point(p) => points.push(*p),
            Geometry::MultiPoint(multi) => points.extend(multi.0.iter().copied()),
            other => defects.push(Defect {
                kind: DefectKind::MalformedGeometry,
                edge: None,
                node: None,
                detail: format!("feature {} has unsupported geometry {}", i, geometry_name(other)),
            }),
        }
    }

    let mut edges = Vec::with_capacity(lines.len());
    for (line, attributes) in lines {
        if line.0.len() < 2 {
            defects.push(Defect {
                kind: DefectKind::MalformedGeometry,
                edge: None,
                node: None,
                detail: format!("line with {} coordinate(s)", line.0.len()),
            });
            continue;
        }
        edges.push(Edge::new(edges.len(), line).with_attributes(attributes.clone()));
    }
    let nodes = points
        .into_iter()
        .enumerate()
        .map(|(id, p)| Node::new(id, p))
        .collect();

    debug!(
        edges = edges.len(),
        defects = defects.len(),
        "Decomposed features"
    );
    (Network::new(nodes, edges), defects)
}

pub(crate) fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// A node at each edge end, not yet deduplicated
pub fn get_endpoints(network: &Network) -> Vec<Point<f64>> {
    network
        .edges
        .iter()
        .filter_map(|e| line_endpoints(&e.geometry))
        .flat_map(|(start, end)| [start, end])
        .collect()
}

/// Append endpoint nodes after the existing nodes.
///
/// Nodes with identical coordinates are dropped, first occurrence kept, so
/// externally supplied nodes win over generated ones. New nodes continue the
/// numbering after the existing ones.
pub fn add_endpoints(network: &Network) -> Network {
    let mut seen: FxHashSet<(u64, u64)> = FxHashSet::default();
    let mut nodes = Vec::with_capacity(network.nodes.len() + 2 * network.edges.len());
    let mut next_id = network.nodes.iter().map(|n| n.id + 1).max().unwrap_or(0);

    for node in &network.nodes {
        if seen.insert(coord_key(node.geometry.0)) {
            nodes.push(node.clone());
        }
    }
    let existing = nodes.len();
    for point in get_endpoints(network) {
        if seen.insert(coord_key(point.0)) {
            nodes.push(Node::new(next_id, point));
            next_id += 1;
        }
    }
    debug!(
        existing,
        added = nodes.len() - existing,
        "Added endpoint nodes"
    );
    Network::new(nodes, network.edges.clone())
}

/// Resolve `from_id`/`to_id` of every edge.
///
/// Each end goes to the nearest node within `tolerance` (lowest position on
/// ties). Edges with an unresolved end are reported as
/// [`DefectKind::UnresolvedEndpoint`] and dropped; nodes are left untouched.
pub fn add_topology(
    network: &Network,
    tolerance: f64,
    diagnostics: &mut Diagnostics,
) -> Result<Network> {
    let index = NodeIndex::build(&network.nodes);
    let mut edges = Vec::with_capacity(network.edges.len());
    let mut dropped = 0usize;

    for edge in &network.edges {
        let resolved = line_endpoints(&edge.geometry).map(|(start, end)| {
            (
                index.nearest_within(start, tolerance),
                index.nearest_within(end, tolerance),
            )
        });
        match resolved {
            Some((Some(from), Some(to))) => {
                let mut edge = edge.clone();
                edge.from_id = Some(network.nodes[from].id);
                edge.to_id = Some(network.nodes[to].id);
                edges.push(edge);
            }
            Some((from, to)) => {
                let which = match (from, to) {
                    (None, None) => "both ends",
                    (None, _) => "start",
                    _ => "end",
                };
                diagnostics.push(Defect::on_edge(
                    DefectKind::UnresolvedEndpoint,
                    edge.id,
                    format!("no node within {} of {}", tolerance, which),
                ));
                dropped += 1;
            }
            None => {
                diagnostics.push(Defect::on_edge(
                    DefectKind::MalformedGeometry,
                    edge.id,
                    "edge has no coordinates",
                ));
                dropped += 1;
            }
        }
    }

    if dropped > 0 {
        warn!(dropped, "Dropped edges with unresolved endpoints");
    }
    info!(edges = edges.len(), nodes = network.nodes.len(), "Topology built");
    Ok(Network::new(network.nodes.clone(), edges))
}

/// Drop nodes and edges whose geometry repeats an earlier one exactly.
///
/// Edge topology is cleared: run before [`add_topology`].
pub fn drop_duplicate_geometries(network: &Network) -> Network {
    let mut seen_points = FxHashSet::default();
    let nodes: Vec<Node> = network
        .nodes
        .iter()
        .filter(|n| seen_points.insert(coord_key(n.geometry.0)))
        .cloned()
        .collect();

    let mut seen_lines: FxHashSet<Vec<(u64, u64)>> = FxHashSet::default();
    let edges: Vec<Edge> = network
        .edges
        .iter()
        .filter(|e| seen_lines.insert(e.geometry.coords().map(|c| coord_key(*c)).collect()))
        .map(|e| {
            let mut e = e.clone();
            e.clear_topology();
            e
        })
        .collect();

    Network::new(nodes, edges)
}

/// Round node and edge coordinates to `precision` decimals
pub fn round_geometries(network: &Network, precision: u32) -> Network {
    let mut out = network.clone();
    for node in &mut out.nodes {
        node.geometry = round_point(node.geometry, precision);
    }
    for edge in &mut out.edges {
        edge.geometry = round_line(&edge.geometry, precision);
    }
    out
}
