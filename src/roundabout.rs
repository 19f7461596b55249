//! Roundabout collapsing
//!
//! A roundabout is an edge whose geometry is a closed ring. Each ring is
//! dissolved into its centroid: every other edge touching the ring gets the
//! centroid spliced onto its end closer to the centroid, and the ring edge
//! itself is removed. Must run before splitting and topology building since
//! it changes which line ends exist.
//!
//! An edge end can be anchored to one roundabout only. A second roundabout
//! anchors the other end if it is still free; when both ends are taken the
//! contact is reported as [`DefectKind::RoundaboutConflict`] and ignored.

use geo::{Intersects, LineString, Point};
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::error::{Defect, DefectKind, Diagnostics};
use crate::geometry::{is_ring, line_centroid, line_endpoints, point_distance, point_line_distance};
use crate::ids::assign_dense_ids;
use crate::network::Network;
use crate::spatial::EdgeIndex;

/// Result statistics of one collapse pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundaboutStats {
    pub roundabouts: usize,
    pub rerouted_edges: usize,
    pub conflicts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum End {
    Start,
    End,
}

/// A rerouted edge not yet written back
#[derive(Debug, Clone)]
struct Reroute {
    geometry: LineString<f64>,
    start_anchored: bool,
    end_anchored: bool,
}

impl Reroute {
    fn new(geometry: LineString<f64>) -> Self {
        Self {
            geometry,
            start_anchored: false,
            end_anchored: false,
        }
    }

    fn is_free(&self, end: End) -> bool {
        match end {
            End::Start => !self.start_anchored,
            End::End => !self.end_anchored,
        }
    }

    fn anchor(&mut self, end: End, centroid: Point<f64>) {
        match end {
            End::Start => {
                self.geometry.0.insert(0, centroid.0);
                self.start_anchored = true;
            }
            End::End => {
                self.geometry.0.push(centroid.0);
                self.end_anchored = true;
            }
        }
    }
}

/// Edges touching `ring`: they intersect it, or one of their ends lies
/// within `tolerance` of it
fn touches(ring: &LineString<f64>, line: &LineString<f64>, tolerance: f64) -> bool {
    if ring.intersects(line) {
        return true;
    }
    line_endpoints(line).is_some_and(|(start, end)| {
        point_line_distance(start, ring) <= tolerance || point_line_distance(end, ring) <= tolerance
    })
}

/// Positions of edges whose geometry is a closed ring
pub fn find_roundabouts(network: &Network, tolerance: f64) -> Vec<usize> {
    network
        .edges
        .iter()
        .enumerate()
        .filter(|(_, e)| is_ring(&e.geometry, tolerance))
        .map(|(i, _)| i)
        .collect()
}

/// Collapse every roundabout into its centroid.
///
/// Rings are processed in edge order. Reroutes are keyed by edge id, so a
/// second roundabout touching the same edge reads the geometry already
/// rewritten by the first. Output edge ids are dense; topology is cleared on
/// rerouted edges.
pub fn collapse_roundabouts(
    network: &Network,
    tolerance: f64,
    diagnostics: &mut Diagnostics,
) -> (Network, RoundaboutStats) {
    let rings = find_roundabouts(network, tolerance);
    let mut stats = RoundaboutStats::default();
    if rings.is_empty() {
        return (network.clone(), stats);
    }

    let mut is_roundabout = vec![false; network.edges.len()];
    for &r in &rings {
        is_roundabout[r] = true;
    }

    let index = EdgeIndex::build(&network.edges);
    let mut reroutes: FxHashMap<usize, Reroute> = FxHashMap::default();
    let mut removed = vec![false; network.edges.len()];

    for &r in &rings {
        let ring = &network.edges[r];
        let Some(centroid) = line_centroid(&ring.geometry) else {
            diagnostics.push(Defect::on_edge(
                DefectKind::MalformedGeometry,
                ring.id,
                "roundabout has no centroid",
            ));
            continue;
        };
        removed[r] = true;
        stats.roundabouts += 1;

        for j in index.candidates(&ring.geometry, tolerance) {
            if is_roundabout[j] {
                continue;
            }
            let edge = &network.edges[j];
            if !touches(&ring.geometry, &edge.geometry, tolerance) {
                continue;
            }
            let reroute = reroutes
                .entry(edge.id)
                .or_insert_with(|| Reroute::new(edge.geometry.clone()));
            let Some((start, end)) = line_endpoints(&reroute.geometry) else {
                continue;
            };
            let closer = if point_distance(end, centroid) > point_distance(start, centroid) {
                End::Start
            } else {
                End::End
            };
            let other = match closer {
                End::Start => End::End,
                End::End => End::Start,
            };
            if reroute.is_free(closer) {
                reroute.anchor(closer, centroid);
            } else if reroute.is_free(other) {
                reroute.anchor(other, centroid);
            } else {
                stats.conflicts += 1;
                diagnostics.push(Defect::on_edge(
                    DefectKind::RoundaboutConflict,
                    edge.id,
                    format!("both ends already anchored, roundabout {} ignored", ring.id),
                ));
            }
        }
    }

    let mut edges = Vec::with_capacity(network.edges.len());
    for (i, edge) in network.edges.iter().enumerate() {
        if removed[i] {
            continue;
        }
        let mut edge = edge.clone();
        if let Some(reroute) = reroutes.remove(&edge.id) {
            edge.geometry = reroute.geometry;
            edge.clear_topology();
            stats.rerouted_edges += 1;
        }
        edges.push(edge);
    }
    assign_dense_ids(&mut edges);

    if stats.conflicts > 0 {
        warn!(conflicts = stats.conflicts, "Edges touching too many roundabouts");
    }
    debug!(?stats, "Roundabout collapse details");
    info!(
        roundabouts = stats.roundabouts,
        rerouted = stats.rerouted_edges,
        "Collapsed roundabouts"
    );
    (Network::new(network.nodes.clone(), edges), stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Edge;
    use geo::{line_string, point};

    fn square(cx: f64, cy: f64) -> LineString<f64> {
        line_string![
            (x: cx + 1.0, y: cy + 1.0),
            (x: cx - 1.0, y: cy + 1.0),
            (x: cx - 1.0, y: cy - 1.0),
            (x: cx + 1.0, y: cy - 1.0),
            (x: cx + 1.0, y: cy + 1.0),
        ]
    }

    #[test]
    fn test_ring_with_two_arms() {
        let network = Network::from_lines(vec![
            line_string![(x: 1.0, y: 0.0), (x: 3.0, y: 0.0)],
            square(0.0, 0.0),
            line_string![(x: -3.0, y: 0.0), (x: -1.0, y: 0.0)],
            line_string![(x: 10.0, y: 10.0), (x: 11.0, y: 10.0)],
        ]);
        let mut diagnostics = Diagnostics::new();
        let (collapsed, stats) = collapse_roundabouts(&network, 1e-9, &mut diagnostics);

        assert!(diagnostics.is_empty());
        assert_eq!(stats.roundabouts, 1);
        assert_eq!(stats.rerouted_edges, 2);
        assert_eq!(collapsed.edges.len(), 3);
        assert!(find_roundabouts(&collapsed, 1e-9).is_empty());
        assert_eq!(
            collapsed.edges[0].geometry,
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 3.0, y: 0.0)]
        );
        assert_eq!(
            collapsed.edges[1].geometry,
            line_string![(x: -3.0, y: 0.0), (x: -1.0, y: 0.0), (x: 0.0, y: 0.0)]
        );
        assert_eq!(collapsed.edges[2].geometry, network.edges[3].geometry);
        assert_eq!(collapsed.edges.iter().map(|e| e.id).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_edge_between_two_roundabouts_is_anchored_at_both_ends() {
        let network = Network::from_lines(vec![
            square(0.0, 0.0),
            square(10.0, 0.0),
            line_string![(x: 1.0, y: 0.0), (x: 9.0, y: 0.0)],
        ]);
        let mut diagnostics = Diagnostics::new();
        let (collapsed, _) = collapse_roundabouts(&network, 1e-9, &mut diagnostics);

        assert_eq!(collapsed.edges.len(), 1);
        assert_eq!(
            collapsed.edges[0].geometry,
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 9.0, y: 0.0), (x: 10.0, y: 0.0)]
        );
    }

    #[test]
    fn test_third_roundabout_on_anchored_edge_is_a_conflict() {
        let network = Network::from_lines(vec![
            square(0.0, 0.0),
            square(10.0, 0.0),
            square(5.0, 0.0),
            line_string![(x: 1.0, y: 0.0), (x: 9.0, y: 0.0)],
        ]);
        let mut diagnostics = Diagnostics::new();
        let (collapsed, stats) = collapse_roundabouts(&network, 1e-9, &mut diagnostics);

        assert_eq!(stats.conflicts, 1);
        assert_eq!(diagnostics.count(DefectKind::RoundaboutConflict), 1);
        assert_eq!(diagnostics.defects()[0].edge, Some(3));
        assert_eq!(collapsed.edges.len(), 1);
        assert_eq!(collapsed.edges[0].geometry.0.first(), Some(&point!(x: 0.0, y: 0.0).0));
        assert_eq!(collapsed.edges[0].geometry.0.last(), Some(&point!(x: 10.0, y: 0.0).0));
    }

    #[test]
    fn test_no_rings_is_a_no_op() {
        let network = Network::new(
            Vec::new(),
            vec![Edge::new(0, line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)])],
        );
        let mut diagnostics = Diagnostics::new();
        let (collapsed, stats) = collapse_roundabouts(&network, 1e-9, &mut diagnostics);
        assert_eq!(collapsed, network);
        assert_eq!(stats, RoundaboutStats::default());
    }
}
