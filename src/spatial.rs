//! Spatial indexes over nodes and edges
//!
//! Thin wrappers around `rstar` R-trees. Indexes are bulk-loaded from a
//! slice and never updated: a stage that changes geometry builds a fresh
//! index before querying again. Query results are positions into the slice
//! the index was built from, sorted ascending so callers iterate
//! deterministically. An empty result means "no candidate".

use geo::{BoundingRect, LineString, Point};
use rstar::{Envelope, PointDistance, RTree, RTreeObject, AABB};

use crate::geometry::point_line_distance;
use crate::network::{Edge, Node};

/// Node position for the R-tree
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexedPoint {
    pub coords: [f64; 2], // [x, y]
    pub idx: usize,
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.coords)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.coords[0] - point[0];
        let dy = self.coords[1] - point[1];
        dx * dx + dy * dy
    }

    fn contains_point(&self, point: &[f64; 2]) -> bool {
        self.coords == *point
    }
}

/// Edge bounding box for the R-tree
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IndexedBox {
    pub bbox: AABB<[f64; 2]>,
    pub idx: usize,
}

impl RTreeObject for IndexedBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bbox
    }
}

impl PointDistance for IndexedBox {
    /// Distance to the box, a lower bound of the distance to the line inside
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.bbox.distance_2(point)
    }
}

/// Bounding box of a line, `None` when it has no vertices
pub fn line_bbox(line: &LineString<f64>) -> Option<AABB<[f64; 2]>> {
    let rect = line.bounding_rect()?;
    let (min, max) = (rect.min(), rect.max());
    Some(AABB::from_corners([min.x, min.y], [max.x, max.y]))
}

fn expand(bbox: AABB<[f64; 2]>, tolerance: f64) -> AABB<[f64; 2]> {
    let lower = bbox.lower();
    let upper = bbox.upper();
    AABB::from_corners(
        [lower[0] - tolerance, lower[1] - tolerance],
        [upper[0] + tolerance, upper[1] + tolerance],
    )
}

/// Spatial index over node points
pub struct NodeIndex {
    tree: RTree<IndexedPoint>,
}

impl NodeIndex {
    pub fn build(nodes: &[Node]) -> Self {
        Self::from_points(nodes.iter().map(|n| n.geometry))
    }

    pub fn from_points(points: impl IntoIterator<Item = Point<f64>>) -> Self {
        let points: Vec<IndexedPoint> = points
            .into_iter()
            .enumerate()
            .map(|(idx, p)| IndexedPoint {
                coords: [p.x(), p.y()],
                idx,
            })
            .collect();
        Self {
            tree: RTree::bulk_load(points),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Nearest node and its distance; equidistant nodes resolve to the lowest position
    pub fn nearest(&self, point: Point<f64>) -> Option<(usize, f64)> {
        let target = [point.x(), point.y()];
        let mut best: Option<(usize, f64)> = None;
        for (candidate, d2) in self.tree.nearest_neighbor_iter_with_distance_2(&target) {
            match best {
                Some((_, best_d2)) if d2 > best_d2 => break,
                Some((idx, best_d2)) if d2 == best_d2 && idx < candidate.idx => {}
                _ => best = Some((candidate.idx, d2)),
            }
        }
        best.map(|(idx, d2)| (idx, d2.sqrt()))
    }

    /// Nearest node no farther than `tolerance`
    pub fn nearest_within(&self, point: Point<f64>, tolerance: f64) -> Option<usize> {
        self.nearest(point)
            .filter(|(_, distance)| *distance <= tolerance)
            .map(|(idx, _)| idx)
    }

    /// Nodes within `tolerance` of `point`
    pub fn query_point(&self, point: Point<f64>, tolerance: f64) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .tree
            .locate_within_distance([point.x(), point.y()], tolerance * tolerance)
            .map(|p| p.idx)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Nodes lying within `tolerance` of `line`
    pub fn query_intersecting(&self, line: &LineString<f64>, tolerance: f64) -> Vec<usize> {
        let Some(bbox) = line_bbox(line) else {
            return Vec::new();
        };
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&expand(bbox, tolerance))
            .filter(|p| point_line_distance(Point::new(p.coords[0], p.coords[1]), line) <= tolerance)
            .map(|p| p.idx)
            .collect();
        hits.sort_unstable();
        hits
    }
}

/// Spatial index over edge geometries.
///
/// The tree stores bounding boxes only; exact tests read the geometry from
/// the same edge slice the index was built from.
pub struct EdgeIndex {
    tree: RTree<IndexedBox>,
}

impl EdgeIndex {
    pub fn build(edges: &[Edge]) -> Self {
        Self::from_lines(edges.iter().map(|e| &e.geometry))
    }

    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a LineString<f64>>) -> Self {
        let boxes: Vec<IndexedBox> = lines
            .into_iter()
            .enumerate()
            .filter_map(|(idx, line)| line_bbox(line).map(|bbox| IndexedBox { bbox, idx }))
            .collect();
        Self {
            tree: RTree::bulk_load(boxes),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Edges whose bounding box comes within `tolerance` of `line`'s
    pub fn candidates(&self, line: &LineString<f64>, tolerance: f64) -> Vec<usize> {
        let Some(bbox) = line_bbox(line) else {
            return Vec::new();
        };
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&expand(bbox, tolerance))
            .map(|b| b.idx)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Edges whose bounding box comes within `tolerance` of `point`
    pub fn candidates_at(&self, point: Point<f64>, tolerance: f64) -> Vec<usize> {
        let query = AABB::from_point([point.x(), point.y()]);
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&expand(query, tolerance))
            .map(|b| b.idx)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Edges passing within `tolerance` of `point`
    pub fn query_point(&self, edges: &[Edge], point: Point<f64>, tolerance: f64) -> Vec<usize> {
        self.candidates_at(point, tolerance)
            .into_iter()
            .filter(|&idx| point_line_distance(point, &edges[idx].geometry) <= tolerance)
            .collect()
    }

    /// Edge nearest to `point` with its exact distance.
    ///
    /// Boxes are visited by increasing box distance; the scan stops once a
    /// box is farther than the best exact distance found.
    pub fn nearest(&self, edges: &[Edge], point: Point<f64>) -> Option<(usize, f64)> {
        let target = [point.x(), point.y()];
        let mut best: Option<(usize, f64)> = None;
        for (candidate, box_d2) in self.tree.nearest_neighbor_iter_with_distance_2(&target) {
            if let Some((_, best_d)) = best {
                if box_d2 > best_d * best_d {
                    break;
                }
            }
            let d = point_line_distance(point, &edges[candidate.idx].geometry);
            best = match best {
                Some((idx, best_d)) if best_d < d || (best_d == d && idx < candidate.idx) => {
                    Some((idx, best_d))
                }
                _ => Some((candidate.idx, d)),
            };
        }
        best
    }

    /// Edges passing within `distance` of `point`, nearest first
    pub fn within_distance(
        &self,
        edges: &[Edge],
        point: Point<f64>,
        distance: f64,
    ) -> Vec<(usize, f64)> {
        let mut hits: Vec<(usize, f64)> = self
            .query_point(edges, point, distance)
            .into_iter()
            .map(|idx| (idx, point_line_distance(point, &edges[idx].geometry)))
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point};

    fn nodes(points: &[(f64, f64)]) -> Vec<Node> {
        points
            .iter()
            .enumerate()
            .map(|(i, (x, y))| Node::new(i, Point::new(*x, *y)))
            .collect()
    }

    #[test]
    fn test_nearest_node_breaks_ties_by_position() {
        let index = NodeIndex::build(&nodes(&[(1.0, 0.0), (-1.0, 0.0), (5.0, 5.0)]));
        let (idx, d) = index.nearest(point!(x: 0.0, y: 0.0)).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(d, 1.0);
        assert_eq!(index.nearest_within(point!(x: 0.0, y: 0.0), 0.5), None);
        assert_eq!(index.nearest_within(point!(x: 5.0, y: 5.0), 1e-9), Some(2));
    }

    #[test]
    fn test_empty_index_has_no_candidates() {
        let index = NodeIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.nearest(point!(x: 0.0, y: 0.0)).is_none());
        assert!(index
            .query_intersecting(&line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0)], 1.0)
            .is_empty());
    }

    #[test]
    fn test_nodes_on_line() {
        let index = NodeIndex::build(&nodes(&[(0.5, 0.0), (0.5, 0.1), (3.0, 0.0)]));
        let line = line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)];
        assert_eq!(index.query_intersecting(&line, 1e-9), vec![0]);
        assert_eq!(index.query_intersecting(&line, 0.2), vec![0, 1]);
    }

    #[test]
    fn test_nearest_edge_uses_exact_distance() {
        // the long diagonal has the closer box, the short edge is the closer line
        let edges = vec![
            Edge::new(0, line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 10.0)]),
            Edge::new(1, line_string![(x: 4.0, y: 6.5), (x: 6.0, y: 6.5)]),
        ];
        let index = EdgeIndex::build(&edges);
        let (idx, d) = index.nearest(&edges, point!(x: 5.0, y: 6.0)).unwrap();
        assert_eq!(idx, 1);
        assert!((d - 0.5).abs() < 1e-12);

        let near = index.within_distance(&edges, point!(x: 5.0, y: 6.0), 1.0);
        assert_eq!(near.iter().map(|h| h.0).collect::<Vec<_>>(), vec![1, 0]);
    }

    #[test]
    fn test_edges_at_point() {
        let edges = vec![
            Edge::new(0, line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]),
            Edge::new(1, line_string![(x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]),
            Edge::new(2, line_string![(x: 0.0, y: 0.5), (x: 2.0, y: 0.5)]),
        ];
        let index = EdgeIndex::build(&edges);
        assert_eq!(index.query_point(&edges, point!(x: 1.0, y: 0.0), 1e-9), vec![0, 1]);
        assert_eq!(index.candidates(&edges[0].geometry, 0.0), vec![0, 1]);
        assert_eq!(index.candidates(&edges[0].geometry, 0.5), vec![0, 1, 2]);
    }
}
