//! Geometry utilities
//!
//! Stateless helpers over `geo` line and point types: endpoints, lengths,
//! vertex insertion, splitting, merging and rounding. Distances are planar
//! (CRS units); re-projection is left to the caller.

use geo::{
    Centroid, Closest, ClosestPoint, Coord, EuclideanDistance, EuclideanLength, Line,
    LineLocatePoint, LineString, MultiLineString, Point,
};

/// First and last vertex of a line
pub fn line_endpoints(line: &LineString<f64>) -> Option<(Point<f64>, Point<f64>)> {
    let first = line.0.first()?;
    let last = line.0.last()?;
    Some((Point::from(*first), Point::from(*last)))
}

pub fn coord_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.euclidean_distance(&b)
}

pub fn point_distance(a: Point<f64>, b: Point<f64>) -> f64 {
    a.euclidean_distance(&b)
}

/// Planar length of a line
pub fn line_length(line: &LineString<f64>) -> f64 {
    line.euclidean_length()
}

/// Closed ring: at least four vertices, first and last within `tolerance`
pub fn is_ring(line: &LineString<f64>, tolerance: f64) -> bool {
    match (line.0.first(), line.0.last()) {
        (Some(first), Some(last)) if line.0.len() >= 4 => {
            coord_distance(*first, *last) <= tolerance
        }
        _ => false,
    }
}

/// Length-weighted centroid of a line
pub fn line_centroid(line: &LineString<f64>) -> Option<Point<f64>> {
    line.centroid()
}

/// Nearest point on `line` to `point`
pub fn nearest_point_on_line(point: Point<f64>, line: &LineString<f64>) -> Option<Point<f64>> {
    if line.0.len() == 1 {
        return Some(Point::from(line.0[0]));
    }
    match line.closest_point(&point) {
        Closest::Intersection(p) | Closest::SinglePoint(p) => Some(p),
        Closest::Indeterminate => None,
    }
}

/// Distance from `point` to `line`, infinite for an empty line
pub fn point_line_distance(point: Point<f64>, line: &LineString<f64>) -> f64 {
    match line.0.len() {
        0 => f64::INFINITY,
        1 => coord_distance(line.0[0], point.0),
        _ => point.euclidean_distance(line),
    }
}

fn segment_distance(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    Line::new(a, b).euclidean_distance(&Point::from(p))
}

/// Fraction along segment `a`-`b` of the projection of `p`, in [0, 1]
fn segment_parameter(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> f64 {
    Line::new(a, b)
        .line_locate_point(&Point::from(p))
        .unwrap_or(0.0)
}

/// Index of the vertex of `line` nearest to `point` (lowest index on ties)
pub fn nearest_vertex_idx(point: Coord<f64>, line: &LineString<f64>) -> Option<usize> {
    line.0
        .iter()
        .enumerate()
        .map(|(i, c)| (i, coord_distance(*c, point)))
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
        .map(|(i, _)| i)
}

/// Where a point lands on a line
#[derive(Debug, Clone, Copy, PartialEq)]
enum Placement {
    /// Coincides with an existing vertex
    Vertex(usize),
    /// Belongs inside segment `seg` (between vertices `seg` and `seg + 1`)
    Segment { seg: usize, t: f64 },
}

/// Nearest vertex first, then the nearer of its two adjacent segments
fn placement(point: Coord<f64>, line: &LineString<f64>) -> Option<Placement> {
    let coords = &line.0;
    if coords.len() < 2 {
        return None;
    }
    let v = nearest_vertex_idx(point, line)?;
    if coords[v] == point {
        return Some(Placement::Vertex(v));
    }
    let last = coords.len() - 1;
    let seg = if v == 0 {
        0
    } else if v == last {
        last - 1
    } else {
        let before = segment_distance(point, coords[v], coords[v - 1]);
        let after = segment_distance(point, coords[v], coords[v + 1]);
        if before < after {
            v - 1
        } else {
            v
        }
    };
    let t = segment_parameter(point, coords[seg], coords[seg + 1]);
    Some(Placement::Segment { seg, t })
}

#[derive(Debug, Clone, Copy)]
enum Cut {
    Vertex(usize),
    Insert { seg: usize, coord: Coord<f64> },
}

impl Cut {
    fn coord(&self, coords: &[Coord<f64>]) -> Coord<f64> {
        match *self {
            Cut::Vertex(k) => coords[k],
            Cut::Insert { coord, .. } => coord,
        }
    }
}

/// Split `line` at every point lying within `tolerance` of it.
///
/// Each point is placed at its nearest vertex or on the nearer adjacent
/// segment of that vertex, then the cuts are ordered along the
/// line and cut in sequence, so several points on one line yield pieces in
/// vertex order. Points at the line's own endpoints do not split.
pub fn split_line_at_points(
    line: &LineString<f64>,
    points: &[Point<f64>],
    tolerance: f64,
) -> Vec<LineString<f64>> {
    let coords = &line.0;
    if coords.len() < 2 {
        return vec![line.clone()];
    }
    let first = coords[0];
    let last = coords[coords.len() - 1];

    let mut cuts: Vec<(f64, Cut)> = Vec::new();
    for point in points {
        let p = point.0;
        if point_line_distance(*point, line) > tolerance {
            continue;
        }
        if coord_distance(p, first) <= tolerance || coord_distance(p, last) <= tolerance {
            continue;
        }
        match placement(p, line) {
            Some(Placement::Vertex(k)) if k > 0 && k < coords.len() - 1 => {
                cuts.push((k as f64, Cut::Vertex(k)));
            }
            Some(Placement::Segment { seg, t }) => {
                cuts.push((seg as f64 + t, Cut::Insert { seg, coord: p }));
            }
            _ => {}
        }
    }
    if cuts.is_empty() {
        return vec![line.clone()];
    }

    cuts.sort_by(|a, b| a.0.total_cmp(&b.0));
    cuts.dedup_by(|a, b| a.1.coord(coords) == b.1.coord(coords));

    let mut pieces = Vec::with_capacity(cuts.len() + 1);
    let mut current = vec![first];
    let mut next_vertex = 1;
    for (_, cut) in cuts {
        match cut {
            Cut::Vertex(k) => {
                current.extend_from_slice(&coords[next_vertex..=k]);
                pieces.push(std::mem::replace(&mut current, vec![coords[k]]));
                next_vertex = k + 1;
            }
            Cut::Insert { seg, coord } => {
                if next_vertex <= seg {
                    current.extend_from_slice(&coords[next_vertex..=seg]);
                    next_vertex = seg + 1;
                }
                current.push(coord);
                pieces.push(std::mem::replace(&mut current, vec![coord]));
            }
        }
    }
    current.extend_from_slice(&coords[next_vertex..]);
    pieces.push(current);

    pieces
        .into_iter()
        .filter(|piece| piece.iter().any(|c| *c != piece[0]))
        .map(LineString::new)
        .collect()
}

/// Chain lines sharing endpoints into one path, or return the disjoint parts
fn merge_lines(
    lines: &[LineString<f64>],
    tolerance: f64,
) -> Result<LineString<f64>, MultiLineString<f64>> {
    let mut pending: Vec<&LineString<f64>> = lines.iter().filter(|l| !l.0.is_empty()).collect();
    if pending.is_empty() {
        return Err(MultiLineString::new(Vec::new()));
    }
    let mut path: Vec<Coord<f64>> = pending.remove(0).0.clone();

    loop {
        let head = path[0];
        let tail = path[path.len() - 1];
        let close = |a: Coord<f64>, b: Coord<f64>| coord_distance(a, b) <= tolerance;

        let joined = pending.iter().position(|l| {
            let (start, end) = (l.0[0], l.0[l.0.len() - 1]);
            close(tail, start) || close(tail, end) || close(head, end) || close(head, start)
        });
        let Some(i) = joined else { break };
        let next = pending.remove(i);
        let n = next.0.len();
        let (start, end) = (next.0[0], next.0[n - 1]);

        if close(tail, start) {
            path.extend_from_slice(&next.0[1..]);
        } else if close(tail, end) {
            path.extend(next.0[..n - 1].iter().rev());
        } else if close(head, end) {
            let mut joined: Vec<Coord<f64>> = next.0[..n - 1].to_vec();
            joined.extend_from_slice(&path);
            path = joined;
        } else {
            let mut joined: Vec<Coord<f64>> = next.0[1..].iter().rev().copied().collect();
            joined.extend_from_slice(&path);
            path = joined;
        }
    }

    if pending.is_empty() {
        Ok(LineString::new(path))
    } else {
        let mut parts = vec![LineString::new(path)];
        parts.extend(pending.into_iter().cloned());
        Err(MultiLineString::new(parts))
    }
}

/// Merge a MultiLineString into a LineString when its parts form one path.
///
/// Parts are joined end to end (reversing them as needed) when their
/// endpoints lie within `tolerance`. Returns the disjoint parts otherwise.
pub fn merge_multilinestring(
    lines: &MultiLineString<f64>,
    tolerance: f64,
) -> Result<LineString<f64>, MultiLineString<f64>> {
    merge_lines(&lines.0, tolerance)
}

pub fn round_coord(coord: Coord<f64>, precision: u32) -> Coord<f64> {
    let factor = 10f64.powi(precision as i32);
    Coord {
        x: (coord.x * factor).round() / factor,
        y: (coord.y * factor).round() / factor,
    }
}

pub fn round_line(line: &LineString<f64>, precision: u32) -> LineString<f64> {
    line.coords().map(|c| round_coord(*c, precision)).collect()
}

pub fn round_point(point: Point<f64>, precision: u32) -> Point<f64> {
    Point::from(round_coord(point.0, precision))
}

/// Hashable key of a coordinate (exact match, `-0.0 == 0.0`)
pub fn coord_key(coord: Coord<f64>) -> (u64, u64) {
    let norm = |v: f64| if v == 0.0 { 0.0f64 } else { v };
    (norm(coord.x).to_bits(), norm(coord.y).to_bits())
}
