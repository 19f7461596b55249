//! Node and edge tables
//!
//! A [`Network`] is two plain vectors of typed records. Stages never mutate
//! the network they are given: they clone what they need and return a new
//! one, so every stage input stays valid for inspection and testing.

use geo::{Geometry, LineString, Point};
use serde_json::{Map, Value};

use crate::error::{Result, SimplifyError};

/// Opaque passthrough attributes (road class, source id, ...)
pub type Attributes = Map<String, Value>;

/// A point of the network
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: usize,
    pub geometry: Point<f64>,
    /// Cached degree, `None` until computed by the degree engine
    pub degree: Option<usize>,
}

impl Node {
    pub fn new(id: usize, geometry: Point<f64>) -> Self {
        Self {
            id,
            geometry,
            degree: None,
        }
    }
}

/// A line of the network
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: usize,
    pub geometry: LineString<f64>,
    /// Node at the first vertex, `None` until topology is built
    pub from_id: Option<usize>,
    /// Node at the last vertex, `None` until topology is built
    pub to_id: Option<usize>,
    pub attributes: Attributes,
}

impl Edge {
    pub fn new(id: usize, geometry: LineString<f64>) -> Self {
        Self {
            id,
            geometry,
            from_id: None,
            to_id: None,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_ends(mut self, from_id: usize, to_id: usize) -> Self {
        self.from_id = Some(from_id);
        self.to_id = Some(to_id);
        self
    }

    /// Resolved `(from_id, to_id)`
    pub fn ends(&self) -> Result<(usize, usize)> {
        match (self.from_id, self.to_id) {
            (Some(from), Some(to)) => Ok((from, to)),
            _ => Err(SimplifyError::MissingTopology { edge: self.id }),
        }
    }

    /// Drop any resolved topology (geometry changed underneath it)
    pub fn clear_topology(&mut self) {
        self.from_id = None;
        self.to_id = None;
    }
}

/// An input record: any geometry plus passthrough attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry<f64>,
    pub attributes: Attributes,
}

impl Feature {
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: geometry.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// The node and edge tables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Network {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Network {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Network of bare edges, numbered in input order
    pub fn from_lines(lines: impl IntoIterator<Item = LineString<f64>>) -> Self {
        let edges = lines
            .into_iter()
            .enumerate()
            .map(|(id, geometry)| Edge::new(id, geometry))
            .collect();
        Self {
            nodes: Vec::new(),
            edges,
        }
    }

    /// Resolved ends of every edge, in edge order
    pub fn edge_ends(&self) -> Result<Vec<(usize, usize)>> {
        self.edges.iter().map(Edge::ends).collect()
    }

    /// Check `nodes[i].id == i` for all nodes.
    ///
    /// Stages that keep per-node arrays index them by node id, so they refuse
    /// to run on sparse ids.
    pub fn require_dense_node_ids(&self) -> Result<()> {
        match self.nodes.iter().enumerate().find(|(i, n)| n.id != *i) {
            Some((i, node)) => Err(SimplifyError::IndexInconsistency(format!(
                "node at position {} has id {} (ids must be dense, reset ids first)",
                i, node.id
            ))),
            None => Ok(()),
        }
    }

    /// Node by id, assuming dense ids
    pub fn node(&self, id: usize) -> Option<&Node> {
        self.nodes.get(id).filter(|n| n.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    #[test]
    fn test_ends_require_topology() {
        let edge = Edge::new(4, line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]);
        assert!(matches!(
            edge.ends(),
            Err(SimplifyError::MissingTopology { edge: 4 })
        ));
        let edge = edge.with_ends(0, 1);
        assert_eq!(edge.ends().unwrap(), (0, 1));
    }

    #[test]
    fn test_dense_node_ids_are_checked() {
        let mut network = Network::new(
            vec![
                Node::new(0, Point::new(0.0, 0.0)),
                Node::new(1, Point::new(1.0, 0.0)),
            ],
            Vec::new(),
        );
        assert!(network.require_dense_node_ids().is_ok());
        assert!(network.node(1).is_some());

        network.nodes[1].id = 5;
        assert!(network.require_dense_node_ids().is_err());
        assert!(network.node(1).is_none());
    }

    #[test]
    fn test_from_lines_numbers_edges() {
        let network = Network::from_lines(vec![
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)],
            line_string![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0)],
        ]);
        assert_eq!(network.edges[1].id, 1);
        assert!(network.nodes.is_empty());
    }
}
