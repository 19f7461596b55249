//! Dense id assignment and reference remapping
//!
//! Stages that drop or add rows leave gaps in the id space. Every per-node
//! array downstream is indexed by id, so after such a stage ids are reset to
//! `0..n-1` (relative order kept) and edge references are rewritten in full.

use rustc_hash::FxHashMap;

use crate::error::{Result, SimplifyError};
use crate::network::{Edge, Network, Node};

/// A record with a mutable integer id
pub trait Identified {
    fn id(&self) -> usize;
    fn set_id(&mut self, id: usize);
}

impl Identified for Node {
    fn id(&self) -> usize {
        self.id
    }

    fn set_id(&mut self, id: usize) {
        self.id = id;
    }
}

impl Identified for Edge {
    fn id(&self) -> usize {
        self.id
    }

    fn set_id(&mut self, id: usize) {
        self.id = id;
    }
}

/// Renumber `records` to `0..n-1` in their current order.
///
/// Returns the old id to new id map. Duplicate old ids keep the first
/// position's mapping.
pub fn assign_dense_ids<T: Identified>(records: &mut [T]) -> FxHashMap<usize, usize> {
    let mut mapping = FxHashMap::default();
    mapping.reserve(records.len());
    for (new_id, record) in records.iter_mut().enumerate() {
        mapping.entry(record.id()).or_insert(new_id);
        record.set_id(new_id);
    }
    mapping
}

/// Rewrite every `from_id`/`to_id` through `mapping`.
///
/// Unset references stay unset. A reference missing from the map is an
/// [`SimplifyError::IndexInconsistency`]: the edge points at a node that no
/// longer exists.
pub fn remap_references(edges: &mut [Edge], mapping: &FxHashMap<usize, usize>) -> Result<()> {
    let lookup = |edge: usize, id: Option<usize>| -> Result<Option<usize>> {
        match id {
            None => Ok(None),
            Some(old) => mapping.get(&old).copied().map(Some).ok_or_else(|| {
                SimplifyError::IndexInconsistency(format!(
                    "edge {} references node {} which is not in the node table",
                    edge, old
                ))
            }),
        }
    };
    for edge in edges.iter_mut() {
        let from_id = lookup(edge.id, edge.from_id)?;
        let to_id = lookup(edge.id, edge.to_id)?;
        edge.from_id = from_id;
        edge.to_id = to_id;
    }
    Ok(())
}

/// Dense ids for nodes and edges, with edge references remapped
pub fn reset_ids(network: &Network) -> Result<Network> {
    let mut out = network.clone();
    let node_map = assign_dense_ids(&mut out.nodes);
    remap_references(&mut out.edges, &node_map)?;
    assign_dense_ids(&mut out.edges);
    Ok(out)
}

/// Dense ids without touching references (topology not built yet)
pub fn add_ids(network: &Network) -> Network {
    let mut out = network.clone();
    assign_dense_ids(&mut out.nodes);
    assign_dense_ids(&mut out.edges);
    for edge in &mut out.edges {
        edge.clear_topology();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, Point};

    fn sparse_network() -> Network {
        let nodes = vec![
            Node::new(10, Point::new(0.0, 0.0)),
            Node::new(20, Point::new(1.0, 0.0)),
            Node::new(30, Point::new(2.0, 0.0)),
        ];
        let mut a = Edge::new(7, line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]).with_ends(10, 20);
        a.attributes.insert("highway".into(), "primary".into());
        let b = Edge::new(3, line_string![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0)]).with_ends(20, 30);
        Network::new(nodes, vec![a, b])
    }

    #[test]
    fn test_reset_keeps_connectivity_and_attributes() {
        let before = sparse_network();
        let after = reset_ids(&before).unwrap();

        assert_eq!(after.nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(after.edges.iter().map(|e| e.id).collect::<Vec<_>>(), vec![0, 1]);

        // same node pairs by geometry, only the numbers changed
        for (old, new) in before.edges.iter().zip(&after.edges) {
            let geom = |net: &Network, id: Option<usize>| {
                net.nodes.iter().find(|n| Some(n.id) == id).map(|n| n.geometry)
            };
            assert_eq!(geom(&before, old.from_id), geom(&after, new.from_id));
            assert_eq!(geom(&before, old.to_id), geom(&after, new.to_id));
            assert_eq!(old.geometry, new.geometry);
            assert_eq!(old.attributes, new.attributes);
        }
        // input untouched
        assert_eq!(before.nodes[0].id, 10);
    }

    #[test]
    fn test_missing_reference_is_an_inconsistency() {
        let mut network = sparse_network();
        network.edges[1].to_id = Some(99);
        assert!(matches!(
            reset_ids(&network),
            Err(SimplifyError::IndexInconsistency(_))
        ));
    }

    #[test]
    fn test_dense_ids_preserve_order() {
        let mut nodes = sparse_network().nodes;
        let mapping = assign_dense_ids(&mut nodes);
        assert_eq!(mapping[&30], 2);
        assert_eq!(nodes[1].id, 1);
    }
}
