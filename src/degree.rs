//! Node degree
//!
//! Degree is derived from the edge table: one count per `from_id` and one per
//! `to_id`, so a self-loop counts twice. Computed in one bucket pass over the
//! edges.

use tracing::debug;

use crate::error::{Result, SimplifyError};
use crate::network::Network;

/// Degree of every node, indexed by node id (ids must be dense)
pub fn calculate_degree(network: &Network) -> Result<Vec<usize>> {
    network.require_dense_node_ids()?;
    let n = network.nodes.len();
    let mut degree = vec![0usize; n];
    for edge in &network.edges {
        let (from_id, to_id) = edge.ends()?;
        for id in [from_id, to_id] {
            if id >= n {
                return Err(SimplifyError::IndexInconsistency(format!(
                    "edge {} references node {} but only {} nodes exist",
                    edge.id, id, n
                )));
            }
            degree[id] += 1;
        }
    }
    Ok(degree)
}

/// Copy of `network` with `Node::degree` filled in
pub fn add_degree(network: &Network) -> Result<Network> {
    let degree = calculate_degree(network)?;
    let mut out = network.clone();
    for (node, d) in out.nodes.iter_mut().zip(degree) {
        node.degree = Some(d);
    }
    Ok(out)
}

/// Handshake check: `sum(degree) == 2 * |edges|`
pub fn check_degree_sum(degree: &[usize], edge_count: usize) -> Result<()> {
    let sum: usize = degree.iter().sum();
    debug!(degree_sum = sum, edges = edge_count, "Degree sum check");
    if sum != 2 * edge_count {
        return Err(SimplifyError::IndexInconsistency(format!(
            "degree sum {} does not match 2 x {} edges",
            sum, edge_count
        )));
    }
    Ok(())
}

/// Saturating decrement used by stages that keep a live degree array
pub(crate) fn decrement(degree: &mut [usize], id: usize) {
    if let Some(d) = degree.get_mut(id) {
        *d = d.saturating_sub(1);
    }
}
