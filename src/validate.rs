//! Network consistency checks
//!
//! Post-pass validation of the node/edge tables:
//! - Dense node and edge ids
//! - Every edge reference resolved and in range
//! - Cached degree equal to the degree computed from the edge table
//! - Handshake sum (`sum(degree) == 2 * |edges|`)
//! - Edge geometries with at least two coordinates
//!
//! Failures are collected in a [`ConsistencyReport`]; the pipeline escalates
//! them through [`ConsistencyReport::into_result`].

use tracing::{debug, warn};

use crate::error::{Result, SimplifyError};
use crate::network::Network;

/// Consistency check results
#[derive(Debug, Default, Clone)]
pub struct ConsistencyReport {
    pub passed: bool,
    pub checks_run: usize,
    pub checks_passed: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConsistencyReport {
    fn new() -> Self {
        Self {
            passed: true,
            ..Default::default()
        }
    }

    fn warn(&mut self, msg: String) {
        self.warnings.push(msg);
    }

    fn check_passed(&mut self) {
        self.checks_run += 1;
        self.checks_passed += 1;
    }

    fn check_failed(&mut self, msg: String) {
        self.checks_run += 1;
        self.passed = false;
        self.errors.push(msg);
    }

    fn check(&mut self, failures: Vec<String>) {
        if failures.is_empty() {
            self.check_passed();
        } else {
            self.check_failed(summarize(&failures));
        }
    }

    /// Escalate a failed report to [`SimplifyError::IndexInconsistency`]
    pub fn into_result(self) -> Result<Self> {
        if self.passed {
            Ok(self)
        } else {
            Err(SimplifyError::IndexInconsistency(self.errors.join("; ")))
        }
    }
}

/// First few failures of one check, with a count of the rest
fn summarize(failures: &[String]) -> String {
    const SHOWN: usize = 3;
    let mut msg = failures[..failures.len().min(SHOWN)].join(", ");
    if failures.len() > SHOWN {
        msg.push_str(&format!(" (+{} more)", failures.len() - SHOWN));
    }
    msg
}

/// Run all consistency checks on `network`
pub fn check_consistency(network: &Network) -> ConsistencyReport {
    let mut report = ConsistencyReport::new();
    let n = network.nodes.len();

    // 1. Dense node ids
    report.check(
        network
            .nodes
            .iter()
            .enumerate()
            .filter(|(i, node)| node.id != *i)
            .map(|(i, node)| format!("node at {} has id {}", i, node.id))
            .collect(),
    );

    // 2. Dense edge ids
    report.check(
        network
            .edges
            .iter()
            .enumerate()
            .filter(|(i, edge)| edge.id != *i)
            .map(|(i, edge)| format!("edge at {} has id {}", i, edge.id))
            .collect(),
    );

    // 3. References resolved and in range
    let mut computed = vec![0usize; n];
    let mut bad_refs = Vec::new();
    for edge in &network.edges {
        match (edge.from_id, edge.to_id) {
            (Some(from), Some(to)) => {
                for id in [from, to] {
                    match computed.get_mut(id) {
                        Some(d) => *d += 1,
                        None => bad_refs.push(format!(
                            "edge {} references node {} (only {} nodes)",
                            edge.id, id, n
                        )),
                    }
                }
            }
            _ => bad_refs.push(format!("edge {} has no topology", edge.id)),
        }
    }
    let refs_ok = bad_refs.is_empty();
    report.check(bad_refs);

    // 4. Cached degree matches the edge table
    let mut uncached = 0usize;
    let mut mismatches = Vec::new();
    for (node, expected) in network.nodes.iter().zip(&computed) {
        match node.degree {
            Some(d) if d != *expected => mismatches.push(format!(
                "node {} caches degree {} but has {}",
                node.id, d, expected
            )),
            Some(_) => {}
            None => uncached += 1,
        }
    }
    if refs_ok {
        report.check(mismatches);
    }
    if uncached > 0 {
        report.warn(format!("{} nodes have no cached degree", uncached));
    }

    // 5. Handshake sum
    let sum: usize = computed.iter().sum();
    if refs_ok && sum != 2 * network.edges.len() {
        report.check_failed(format!(
            "degree sum {} does not match 2 x {} edges",
            sum,
            network.edges.len()
        ));
    } else {
        report.check_passed();
    }

    // 6. Geometry shape
    report.check(
        network
            .edges
            .iter()
            .filter(|e| e.geometry.0.len() < 2)
            .map(|e| format!("edge {} has {} coordinate(s)", e.id, e.geometry.0.len()))
            .collect(),
    );

    let isolated = computed.iter().filter(|&&d| d == 0).count();
    if isolated > 0 {
        report.warn(format!("{} isolated nodes", isolated));
    }

    debug!(
        checks_run = report.checks_run,
        checks_passed = report.checks_passed,
        "Consistency checks"
    );
    for e in &report.errors {
        warn!("Consistency check failed: {}", e);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Edge, Node};
    use geo::{line_string, Point};

    fn valid() -> Network {
        let mut nodes = vec![
            Node::new(0, Point::new(0.0, 0.0)),
            Node::new(1, Point::new(1.0, 0.0)),
        ];
        nodes[0].degree = Some(1);
        nodes[1].degree = Some(1);
        let edges =
            vec![Edge::new(0, line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]).with_ends(0, 1)];
        Network::new(nodes, edges)
    }

    #[test]
    fn test_valid_network_passes() {
        let report = check_consistency(&valid());
        assert!(report.passed, "errors: {:?}", report.errors);
        assert_eq!(report.checks_run, report.checks_passed);
        assert!(report.warnings.is_empty());
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_stale_degree_fails() {
        let mut network = valid();
        network.nodes[1].degree = Some(3);
        let report = check_consistency(&network);
        assert!(!report.passed);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("node 1"));
        assert!(matches!(
            report.into_result(),
            Err(SimplifyError::IndexInconsistency(_))
        ));
    }

    #[test]
    fn test_dangling_reference_fails() {
        let mut network = valid();
        network.edges[0].to_id = Some(7);
        let report = check_consistency(&network);
        assert!(!report.passed);
        assert!(report.errors.iter().any(|e| e.contains("node 7")));
    }

    #[test]
    fn test_sparse_ids_fail() {
        let mut network = valid();
        network.edges[0].id = 4;
        let report = check_consistency(&network);
        assert!(!report.passed);
        assert!(report.errors[0].contains("edge at 0 has id 4"));
    }

    #[test]
    fn test_missing_degree_is_a_warning() {
        let mut network = valid();
        network.nodes[0].degree = None;
        let report = check_consistency(&network);
        assert!(report.passed);
        assert_eq!(report.warnings.len(), 1);
    }
}
