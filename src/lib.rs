//! # Butterfly-simplify
//!
//! Road network topology building and graph contraction.
//!
//! Turns raw line geometries (an extracted road network) into a clean
//! node/edge graph: roundabouts are collapsed to their centroid, edges are
//! split at junctions, line ends are resolved to nodes, short dead-end stubs
//! are pruned and degree-2 chains are merged into single edges.
//!
//! ```no_run
//! use butterfly_simplify::{read_features, simplify, write_network, SimplifyConfig};
//! use std::path::Path;
//!
//! # fn main() -> butterfly_simplify::Result<()> {
//! let features = read_features(Path::new("roads.geojson"))?;
//! let result = simplify(&features, &SimplifyConfig::geographic_degrees())?;
//! write_network(&result.network, Path::new("nodes.geojson"), Path::new("edges.geojson"))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod contract;
pub mod degree;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod io;
pub mod link;
pub mod network;
pub mod pipeline;
pub mod prune;
pub mod roundabout;
pub mod spatial;
pub mod split;
pub mod topology;
pub mod validate;

pub use config::SimplifyConfig;
pub use contract::{merge_degree2, ContractStats};
pub use degree::{add_degree, calculate_degree, check_degree_sum};
pub use error::{Defect, DefectKind, Diagnostics, Result, SimplifyError};
pub use ids::{add_ids, assign_dense_ids, remap_references, reset_ids};
pub use io::{read_features, read_network, write_network};
pub use link::{
    link_modal_routes, link_nodes_to_edges_within, link_nodes_to_nearest_edge, snap_nodes,
};
pub use network::{Attributes, Edge, Feature, Network, Node};
pub use pipeline::{
    simplify, EdgeEnricher, LengthEnricher, NoopObserver, Observer, PipelineStats, Simplifier,
    SimplifyResult, Stage, TracingObserver,
};
pub use prune::{drop_hanging_nodes, PruneStats, DEFAULT_HANGING_TOLERANCE};
pub use roundabout::{collapse_roundabouts, find_roundabouts, RoundaboutStats};
pub use spatial::{EdgeIndex, NodeIndex};
pub use split::{split_edges_at_intersections, split_edges_at_nodes};
pub use topology::{
    add_endpoints, add_topology, decompose_features, drop_duplicate_geometries, round_geometries,
};
pub use validate::{check_consistency, ConsistencyReport};
