//! Error types for butterfly-simplify
//!
//! Two layers:
//! - [`SimplifyError`]: systemic failures that stop the pipeline (broken
//!   references, I/O, malformed configuration).
//! - [`Defect`]: a problem local to one edge or node. Defects are recovered
//!   by excluding the item and are collected in [`Diagnostics`] so that every
//!   exclusion is counted and reported.

use std::collections::BTreeMap;
use std::fmt;

/// Result type for butterfly-simplify operations
pub type Result<T> = std::result::Result<T, SimplifyError>;

/// Main error type for butterfly-simplify operations
#[derive(Debug, thiserror::Error)]
pub enum SimplifyError {
    /// Edge/node tables disagree (dangling reference, degree mismatch, sparse ids)
    #[error("Index inconsistency: {0}")]
    IndexInconsistency(String),

    /// A stage that needs resolved `from_id`/`to_id` ran before topology building
    #[error("Edge {edge} has no topology (run add_topology first)")]
    MissingTopology { edge: usize },

    /// A persisted node or edge table that cannot be read back
    #[error("Invalid table: {0}")]
    InvalidTable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

/// Kind of a recoverable, per-item defect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DefectKind {
    /// An edge endpoint has no node within tolerance; the edge is dropped
    UnresolvedEndpoint,
    /// A degree-2 merge was aborted; the original edges are kept
    DegenerateMerge,
    /// Geometry that cannot become an edge or node (wrong type, too few points)
    MalformedGeometry,
    /// An edge touches more roundabouts than it has free ends
    RoundaboutConflict,
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DefectKind::UnresolvedEndpoint => "unresolved endpoint",
            DefectKind::DegenerateMerge => "degenerate merge",
            DefectKind::MalformedGeometry => "malformed geometry",
            DefectKind::RoundaboutConflict => "roundabout conflict",
        };
        f.write_str(name)
    }
}

/// A defect attached to one edge or node
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct Defect {
    pub kind: DefectKind,
    pub edge: Option<usize>,
    pub node: Option<usize>,
    pub detail: String,
}

impl Defect {
    /// Defect on an input item that is not part of the network
    pub fn new(kind: DefectKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            edge: None,
            node: None,
            detail: detail.into(),
        }
    }

    pub fn on_edge(kind: DefectKind, edge: usize, detail: impl Into<String>) -> Self {
        Self {
            kind,
            edge: Some(edge),
            node: None,
            detail: detail.into(),
        }
    }

    pub fn on_node(kind: DefectKind, node: usize, detail: impl Into<String>) -> Self {
        Self {
            kind,
            edge: None,
            node: Some(node),
            detail: detail.into(),
        }
    }
}

/// Accumulated defects of a pipeline run
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    defects: Vec<Defect>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, defect: Defect) {
        tracing::trace!(kind = %defect.kind, edge = ?defect.edge, node = ?defect.node, "{}", defect.detail);
        self.defects.push(defect);
    }

    pub fn extend(&mut self, defects: impl IntoIterator<Item = Defect>) {
        for defect in defects {
            self.push(defect);
        }
    }

    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    pub fn len(&self) -> usize {
        self.defects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defects.is_empty()
    }

    /// Number of defects of one kind
    pub fn count(&self, kind: DefectKind) -> usize {
        self.defects.iter().filter(|d| d.kind == kind).count()
    }

    /// Defect counts per kind, in a stable order
    pub fn counts(&self) -> BTreeMap<DefectKind, usize> {
        let mut counts = BTreeMap::new();
        for defect in &self.defects {
            *counts.entry(defect.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Defects recorded after position `from` (used to forward a stage's defects)
    pub fn since(&self, from: usize) -> &[Defect] {
        &self.defects[from.min(self.defects.len())..]
    }
}
