//! Pipeline configuration
//!
//! All distances are in the units of the input CRS. The defaults suit
//! geographic (degree) coordinates, matching the usual road extracts.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::prune::DEFAULT_HANGING_TOLERANCE;

/// Simplification pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifyConfig {
    /// Distance within which a line end resolves to a node, and an edge
    /// counts as incident to a node
    pub topology_tolerance: f64,

    /// Distance within which a point splits an edge
    pub split_tolerance: f64,

    /// Closure tolerance for ring (roundabout) detection
    pub ring_tolerance: f64,

    /// Hanging edges shorter than this are dropped
    /// 0.005 degrees ≈ 550m at the equator
    pub hanging_tolerance: f64,

    /// Round coordinates to this many decimals before building topology
    /// (`None` keeps full precision)
    pub precision: Option<u32>,

    pub collapse_roundabouts: bool,
    pub split_at_intersections: bool,
    pub drop_hanging: bool,
    pub contract: bool,

    /// Fail the run when the final consistency check fails
    pub strict: bool,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            topology_tolerance: 1e-9,
            split_tolerance: 1e-9,
            ring_tolerance: 1e-9,
            hanging_tolerance: DEFAULT_HANGING_TOLERANCE,
            precision: None,
            collapse_roundabouts: true,
            split_at_intersections: true,
            drop_hanging: true,
            contract: true,
            strict: true,
        }
    }
}

impl SimplifyConfig {
    /// Geographic coordinates (degrees)
    pub fn geographic_degrees() -> Self {
        Self::default()
    }

    /// Projected coordinates in metres
    pub fn projected_metres() -> Self {
        Self {
            topology_tolerance: 1e-3,
            split_tolerance: 1e-3,
            ring_tolerance: 1e-3,
            hanging_tolerance: 500.0,
            precision: Some(3),
            ..Self::default()
        }
    }

    /// Parse a TOML document; missing keys take their default value
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }
}
