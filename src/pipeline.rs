//! Simplification pipeline
//!
//! Runs the stages in their fixed order:
//!
//! ```text
//! decompose → round → roundabouts → split → endpoints/ids → topology
//!           → prune → contract → enrich → validate
//! ```
//!
//! Each stage reads the previous stage's network and returns a new one.
//! Progress and per-stage defects are reported to an injected [`Observer`];
//! attribute enrichment is delegated to an optional [`EdgeEnricher`].

use std::fmt;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::SimplifyConfig;
use crate::contract::{merge_degree2, ContractStats};
use crate::degree::{add_degree, calculate_degree, check_degree_sum};
use crate::error::{Defect, Diagnostics, Result};
use crate::geometry::line_length;
use crate::ids::{add_ids, reset_ids};
use crate::network::{Edge, Feature, Network};
use crate::prune::{drop_hanging_nodes, PruneStats};
use crate::roundabout::{collapse_roundabouts, RoundaboutStats};
use crate::split::{split_edges_at_intersections, split_edges_at_nodes};
use crate::topology::{add_endpoints, add_topology, decompose_features, round_geometries};
use crate::validate::{check_consistency, ConsistencyReport};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Decompose,
    Round,
    Roundabouts,
    Split,
    Topology,
    Prune,
    Contract,
    Enrich,
    Validate,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Decompose,
        Stage::Round,
        Stage::Roundabouts,
        Stage::Split,
        Stage::Topology,
        Stage::Prune,
        Stage::Contract,
        Stage::Enrich,
        Stage::Validate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Decompose => "decompose",
            Stage::Round => "round",
            Stage::Roundabouts => "roundabouts",
            Stage::Split => "split",
            Stage::Topology => "topology",
            Stage::Prune => "prune",
            Stage::Contract => "contract",
            Stage::Enrich => "enrich",
            Stage::Validate => "validate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Progress and diagnostics callbacks
pub trait Observer {
    fn stage_started(&mut self, _stage: Stage) {}

    fn stage_finished(&mut self, _stage: Stage, _network: &Network) {}

    /// Defects recorded during `stage` (only called when there are some)
    fn defects(&mut self, _stage: Stage, _defects: &[Defect]) {}

    /// Stage turned off by configuration
    fn stage_skipped(&mut self, _stage: Stage) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Observer logging stage boundaries through `tracing`
#[derive(Debug, Default)]
pub struct TracingObserver {
    started: Option<Instant>,
}

impl Observer for TracingObserver {
    fn stage_started(&mut self, stage: Stage) {
        self.started = Some(Instant::now());
        debug!(%stage, "Stage started");
    }

    fn stage_finished(&mut self, stage: Stage, network: &Network) {
        let elapsed_ms = self
            .started
            .take()
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or_default();
        info!(
            %stage,
            nodes = network.nodes.len(),
            edges = network.edges.len(),
            elapsed_ms,
            "Stage finished"
        );
    }

    fn defects(&mut self, stage: Stage, defects: &[Defect]) {
        warn!(%stage, count = defects.len(), "Defects recorded");
    }

    fn stage_skipped(&mut self, stage: Stage) {
        debug!(%stage, "Stage skipped");
    }
}

/// Attribute enrichment applied to every output edge
pub trait EdgeEnricher {
    fn enrich(&self, edge: &mut Edge);
}

/// Writes the planar line length (CRS units) to an attribute
#[derive(Debug, Clone)]
pub struct LengthEnricher {
    pub attribute: String,
}

impl Default for LengthEnricher {
    fn default() -> Self {
        Self {
            attribute: "length".to_string(),
        }
    }
}

impl EdgeEnricher for LengthEnricher {
    fn enrich(&self, edge: &mut Edge) {
        let length = line_length(&edge.geometry);
        if let Some(n) = serde_json::Number::from_f64(length) {
            edge.attributes.insert(self.attribute.clone(), Value::Number(n));
        }
    }
}

/// Per-stage statistics of one run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub input_features: usize,
    pub roundabouts: RoundaboutStats,
    pub prune: PruneStats,
    pub contract: ContractStats,
}

/// Output of a pipeline run
#[derive(Debug)]
pub struct SimplifyResult {
    pub network: Network,
    pub diagnostics: Diagnostics,
    pub report: ConsistencyReport,
    pub stats: PipelineStats,
}

/// The simplification pipeline with its collaborators
pub struct Simplifier {
    config: SimplifyConfig,
    observer: Box<dyn Observer>,
    enricher: Option<Box<dyn EdgeEnricher>>,
}

impl Simplifier {
    pub fn new(config: SimplifyConfig) -> Self {
        Self {
            config,
            observer: Box::new(TracingObserver::default()),
            enricher: None,
        }
    }

    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn with_enricher(mut self, enricher: impl EdgeEnricher + 'static) -> Self {
        self.enricher = Some(Box::new(enricher));
        self
    }

    pub fn config(&self) -> &SimplifyConfig {
        &self.config
    }

    fn finish(
        &mut self,
        stage: Stage,
        network: &Network,
        diagnostics: &Diagnostics,
        defects_before: usize,
    ) {
        let new = diagnostics.since(defects_before);
        if !new.is_empty() {
            self.observer.defects(stage, new);
        }
        self.observer.stage_finished(stage, network);
    }

    /// Run every stage on `features`
    pub fn run(&mut self, features: &[Feature]) -> Result<SimplifyResult> {
        let config = self.config.clone();
        let mut diagnostics = Diagnostics::new();
        let mut stats = PipelineStats {
            input_features: features.len(),
            ..Default::default()
        };
        info!(features = features.len(), "Simplifying network");

        // Decompose
        self.observer.stage_started(Stage::Decompose);
        let mark = diagnostics.len();
        let (mut network, defects) = decompose_features(features);
        diagnostics.extend(defects);
        self.finish(Stage::Decompose, &network, &diagnostics, mark);

        // Round
        match config.precision {
            Some(precision) => {
                self.observer.stage_started(Stage::Round);
                network = round_geometries(&network, precision);
                self.finish(Stage::Round, &network, &diagnostics, diagnostics.len());
            }
            None => self.observer.stage_skipped(Stage::Round),
        }

        // Roundabouts
        if config.collapse_roundabouts {
            self.observer.stage_started(Stage::Roundabouts);
            let mark = diagnostics.len();
            let (collapsed, roundabout_stats) =
                collapse_roundabouts(&network, config.ring_tolerance, &mut diagnostics);
            network = collapsed;
            stats.roundabouts = roundabout_stats;
            self.finish(Stage::Roundabouts, &network, &diagnostics, mark);
        } else {
            self.observer.stage_skipped(Stage::Roundabouts);
        }

        // Split
        if config.split_at_intersections || !network.nodes.is_empty() {
            self.observer.stage_started(Stage::Split);
            if config.split_at_intersections {
                network = split_edges_at_intersections(&network, config.split_tolerance);
            }
            if !network.nodes.is_empty() {
                network = split_edges_at_nodes(&network, config.split_tolerance);
            }
            self.finish(Stage::Split, &network, &diagnostics, diagnostics.len());
        } else {
            self.observer.stage_skipped(Stage::Split);
        }

        // Topology
        self.observer.stage_started(Stage::Topology);
        let mark = diagnostics.len();
        network = add_ids(&add_endpoints(&network));
        network = add_topology(&network, config.topology_tolerance, &mut diagnostics)?;
        network = add_degree(&reset_ids(&network)?)?;
        self.finish(Stage::Topology, &network, &diagnostics, mark);

        // Prune
        if config.drop_hanging {
            self.observer.stage_started(Stage::Prune);
            let (pruned, prune_stats) = drop_hanging_nodes(&network, config.hanging_tolerance)?;
            network = pruned;
            stats.prune = prune_stats;
            self.finish(Stage::Prune, &network, &diagnostics, diagnostics.len());
        } else {
            self.observer.stage_skipped(Stage::Prune);
        }

        // Contract
        if config.contract {
            self.observer.stage_started(Stage::Contract);
            let mark = diagnostics.len();
            let (contracted, contract_stats) =
                merge_degree2(&network, config.topology_tolerance, &mut diagnostics)?;
            network = contracted;
            stats.contract = contract_stats;
            self.finish(Stage::Contract, &network, &diagnostics, mark);
        } else {
            self.observer.stage_skipped(Stage::Contract);
        }

        // Enrich
        match &self.enricher {
            Some(enricher) => {
                self.observer.stage_started(Stage::Enrich);
                for edge in &mut network.edges {
                    enricher.enrich(edge);
                }
                self.finish(Stage::Enrich, &network, &diagnostics, diagnostics.len());
            }
            None => self.observer.stage_skipped(Stage::Enrich),
        }

        // Validate
        // checks run on the degrees the stages left behind
        self.observer.stage_started(Stage::Validate);
        let report = check_consistency(&network);
        check_degree_sum(&calculate_degree(&network)?, network.edges.len())?;
        network = add_degree(&network)?;
        self.finish(Stage::Validate, &network, &diagnostics, diagnostics.len());
        let report = if config.strict {
            report.into_result()?
        } else {
            report
        };

        for (kind, count) in diagnostics.counts() {
            warn!(%kind, count, "Defects");
        }
        info!(
            nodes = network.nodes.len(),
            edges = network.edges.len(),
            defects = diagnostics.len(),
            "Simplification complete"
        );
        Ok(SimplifyResult {
            network,
            diagnostics,
            report,
            stats,
        })
    }
}

/// Run the pipeline with the default observer and no enrichment
pub fn simplify(features: &[Feature], config: &SimplifyConfig) -> Result<SimplifyResult> {
    Simplifier::new(config.clone()).run(features)
}
