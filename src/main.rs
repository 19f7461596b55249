//! # Butterfly-simplify CLI
//!
//! Command-line interface for the butterfly-simplify library.
//! Reads a GeoJSON line dataset, builds and simplifies its topology, and
//! writes the node and edge tables as GeoJSON.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use butterfly_simplify::{
    link_modal_routes, read_features, write_network, LengthEnricher, Simplifier, SimplifyConfig,
    TracingObserver,
};
use clap::{Parser, ValueEnum};
use tracing::error;

mod cli;

/// Coordinate system family of the input, selecting default tolerances
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Preset {
    /// Longitude/latitude in degrees
    Geographic,
    /// Projected coordinates in metres
    Projected,
}

/// Command-line interface for butterfly-simplify
#[derive(Parser, Debug)]
#[command(name = "butterfly-simplify")]
#[command(about = "Build a clean node/edge topology from road line geometries")]
#[command(long_about = "Simplifies a GeoJSON road network into a routable graph:
  butterfly-simplify roads.geojson                        # writes nodes.geojson and edges.geojson
  butterfly-simplify roads.geojson --preset projected     # metre-based tolerances
  butterfly-simplify roads.geojson --config simplify.toml # tolerances from a TOML file

Command-line flags override values from --config.")]
#[command(version)]
struct Cli {
    /// Input GeoJSON file (LineString/MultiLineString roads, optional Point nodes)
    input: PathBuf,

    /// Output node table
    #[arg(long, default_value = "nodes.geojson")]
    nodes: PathBuf,

    /// Output edge table
    #[arg(long, default_value = "edges.geojson")]
    edges: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tolerance preset (ignored when --config is given)
    #[arg(long, value_enum, default_value_t = Preset::Geographic)]
    preset: Preset,

    /// Distance within which a line end snaps to a node
    #[arg(long)]
    topology_tolerance: Option<f64>,

    /// Distance within which a point splits an edge
    #[arg(long)]
    split_tolerance: Option<f64>,

    /// Closure tolerance for roundabout detection
    #[arg(long)]
    ring_tolerance: Option<f64>,

    /// Hanging edges shorter than this are dropped
    #[arg(long)]
    hanging_tolerance: Option<f64>,

    /// Round coordinates to this many decimals first
    #[arg(long)]
    precision: Option<u32>,

    /// Keep roundabouts as ring edges
    #[arg(long)]
    no_roundabouts: bool,

    /// Do not split edges at shared vertices
    #[arg(long)]
    no_split: bool,

    /// Keep hanging edges
    #[arg(long)]
    no_prune: bool,

    /// Keep degree-2 nodes
    #[arg(long)]
    no_contract: bool,

    /// Write output even when the final consistency check fails
    #[arg(long)]
    lenient: bool,

    /// GeoJSON routes (ferries, shuttles) to attach after simplification
    #[arg(long)]
    modal: Option<PathBuf>,

    /// Distance within which a modal route end finds an edge
    #[arg(long, default_value_t = 0.02)]
    modal_threshold: f64,

    /// Add a `length` attribute to every edge
    #[arg(long)]
    length: bool,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Resolve the configuration: file or preset, then flag overrides
fn build_config(cli: &Cli) -> Result<SimplifyConfig> {
    let mut config = match &cli.config {
        Some(path) => SimplifyConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => match cli.preset {
            Preset::Geographic => SimplifyConfig::geographic_degrees(),
            Preset::Projected => SimplifyConfig::projected_metres(),
        },
    };

    if let Some(t) = cli.topology_tolerance {
        config.topology_tolerance = t;
    }
    if let Some(t) = cli.split_tolerance {
        config.split_tolerance = t;
    }
    if let Some(t) = cli.ring_tolerance {
        config.ring_tolerance = t;
    }
    if let Some(t) = cli.hanging_tolerance {
        config.hanging_tolerance = t;
    }
    if cli.precision.is_some() {
        config.precision = cli.precision;
    }
    config.collapse_roundabouts &= !cli.no_roundabouts;
    config.split_at_intersections &= !cli.no_split;
    config.drop_hanging &= !cli.no_prune;
    config.contract &= !cli.no_contract;
    config.strict &= !cli.lenient;
    Ok(config)
}

fn main() {
    if let Err(e) = run() {
        error!("{e:#}");
        eprintln!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    cli::init_logging(cli.verbose);

    if cli.verbose {
        eprintln!("🦋 Butterfly-simplify v{} starting...", env!("CARGO_PKG_VERSION"));
    }

    let config = build_config(&cli)?;
    let start = Instant::now();

    let features = read_features(&cli.input)
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    eprintln!("📥 Read {} features from {}", features.len(), cli.input.display());

    let mut simplifier = Simplifier::new(config);
    simplifier = if cli.no_progress {
        simplifier.with_observer(TracingObserver::default())
    } else {
        simplifier.with_observer(cli::ProgressObserver::new("🔧 Simplifying network"))
    };
    if cli.length {
        simplifier = simplifier.with_enricher(LengthEnricher::default());
    }

    let mut result = simplifier.run(&features).context("Simplification failed")?;

    let mut modal_routes = 0;
    if let Some(path) = &cli.modal {
        let routes = read_features(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let (linked, added) = link_modal_routes(
            &result.network,
            &routes,
            cli.modal_threshold,
            &mut result.diagnostics,
        )
        .context("Linking modal routes failed")?;
        result.network = linked;
        modal_routes = added;
    }

    write_network(&result.network, &cli.nodes, &cli.edges).with_context(|| {
        format!(
            "Failed to write {} / {}",
            cli.nodes.display(),
            cli.edges.display()
        )
    })?;

    eprintln!("\n=== SIMPLIFICATION SUMMARY ===");
    eprintln!("  Input features:   {}", result.stats.input_features);
    eprintln!("  Roundabouts:      {}", result.stats.roundabouts.roundabouts);
    eprintln!("  Hanging dropped:  {}", result.stats.prune.dropped());
    eprintln!("  Chains merged:    {}", result.stats.contract.merged_chains);
    if cli.modal.is_some() {
        eprintln!("  Modal routes:     {}", modal_routes);
    }
    eprintln!("  Nodes:            {}", result.network.nodes.len());
    eprintln!("  Edges:            {}", result.network.edges.len());
    for (kind, count) in result.diagnostics.counts() {
        eprintln!("  Defects ({kind}): {count}");
    }
    for warning in &result.report.warnings {
        eprintln!("  ⚠️  {warning}");
    }
    if !result.report.passed {
        eprintln!("  ❌ Consistency check failed: {}", result.report.errors.join("; "));
    }
    eprintln!(
        "📁 Wrote {} and {} in {:.2}s",
        cli.nodes.display(),
        cli.edges.display(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_preset() {
        let cli = Cli::parse_from([
            "butterfly-simplify",
            "roads.geojson",
            "--preset",
            "projected",
            "--hanging-tolerance",
            "25",
            "--no-contract",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.hanging_tolerance, 25.0);
        assert_eq!(config.topology_tolerance, SimplifyConfig::projected_metres().topology_tolerance);
        assert!(!config.contract);
        assert!(config.drop_hanging);
    }

    #[test]
    fn test_default_outputs() {
        let cli = Cli::parse_from(["butterfly-simplify", "roads.geojson"]);
        assert_eq!(cli.nodes, PathBuf::from("nodes.geojson"));
        assert_eq!(cli.edges, PathBuf::from("edges.geojson"));
        assert_eq!(build_config(&cli).unwrap(), SimplifyConfig::default());
        assert!(cli.modal.is_none());
        assert_eq!(cli.modal_threshold, 0.02);
    }

    #[test]
    fn test_missing_config_file_fails() {
        let cli = Cli::parse_from([
            "butterfly-simplify",
            "roads.geojson",
            "--config",
            "/nonexistent/simplify.toml",
        ]);
        let err = build_config(&cli).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }
}
