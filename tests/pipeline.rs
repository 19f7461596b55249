use butterfly_simplify::{
    calculate_degree, merge_degree2, read_features, read_network, simplify, write_network,
    Diagnostics, Feature, Network, SimplifyConfig,
};
use geo::{line_string, point, Coord, LineString, Point};
use std::collections::HashSet;
use std::io::Write;

const TOL: f64 = 1e-9;

/// Line through every integer step between two axis-aligned points
fn unit_line(from: (i32, i32), to: (i32, i32)) -> LineString<f64> {
    let steps = (to.0 - from.0).abs().max((to.1 - from.1).abs());
    let (dx, dy) = ((to.0 - from.0).signum(), (to.1 - from.1).signum());
    (0..=steps)
        .map(|i| Coord {
            x: (from.0 + i * dx) as f64,
            y: (from.1 + i * dy) as f64,
        })
        .collect()
}

fn assert_invariants(network: &Network) {
    let ids: HashSet<usize> = network.nodes.iter().map(|n| n.id).collect();
    for edge in &network.edges {
        let (from, to) = edge.ends().expect("edge without topology");
        assert!(ids.contains(&from), "edge {} from_id {} missing", edge.id, from);
        assert!(ids.contains(&to), "edge {} to_id {} missing", edge.id, to);
    }
    let degree = calculate_degree(network).unwrap();
    for node in &network.nodes {
        assert_eq!(node.degree, Some(degree[node.id]), "stale degree on node {}", node.id);
    }
}

fn node_at(network: &Network, p: Point<f64>) -> Option<usize> {
    network.nodes.iter().find(|n| n.geometry == p).map(|n| n.id)
}

#[test]
fn test_five_node_chain_contracts_to_one_edge() {
    let features: Vec<Feature> = (0..4)
        .map(|i| {
            let x = i as f64;
            Feature::new(line_string![(x: x, y: 0.0), (x: x + 1.0, y: 0.0)])
        })
        .collect();
    let result = simplify(&features, &SimplifyConfig::default()).unwrap();

    assert_eq!(result.network.edges.len(), 1);
    assert_eq!(result.network.nodes.len(), 2);
    let edge = &result.network.edges[0];
    assert_eq!(edge.geometry, unit_line((0, 0), (4, 0)));
    assert_eq!(edge.from_id, node_at(&result.network, point!(x: 0.0, y: 0.0)));
    assert_eq!(edge.to_id, node_at(&result.network, point!(x: 4.0, y: 0.0)));
    assert_invariants(&result.network);
}

#[test]
fn test_short_hanging_edge_is_removed_with_its_node() {
    let features = vec![
        Feature::new(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]),
        Feature::new(line_string![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0)]),
        Feature::new(line_string![(x: 1.0, y: 0.0), (x: 1.0, y: 0.001)]),
    ];
    let result = simplify(&features, &SimplifyConfig::default()).unwrap();

    assert_eq!(result.stats.prune.dropped_short, 1);
    assert!(node_at(&result.network, point!(x: 1.0, y: 0.001)).is_none());
    // the junction became degree 2 and was contracted away
    assert!(node_at(&result.network, point!(x: 1.0, y: 0.0)).is_none());
    assert_eq!(result.network.edges.len(), 1);
    assert_invariants(&result.network);
}

#[test]
fn test_edge_with_two_mid_line_nodes_splits_in_three() {
    let features = vec![
        Feature::new(line_string![(x: 0.0, y: 0.0), (x: 3.0, y: 0.0)]),
        Feature::new(point!(x: 2.0, y: 0.0)),
        Feature::new(point!(x: 1.0, y: 0.0)),
    ];
    let config = SimplifyConfig {
        contract: false,
        ..SimplifyConfig::default()
    };
    let result = simplify(&features, &config).unwrap();

    let geometries: Vec<_> = result.network.edges.iter().map(|e| e.geometry.clone()).collect();
    assert_eq!(
        geometries,
        vec![
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)],
            line_string![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0)],
            line_string![(x: 2.0, y: 0.0), (x: 3.0, y: 0.0)],
        ]
    );
    assert_invariants(&result.network);
}

#[test]
fn test_roundabout_with_two_arms() {
    let features = vec![
        Feature::new(line_string![(x: 1.0, y: 0.0), (x: 3.0, y: 0.0)]).with_attribute("name", "east"),
        Feature::new(line_string![
            (x: 1.0, y: 1.0), (x: -1.0, y: 1.0), (x: -1.0, y: -1.0), (x: 1.0, y: -1.0), (x: 1.0, y: 1.0)
        ])
        .with_attribute("junction", "roundabout"),
        Feature::new(line_string![(x: -3.0, y: 0.0), (x: -1.0, y: 0.0)]).with_attribute("name", "west"),
    ];
    let config = SimplifyConfig {
        contract: false,
        ..SimplifyConfig::default()
    };
    let result = simplify(&features, &config).unwrap();

    assert_eq!(result.stats.roundabouts.roundabouts, 1);
    assert_eq!(result.stats.roundabouts.rerouted_edges, 2);
    assert!(result
        .network
        .edges
        .iter()
        .all(|e| !e.attributes.contains_key("junction")));
    assert_eq!(result.network.edges.len(), 2);

    let centroid = node_at(&result.network, point!(x: 0.0, y: 0.0)).expect("centroid node");
    for edge in &result.network.edges {
        let (from, to) = edge.ends().unwrap();
        assert!(from == centroid || to == centroid, "edge {} misses the centroid", edge.id);
    }
    assert_eq!(result.network.nodes[centroid].degree, Some(2));
    assert_invariants(&result.network);
}

#[test]
fn test_grid_keeps_invariants_and_contraction_is_idempotent() {
    let mut features = Vec::new();
    for k in [0, 2, 4] {
        features.push(Feature::new(unit_line((0, k), (4, k))));
        features.push(Feature::new(unit_line((k, 0), (k, 4))));
    }
    let result = simplify(&features, &SimplifyConfig::default()).unwrap();

    // corners are degree 2 and get merged, leaving the 4 + 1 junctions
    assert_eq!(result.network.nodes.len(), 5);
    assert_eq!(result.network.edges.len(), 8);
    assert!(result.report.passed);
    assert_invariants(&result.network);

    let mut diagnostics = Diagnostics::new();
    let (again, stats) = merge_degree2(&result.network, TOL, &mut diagnostics).unwrap();
    assert_eq!(stats.merged_chains, 0);
    assert_eq!(again, result.network);
}

#[test]
fn test_geojson_end_to_end() {
    let mut input = tempfile::NamedTempFile::new().unwrap();
    write!(
        input,
        r#"{{
            "type": "FeatureCollection",
            "features": [
                {{"type": "Feature",
                  "geometry": {{"type": "MultiLineString",
                               "coordinates": [[[0, 0], [1, 0]], [[1, 0], [1, 1]]]}},
                  "properties": {{"highway": "residential"}}}},
                {{"type": "Feature",
                  "geometry": {{"type": "LineString", "coordinates": [[1, 0], [2, 0]]}},
                  "properties": {{"highway": "primary"}}}}
            ]
        }}"#
    )
    .unwrap();

    let features = read_features(input.path()).unwrap();
    assert_eq!(features.len(), 2);
    let result = simplify(&features, &SimplifyConfig::default()).unwrap();
    assert_eq!(result.network.edges.len(), 3);

    let dir = tempfile::tempdir().unwrap();
    let nodes_path = dir.path().join("nodes.geojson");
    let edges_path = dir.path().join("edges.geojson");
    write_network(&result.network, &nodes_path, &edges_path).unwrap();

    let read = read_network(&nodes_path, &edges_path).unwrap();
    assert_eq!(read, result.network);
    assert!(read
        .edges
        .iter()
        .any(|e| e.attributes.get("highway").and_then(|v| v.as_str()) == Some("primary")));
}
