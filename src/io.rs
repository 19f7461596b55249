//! GeoJSON persistence
//!
//! Reads input features from a GeoJSON document and writes the node and
//! edge tables as two FeatureCollections. Nodes carry `id` and `degree`,
//! edges carry `id`, `from_id`, `to_id` plus their passthrough attributes.
//! A passthrough attribute sharing a table column's name (an OSM `id`, say)
//! is written as `source_<name>` and restored on read.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use geojson::{FeatureCollection, GeoJson, JsonObject, JsonValue};
use tracing::{debug, warn};

use crate::error::{Result, SimplifyError};
use crate::network::{Edge, Feature, Network, Node};

const ID: &str = "id";
const DEGREE: &str = "degree";
const FROM_ID: &str = "from_id";
const TO_ID: &str = "to_id";
const EDGE_COLUMNS: [&str; 3] = [ID, FROM_ID, TO_ID];
const SOURCE_PREFIX: &str = "source_";

fn read_geojson(path: &Path) -> Result<GeoJson> {
    let reader = BufReader::new(File::open(path)?);
    Ok(GeoJson::from_reader(reader)?)
}

fn write_collection(path: &Path, collection: FeatureCollection) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &GeoJson::FeatureCollection(collection))?;
    Ok(())
}

/// Features of a GeoJSON document (FeatureCollection, Feature or bare Geometry).
///
/// Features without geometry are skipped.
pub fn features_from_geojson(geojson: GeoJson) -> Result<Vec<Feature>> {
    let raw: Vec<geojson::Feature> = match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(geometry) => vec![geojson::Feature {
            bbox: None,
            geometry: Some(geometry),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    let mut features = Vec::with_capacity(raw.len());
    let mut skipped = 0usize;
    for feature in raw {
        let Some(geometry) = feature.geometry else {
            skipped += 1;
            continue;
        };
        let geometry: geo::Geometry<f64> = geometry.try_into()?;
        features.push(Feature {
            geometry,
            attributes: feature.properties.unwrap_or_default(),
        });
    }
    if skipped > 0 {
        warn!(skipped, "Skipped features without geometry");
    }
    Ok(features)
}

/// Read input features from a GeoJSON file
pub fn read_features(path: &Path) -> Result<Vec<Feature>> {
    let features = features_from_geojson(read_geojson(path)?)?;
    debug!(path = %path.display(), features = features.len(), "Read features");
    Ok(features)
}

fn optional_id(id: Option<usize>) -> JsonValue {
    id.map(JsonValue::from).unwrap_or(JsonValue::Null)
}

/// Node table as a FeatureCollection
pub fn nodes_to_geojson(nodes: &[Node]) -> FeatureCollection {
    let features = nodes
        .iter()
        .map(|node| {
            let mut properties = JsonObject::new();
            properties.insert(ID.to_string(), JsonValue::from(node.id));
            properties.insert(DEGREE.to_string(), optional_id(node.degree));
            geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&node.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Edge table as a FeatureCollection
pub fn edges_to_geojson(edges: &[Edge]) -> FeatureCollection {
    let mut renamed = 0usize;
    let features = edges
        .iter()
        .map(|edge| {
            let mut properties = edge.attributes.clone();
            for column in EDGE_COLUMNS {
                if let Some(value) = properties.remove(column) {
                    properties.insert(format!("{SOURCE_PREFIX}{column}"), value);
                    renamed += 1;
                }
            }
            properties.insert(ID.to_string(), JsonValue::from(edge.id));
            properties.insert(FROM_ID.to_string(), optional_id(edge.from_id));
            properties.insert(TO_ID.to_string(), optional_id(edge.to_id));
            geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&edge.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();
    if renamed > 0 {
        warn!(
            renamed,
            "Edge attributes named like table columns written with a {} prefix", SOURCE_PREFIX
        );
    }
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Write the node and edge tables to two GeoJSON files
pub fn write_network(network: &Network, nodes_path: &Path, edges_path: &Path) -> Result<()> {
    write_collection(nodes_path, nodes_to_geojson(&network.nodes))?;
    write_collection(edges_path, edges_to_geojson(&network.edges))?;
    debug!(
        nodes = %nodes_path.display(),
        edges = %edges_path.display(),
        "Wrote network"
    );
    Ok(())
}

fn take_id(properties: &mut JsonObject, key: &str, row: usize) -> Result<Option<usize>> {
    match properties.remove(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|v| Some(v as usize))
            .ok_or_else(|| SimplifyError::InvalidTable(format!("row {}: {} is not an id", row, key))),
    }
}

fn rows(path: &Path) -> Result<Vec<(geo::Geometry<f64>, JsonObject)>> {
    let features = features_from_geojson(read_geojson(path)?)?;
    Ok(features
        .into_iter()
        .map(|f| (f.geometry, f.attributes))
        .collect())
}

/// Read back tables written by [`write_network`]
pub fn read_network(nodes_path: &Path, edges_path: &Path) -> Result<Network> {
    let mut nodes = Vec::new();
    for (row, (geometry, mut properties)) in rows(nodes_path)?.into_iter().enumerate() {
        let geo::Geometry::Point(point) = geometry else {
            return Err(SimplifyError::InvalidTable(format!("node row {} is not a Point", row)));
        };
        let id = take_id(&mut properties, ID, row)?.unwrap_or(row);
        let mut node = Node::new(id, point);
        node.degree = take_id(&mut properties, DEGREE, row)?;
        nodes.push(node);
    }

    let mut edges = Vec::new();
    for (row, (geometry, mut properties)) in rows(edges_path)?.into_iter().enumerate() {
        let geo::Geometry::LineString(line) = geometry else {
            return Err(SimplifyError::InvalidTable(format!(
                "edge row {} is not a LineString",
                row
            )));
        };
        let id = take_id(&mut properties, ID, row)?.unwrap_or(row);
        let from_id = take_id(&mut properties, FROM_ID, row)?;
        let to_id = take_id(&mut properties, TO_ID, row)?;
        for column in EDGE_COLUMNS {
            if let Some(value) = properties.remove(&format!("{SOURCE_PREFIX}{column}")) {
                properties.insert(column.to_string(), value);
            }
        }
        let mut edge = Edge::new(id, line).with_attributes(properties);
        edge.from_id = from_id;
        edge.to_id = to_id;
        edges.push(edge);
    }

    Ok(Network::new(nodes, edges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point};
    use std::io::Write;

    #[test]
    fn test_reads_feature_collection() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "type": "FeatureCollection",
                "features": [
                    {{"type": "Feature",
                      "geometry": {{"type": "LineString", "coordinates": [[0, 0], [1, 0]]}},
                      "properties": {{"highway": "primary"}}}},
                    {{"type": "Feature", "geometry": null, "properties": {{}}}},
                    {{"type": "Feature",
                      "geometry": {{"type": "Point", "coordinates": [2, 2]}},
                      "properties": null}}
                ]
            }}"#
        )
        .unwrap();

        let features = read_features(file.path()).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].attributes["highway"], "primary");
        assert!(matches!(features[1].geometry, geo::Geometry::Point(_)));
    }

    #[test]
    fn test_tables_survive_a_round_trip() {
        let mut node = Node::new(0, point!(x: 0.5, y: 1.5));
        node.degree = Some(1);
        let mut other = Node::new(1, point!(x: 2.0, y: 1.5));
        other.degree = Some(1);
        let mut edge =
            Edge::new(0, line_string![(x: 0.5, y: 1.5), (x: 2.0, y: 1.5)]).with_ends(0, 1);
        edge.attributes.insert("name".into(), "Rue Haute".into());
        let network = Network::new(vec![node, other], vec![edge]);

        let dir = tempfile::tempdir().unwrap();
        let nodes_path = dir.path().join("nodes.geojson");
        let edges_path = dir.path().join("edges.geojson");
        write_network(&network, &nodes_path, &edges_path).unwrap();

        let read = read_network(&nodes_path, &edges_path).unwrap();
        assert_eq!(read, network);
    }

    #[test]
    fn test_attribute_named_like_a_column_is_kept_aside() {
        let mut edge =
            Edge::new(0, line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]).with_ends(0, 1);
        edge.attributes.insert("id".into(), 123456.into());
        edge.attributes.insert("from_id".into(), "way/9".into());

        let collection = edges_to_geojson(std::slice::from_ref(&edge));
        let properties = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(properties["id"], 0);
        assert_eq!(properties["from_id"], 0);
        assert_eq!(properties["source_id"], 123456);
        assert_eq!(properties["source_from_id"], "way/9");

        let network = Network::new(
            vec![Node::new(0, point!(x: 0.0, y: 0.0)), Node::new(1, point!(x: 1.0, y: 0.0))],
            vec![edge],
        );
        let dir = tempfile::tempdir().unwrap();
        let nodes_path = dir.path().join("nodes.geojson");
        let edges_path = dir.path().join("edges.geojson");
        write_network(&network, &nodes_path, &edges_path).unwrap();
        assert_eq!(read_network(&nodes_path, &edges_path).unwrap(), network);
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = read_features(Path::new("/nonexistent/input.geojson")).unwrap_err();
        assert!(matches!(err, SimplifyError::Io(_)));
    }
}
