//! Graph rendering.
//!
//! Builds a Graphviz DOT digraph and a GeoJSON map from the stored
//! crawl documents. Nodes are mesh nodes, edges are the direct links
//! (RF, DTD, TUN) between them. Drawing the DOT file is left to
//! external tooling.

use crate::store::{DocStore, StoreError};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Load every stored document as (node name, document), sorted by name.
pub fn load_documents(store: &DocStore) -> Result<Vec<(String, Value)>, StoreError> {
    let mut docs = Vec::new();
    for node in store.nodes()? {
        if let Some(doc) = store.load(&node)? {
            docs.push((node, doc));
        }
    }
    Ok(docs)
}

/// Coordinates of a node: an override when present, otherwise the
/// `lat`/`lon` the node reported (numbers or numeric strings).
fn coords(
    node: &str,
    doc: &Value,
    overrides: &HashMap<String, (f64, f64)>,
) -> Option<(f64, f64)> {
    if let Some(&pair) = overrides.get(node) {
        return Some(pair);
    }
    let lat = coord_field(doc.get("lat")?)?;
    let lng = coord_field(doc.get("lon")?)?;
    Some((lat, lng))
}

fn coord_field(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Link entries of a document: (peer, link type).
fn links_of(doc: &Value) -> Vec<(String, String)> {
    let Some(link_info) = doc.get("link_info").and_then(Value::as_object) else {
        return Vec::new();
    };
    link_info
        .iter()
        .map(|(peer, meta)| {
            let link_type = meta
                .get("linkType")
                .and_then(Value::as_str)
                .unwrap_or("UNKNOWN");
            (peer.clone(), link_type.to_string())
        })
        .collect()
}

/// Render the crawled mesh as a DOT digraph.
///
/// Nodes are labeled with their reported name; nodes without known
/// coordinates carry a ` !!` marker so gaps in the map stand out.
pub fn dot_graph(docs: &[(String, Value)], overrides: &HashMap<String, (f64, f64)>) -> String {
    let mut out = String::from("digraph mesh {\n");

    for (node, doc) in docs {
        let reported = doc.get("node").and_then(Value::as_str).unwrap_or(node);
        let marker = if coords(node, doc, overrides).is_some() {
            ""
        } else {
            " !!"
        };
        out.push_str(&format!(
            "    \"{}\" [label=\"{}{}\"];\n",
            dot_escape(node),
            dot_escape(reported),
            marker
        ));
    }

    for (node, doc) in docs {
        for (peer, link_type) in links_of(doc) {
            out.push_str(&format!(
                "    \"{}\" -> \"{}\" [label=\"{}\"];\n",
                dot_escape(node),
                dot_escape(&peer),
                dot_escape(&link_type)
            ));
        }
    }

    out.push_str("}\n");
    out
}

fn point_feature(name: &str, lat: f64, lng: f64, feature_id: &str) -> Value {
    json!({
        "type": "Feature",
        "id": feature_id,
        "properties": {"label": name, "name": feature_id},
        "geometry": {
            "type": "Point",
            "coordinates": [lng, lat]
        }
    })
}

fn line_feature(label: &str, start: (f64, f64), end: (f64, f64), style: Value) -> Value {
    let mut properties = match style {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    properties.insert("label".to_string(), Value::String(label.to_string()));
    json!({
        "type": "Feature",
        "geometry": {
            "type": "LineString",
            "coordinates": [
                [start.1, start.0],
                [end.1, end.0]
            ]
        },
        "properties": properties
    })
}

fn link_style(link_type: &str) -> Value {
    match link_type {
        "RF" => json!({"stroke": "#ff0000", "stroke-width": 8}),
        "DTD" => json!({"stroke": "#99ff99"}),
        "TUN" => json!({"stroke": "#9999ff"}),
        _ => json!({"stroke": "#999999"}),
    }
}

/// Render the crawled mesh as a GeoJSON FeatureCollection: one Point
/// per located node, one styled LineString per link between located
/// nodes.
pub fn geojson_map(docs: &[(String, Value)], overrides: &HashMap<String, (f64, f64)>) -> Value {
    let mut features = Vec::new();
    let mut located = HashMap::new();

    for (node, doc) in docs {
        if let Some(pair) = coords(node, doc, overrides) {
            let feature_id = doc.get("node").and_then(Value::as_str).unwrap_or(node);
            features.push(point_feature(node, pair.0, pair.1, feature_id));
            located.insert(node.clone(), pair);
        }
    }

    for (node, doc) in docs {
        let Some(&start) = located.get(node) else {
            continue;
        };
        for (peer, link_type) in links_of(doc) {
            let Some(&end) = located.get(&peer) else {
                continue;
            };
            features.push(line_feature(&link_type, start, end, link_style(&link_type)));
        }
    }

    json!({"type": "FeatureCollection", "features": features})
}

/// Every node the crawl knows about: crawled nodes plus every peer
/// named by a link entry.
pub fn known_nodes(docs: &[(String, Value)]) -> usize {
    let mut seen = std::collections::HashSet::new();
    for (node, doc) in docs {
        seen.insert(node.as_str());
        if let Some(link_info) = doc.get("link_info").and_then(Value::as_object) {
            for peer in link_info.keys() {
                seen.insert(peer.as_str());
            }
        }
    }
    seen.len()
}
