//! meshmap renderer binary.
//!
//! Reads the stored crawl documents and writes the mesh as a Graphviz
//! DOT digraph and a GeoJSON map.

use clap::Parser;
use meshmap::render::{dot_graph, geojson_map, known_nodes, load_documents};
use meshmap::{Config, DocStore};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, fmt};

/// Renders a crawled mesh as DOT and GeoJSON
#[derive(Parser, Debug)]
#[command(name = "meshmap-render", version, about)]
struct Args {
    /// Path to configuration file (overrides default search paths)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Crawl directory (overrides configuration)
    #[arg(long, value_name = "DIR")]
    crawl_dir: Option<PathBuf>,

    /// JSON file mapping node name to a [lat, lng] pair, overriding
    /// coordinates found in crawl data
    #[arg(long, value_name = "FILE")]
    override_coords: Option<PathBuf>,

    /// Output path of the DOT graph
    #[arg(long, value_name = "FILE", default_value = "mesh_topo.dot")]
    dot_out: PathBuf,

    /// Output path of the GeoJSON map
    #[arg(long, value_name = "FILE", default_value = "mesh_map.json")]
    geojson_out: PathBuf,
}

fn main() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let (mut config, _) = if let Some(config_path) = &args.config {
        match Config::load_file(config_path) {
            Ok(config) => (config, vec![config_path.clone()]),
            Err(e) => {
                error!(
                    "Failed to load configuration from {}: {}",
                    config_path.display(),
                    e
                );
                std::process::exit(1);
            }
        }
    } else {
        match Config::load() {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        }
    };

    if args.crawl_dir.is_some() {
        config.crawl.dir = args.crawl_dir;
    }

    let overrides: HashMap<String, (f64, f64)> = match &args.override_coords {
        Some(path) => {
            let contents = match std::fs::read_to_string(path) {
                Ok(contents) => contents,
                Err(e) => {
                    error!("Failed to read {}: {}", path.display(), e);
                    std::process::exit(1);
                }
            };
            match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(e) => {
                    error!("Failed to parse {}: {}", path.display(), e);
                    std::process::exit(1);
                }
            }
        }
        None => HashMap::new(),
    };

    let store = match DocStore::open(config.crawl.dir()) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open crawl directory: {}", e);
            std::process::exit(1);
        }
    };

    let docs = match load_documents(&store) {
        Ok(docs) => docs,
        Err(e) => {
            error!("Failed to load crawl documents: {}", e);
            std::process::exit(1);
        }
    };

    let dot = dot_graph(&docs, &overrides);
    if let Err(e) = std::fs::write(&args.dot_out, dot) {
        error!("Failed to write {}: {}", args.dot_out.display(), e);
        std::process::exit(1);
    }
    info!(path = %args.dot_out.display(), "Wrote DOT graph");

    let map = geojson_map(&docs, &overrides);
    let body = match serde_json::to_string(&map) {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to serialize map: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = std::fs::write(&args.geojson_out, body) {
        error!("Failed to write {}: {}", args.geojson_out.display(), e);
        std::process::exit(1);
    }
    info!(path = %args.geojson_out.display(), "Wrote GeoJSON map");

    info!(
        crawled = docs.len(),
        discovered = known_nodes(&docs),
        "Render complete"
    );
}
