//! meshmap crawler binary.
//!
//! Reads seed node names from stdin (one per line), crawls the mesh
//! breadth-first, and stores one JSON document per node in the crawl
//! directory. A management interface exposes the live queues while
//! the crawl runs.

use clap::Parser;
use meshmap::{
    Config, Crawler, DnsNameService, DocStore, OlsrTranslator, SysinfoClient, SysinfoResolver, mx,
};
use std::io::BufRead;
use std::path::PathBuf;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// AREDN mesh network crawler
#[derive(Parser, Debug)]
#[command(name = "meshmap", version, about)]
struct Args {
    /// Path to configuration file (overrides default search paths)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Crawl directory (overrides configuration)
    #[arg(long, value_name = "DIR")]
    crawl_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    info!("meshmap starting");

    // Load configuration
    let (mut config, loaded_paths) = if let Some(config_path) = &args.config {
        // Explicit config file specified - load only that file
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
        // Use default search paths
        match Config::load() {
            Ok(result) => result,
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                std::process::exit(1);
            }
        }
    };

    if loaded_paths.is_empty() {
        info!("No config files found, using defaults");
    } else {
        for path in &loaded_paths {
            info!(path = %path.display(), "Loaded config file");
        }
    }

    if args.crawl_dir.is_some() {
        config.crawl.dir = args.crawl_dir;
    }

    // Open the crawl store
    let store = match DocStore::open(config.crawl.dir()) {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open crawl directory: {}", e);
            std::process::exit(1);
        }
    };
    info!(dir = %store.dir().display(), "Crawl store ready");

    // Build the HTTP client
    let client = match SysinfoClient::new(&config) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build http client: {}", e);
            std::process::exit(1);
        }
    };

    // Build the resolver, with the OLSR source when configured
    let resolver: SysinfoResolver<DnsNameService> = SysinfoResolver::new(store, client);
    let resolver = if config.olsr.enabled {
        let names = match DnsNameService::new(config.dns.server.as_deref()) {
            Ok(names) => names,
            Err(e) => {
                error!("Failed to set up name resolution: {}", e);
                std::process::exit(1);
            }
        };
        info!(port = config.olsr.port(), "OLSR link source enabled");
        resolver.with_olsr(OlsrTranslator::new(names))
    } else {
        resolver
    };

    let mut crawler = Crawler::new(resolver);

    // Seed from stdin
    let mut seeds = 0usize;
    for line in std::io::stdin().lock().lines() {
        match line {
            Ok(line) => {
                let node = line.trim();
                if !node.is_empty() {
                    crawler.enqueue(node.to_string());
                    seeds += 1;
                }
            }
            Err(e) => {
                error!("Failed to read seed list: {}", e);
                std::process::exit(1);
            }
        }
    }
    info!(seeds, "Seed list loaded");

    // Start the management interface
    if config.mx.enabled {
        let snapshots = crawler.subscribe();
        let bind_addr = config.mx.bind_addr().to_string();
        let port = config.mx.port();
        tokio::spawn(async move {
            if let Err(e) = mx::serve(&bind_addr, port, snapshots).await {
                warn!("Management interface failed: {}", e);
            }
        });
    }

    crawler.run().await;

    info!(
        visited = crawler.visited().len(),
        retry_epochs = crawler.retry_epochs(),
        "meshmap done"
    );
}
