//! meshmap: AREDN mesh network crawler.
//!
//! Discovers the connectivity graph of a mesh network by walking
//! outward from a seed set of node names, querying each reachable
//! node for its direct links, and memoizing every fetched document
//! on disk. The stored documents feed the DOT/GeoJSON renderer.

pub mod config;
pub mod crawl;
pub mod fetch;
pub mod merge;
pub mod mx;
pub mod names;
pub mod olsr;
pub mod render;
pub mod resolve;
pub mod store;

// Re-export config types
pub use config::{Config, ConfigError, CrawlConfig, DnsConfig, FetchConfig, MxConfig, OlsrConfig};

// Re-export crawl types
pub use crawl::{Crawler, NodeId, QueueSnapshot};

// Re-export fetch types
pub use fetch::{FetchError, SysinfoClient};

// Re-export merge utility
pub use merge::deep_merge;

// Re-export name service types
pub use names::{DnsNameService, NameService, NameServiceError};

// Re-export olsr types
pub use olsr::{LinkType, OlsrLink, OlsrLinkReport, OlsrTranslator, canonical_hostname};

// Re-export resolve types
pub use resolve::{LinkInfo, NeighborResolver, ResolveError, SysinfoResolver};

// Re-export store types
pub use store::{DocStore, StoreError, file_key, node_name};
