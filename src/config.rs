//! meshmap configuration system.
//!
//! Loads configuration from YAML files with a cascading priority system:
//! 1. `./meshmap.yaml` (current directory - highest priority)
//! 2. `~/.meshmap.yaml` (legacy home location)
//! 3. `~/.config/meshmap/meshmap.yaml` (user config directory)
//! 4. `/etc/meshmap/meshmap.yaml` (system - lowest priority)
//!
//! Values from higher priority files override those from lower priority
//! files.
//!
//! # YAML Structure
//!
//! ```yaml
//! crawl:
//!   dir: /var/lib/meshmap
//! fetch:
//!   timeout_secs: 60
//!   proxy: "socks5h://localhost:5000"
//! olsr:
//!   enabled: true
//! dns:
//!   server: "10.54.100.1"
//! mx:
//!   port: 8765
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config filename.
const CONFIG_FILENAME: &str = "meshmap.yaml";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Default crawl directory.
const DEFAULT_CRAWL_DIR: &str = "/tmp/crawl";

/// Crawl state configuration (`crawl.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Directory holding one JSON document per crawled node
    /// (`crawl.dir`). Created if missing; nodes with a document here
    /// are not refetched. Defaults to `/tmp/crawl`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl CrawlConfig {
    /// Get the crawl directory, using default if not configured.
    pub fn dir(&self) -> &Path {
        self.dir
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CRAWL_DIR))
    }
}

/// Default per-request timeout in seconds.
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

/// Default port of the primary sysinfo endpoint.
const DEFAULT_SYSINFO_PORT: u16 = 80;

/// HTTP fetch configuration (`fetch.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout in seconds (`fetch.timeout_secs`).
    /// Defaults to 60.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Port of the per-node sysinfo endpoint (`fetch.sysinfo_port`).
    /// Defaults to 80.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sysinfo_port: Option<u16>,

    /// Forward proxy URL for all node fetches (`fetch.proxy`),
    /// e.g. `socks5h://localhost:5000`. No proxy when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl FetchConfig {
    /// Get the request timeout, using default if not configured.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS)
    }

    /// Get the sysinfo port, using default if not configured.
    pub fn sysinfo_port(&self) -> u16 {
        self.sysinfo_port.unwrap_or(DEFAULT_SYSINFO_PORT)
    }
}

/// Default port of the OLSR jsoninfo endpoint.
const DEFAULT_OLSR_PORT: u16 = 9090;

/// Secondary OLSR link source configuration (`olsr.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OlsrConfig {
    /// Enable the OLSR link source (`olsr.enabled`). When enabled, the
    /// per-node jsoninfo links are fetched, translated, and merged
    /// underneath the sysinfo link table on every visit.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub enabled: bool,

    /// Port of the jsoninfo endpoint (`olsr.port`). Defaults to 9090.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl OlsrConfig {
    /// Get the jsoninfo port, using default if not configured.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_OLSR_PORT)
    }
}

/// Name resolution configuration (`dns.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Resolution server override (`dns.server`), an IP address.
    /// Uses the system resolver configuration when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

/// Default management interface bind address.
const DEFAULT_MX_BIND_ADDR: &str = "127.0.0.1";

/// Default management interface port.
const DEFAULT_MX_PORT: u16 = 8765;

/// Management interface configuration (`mx.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MxConfig {
    /// Enable the management interface (`mx.enabled`). Defaults to true.
    #[serde(default = "MxConfig::default_enabled")]
    pub enabled: bool,

    /// Bind address (`mx.bind_addr`). Defaults to "127.0.0.1".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_addr: Option<String>,

    /// Listen port (`mx.port`). Defaults to 8765.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Default for MxConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: None,
            port: None,
        }
    }
}

impl MxConfig {
    fn default_enabled() -> bool {
        true
    }

    /// Get the bind address, using default if not configured.
    pub fn bind_addr(&self) -> &str {
        self.bind_addr.as_deref().unwrap_or(DEFAULT_MX_BIND_ADDR)
    }

    /// Get the port, using default if not configured.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_MX_PORT)
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Crawl state (`crawl.*`).
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// HTTP fetch (`fetch.*`).
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Secondary OLSR link source (`olsr.*`).
    #[serde(default)]
    pub olsr: OlsrConfig,

    /// Name resolution (`dns.*`).
    #[serde(default)]
    pub dns: DnsConfig,

    /// Management interface (`mx.*`).
    #[serde(default)]
    pub mx: MxConfig,
}

impl Config {
    /// Create a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the standard search paths.
    ///
    /// Files are loaded in reverse priority order and merged. Returns a
    /// tuple of (config, paths_loaded) where paths_loaded contains the
    /// paths that were successfully loaded.
    pub fn load() -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let search_paths = Self::search_paths();
        Self::load_from_paths(&search_paths)
    }

    /// Load configuration from specific paths.
    ///
    /// Paths are processed in order, with later paths overriding
    /// earlier ones.
    pub fn load_from_paths(paths: &[PathBuf]) -> Result<(Self, Vec<PathBuf>), ConfigError> {
        let mut config = Config::default();
        let mut loaded_paths = Vec::new();

        for path in paths {
            if path.exists() {
                let file_config = Self::load_file(path)?;
                config.merge(file_config);
                loaded_paths.push(path.clone());
            }
        }

        Ok((config, loaded_paths))
    }

    /// Load configuration from a single file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseYaml {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the standard search paths in priority order (lowest to highest).
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // System config (lowest priority)
        paths.push(PathBuf::from("/etc/meshmap").join(CONFIG_FILENAME));

        // User config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("meshmap").join(CONFIG_FILENAME));
        }

        // Home directory (legacy location)
        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".meshmap.yaml"));
        }

        // Current directory (highest priority)
        paths.push(PathBuf::from(".").join(CONFIG_FILENAME));

        paths
    }

    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` when present.
    pub fn merge(&mut self, other: Config) {
        // Merge crawl section
        if other.crawl.dir.is_some() {
            self.crawl.dir = other.crawl.dir;
        }
        // Merge fetch section
        if other.fetch.timeout_secs.is_some() {
            self.fetch.timeout_secs = other.fetch.timeout_secs;
        }
        if other.fetch.sysinfo_port.is_some() {
            self.fetch.sysinfo_port = other.fetch.sysinfo_port;
        }
        if other.fetch.proxy.is_some() {
            self.fetch.proxy = other.fetch.proxy;
        }
        // Merge olsr section
        if other.olsr.enabled {
            self.olsr.enabled = true;
        }
        if other.olsr.port.is_some() {
            self.olsr.port = other.olsr.port;
        }
        // Merge dns section
        if other.dns.server.is_some() {
            self.dns.server = other.dns.server;
        }
        // Merge mx section
        if !other.mx.enabled {
            self.mx.enabled = false;
        }
        if other.mx.bind_addr.is_some() {
            self.mx.bind_addr = other.mx.bind_addr;
        }
        if other.mx.port.is_some() {
            self.mx.port = other.mx.port;
        }
    }

    /// Serialize this configuration to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
