//! Name resolution service.
//!
//! Forward (name → address) and reverse (address → name) lookups used
//! to canonicalize node identities during link translation. Lookup
//! failure is not an error at this seam: callers receive `None` and
//! fall back to the unresolved identifier, so a node without DNS
//! records degrades to its raw address instead of failing the visit.

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use std::future::Future;
use std::net::{AddrParseError, IpAddr};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while constructing a name service.
#[derive(Debug, Error)]
pub enum NameServiceError {
    #[error("invalid dns server address '{value}': {source}")]
    InvalidServer {
        value: String,
        source: AddrParseError,
    },

    #[error("failed to read system resolver configuration: {0}")]
    SystemConf(#[from] hickory_resolver::error::ResolveError),
}

/// Forward and reverse name lookup.
///
/// Implementations resolve best-effort: `None` means "no answer", and
/// the caller keeps whatever identifier it already had.
pub trait NameService {
    /// Resolve a hostname to its primary address.
    fn forward(&self, host: &str) -> impl Future<Output = Option<IpAddr>>;

    /// Resolve an address to its canonical hostname.
    fn reverse(&self, addr: IpAddr) -> impl Future<Output = Option<String>>;
}

/// DNS-backed [`NameService`] using the system resolver configuration
/// or a configured resolution server.
#[derive(Debug)]
pub struct DnsNameService {
    resolver: TokioAsyncResolver,
}

impl DnsNameService {
    /// Create a name service, honoring an optional server override
    /// (an IP address queried on port 53).
    pub fn new(server: Option<&str>) -> Result<Self, NameServiceError> {
        let resolver = match server {
            Some(value) => {
                let ip: IpAddr = value.parse().map_err(|e| NameServiceError::InvalidServer {
                    value: value.to_string(),
                    source: e,
                })?;
                let config = ResolverConfig::from_parts(
                    None,
                    Vec::new(),
                    NameServerConfigGroup::from_ips_clear(&[ip], 53, true),
                );
                TokioAsyncResolver::tokio(config, ResolverOpts::default())
            }
            None => TokioAsyncResolver::tokio_from_system_conf()?,
        };
        Ok(Self { resolver })
    }
}

impl NameService for DnsNameService {
    async fn forward(&self, host: &str) -> Option<IpAddr> {
        match self.resolver.lookup_ip(host).await {
            Ok(lookup) => lookup
                .iter()
                .find(IpAddr::is_ipv4)
                .or_else(|| lookup.iter().next()),
            Err(e) => {
                debug!(host, error = %e, "forward lookup failed");
                None
            }
        }
    }

    async fn reverse(&self, addr: IpAddr) -> Option<String> {
        match self.resolver.reverse_lookup(addr).await {
            Ok(lookup) => lookup
                .iter()
                .next()
                .map(|name| name.to_utf8().trim_end_matches('.').to_string()),
            Err(e) => {
                debug!(addr = %addr, error = %e, "reverse lookup failed");
                None
            }
        }
    }
}
