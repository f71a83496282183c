//! OLSR link translation.
//!
//! The OLSR jsoninfo endpoint reports per-interface link records keyed
//! by raw interface addresses. Translation lifts them into the
//! peer-keyed sysinfo `link_info` schema: the remote address is
//! reverse-resolved to a hostname, synthetic hostname decorations are
//! stripped, and the bare hostname is forward-resolved back to its
//! primary address so that a node reachable under several aliased
//! names merges under one key.

use crate::names::NameService;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::net::IpAddr;
use tracing::debug;

/// Mesh-domain suffix appended to node hostnames.
const MESH_DOMAIN_SUFFIX: &str = ".local.mesh";

/// Link classification derived from the reporting interface name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkType {
    /// Radio link (wireless interface).
    Rf,
    /// Device-to-device wired link.
    Dtd,
    /// Tunnel link.
    Tun,
    /// Unrecognized interface.
    Unknown,
}

impl LinkType {
    /// Classify an interface name by prefix.
    pub fn classify(interface: &str) -> Self {
        if interface.starts_with("wlan") {
            LinkType::Rf
        } else if interface.starts_with("eth") {
            LinkType::Dtd
        } else if interface.starts_with("tun") {
            LinkType::Tun
        } else {
            LinkType::Unknown
        }
    }

    /// Wire representation used in `link_info` records.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Rf => "RF",
            LinkType::Dtd => "DTD",
            LinkType::Tun => "TUN",
            LinkType::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One link record from the jsoninfo `links` array.
///
/// The remote address and reporting interface drive translation; every
/// other field is carried through verbatim.
#[derive(Debug, Clone, Deserialize)]
pub struct OlsrLink {
    /// Address of the remote interface.
    #[serde(rename = "remoteIP")]
    pub remote_ip: String,

    /// Local interface the link was observed on.
    #[serde(rename = "olsrInterface", default)]
    pub olsr_interface: String,

    /// Remaining quality/timing fields, copied through untouched.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// Response document of the jsoninfo links endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OlsrLinkReport {
    #[serde(default)]
    pub links: Vec<OlsrLink>,
}

/// Strip a numeric `mid<N>.` interface alias prefix.
fn strip_mid(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix("mid")
        && let Some(dot) = rest.find('.')
        && dot > 0
        && rest[..dot].bytes().all(|b| b.is_ascii_digit())
    {
        return &rest[dot + 1..];
    }
    host
}

/// Reduce a reverse-resolved hostname to the bare node hostname.
///
/// Decorations are stripped in a fixed order: `mid<N>.` interface
/// prefix, `dtdlink.` prefix, trailing mesh-domain suffix.
pub fn canonical_hostname(host: &str) -> String {
    let lowered = host.to_ascii_lowercase();
    let stripped = lowered.trim_end_matches('.');
    let stripped = strip_mid(stripped);
    let stripped = stripped.strip_prefix("dtdlink.").unwrap_or(stripped);
    let stripped = stripped.strip_suffix(MESH_DOMAIN_SUFFIX).unwrap_or(stripped);
    stripped.to_string()
}

/// Translates jsoninfo link records into the peer-keyed `link_info`
/// schema, canonicalizing identities through a [`NameService`].
pub struct OlsrTranslator<N: NameService> {
    names: N,
}

impl<N: NameService> OlsrTranslator<N> {
    pub fn new(names: N) -> Self {
        Self { names }
    }

    /// Translate a set of link records into a `link_info` object.
    ///
    /// Lookup failures keep the unresolved address or hostname for
    /// that step; translation itself never fails.
    pub async fn translate(&self, links: &[OlsrLink]) -> Map<String, Value> {
        let mut out = Map::new();

        for link in links {
            let host = match link.remote_ip.parse::<IpAddr>() {
                Ok(ip) => self
                    .names
                    .reverse(ip)
                    .await
                    .unwrap_or_else(|| link.remote_ip.clone()),
                Err(_) => link.remote_ip.clone(),
            };

            let hostname = canonical_hostname(&host);

            let key = match self.names.forward(&hostname).await {
                Some(ip) => ip.to_string(),
                None => hostname.clone(),
            };

            let link_type = LinkType::classify(&link.olsr_interface);
            debug!(
                remote = %link.remote_ip,
                hostname = %hostname,
                key = %key,
                link_type = %link_type,
                "translated link"
            );

            let mut record = link.rest.clone();
            record.insert("hostname".to_string(), Value::String(hostname));
            record.insert(
                "linkType".to_string(),
                Value::String(link_type.as_str().to_string()),
            );
            out.insert(key, Value::Object(record));
        }

        out
    }
}
