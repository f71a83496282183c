//! HTTP transport to mesh nodes.
//!
//! One client instance, shared across the whole crawl, fetches the
//! per-node sysinfo document and (when the OLSR source is enabled) the
//! jsoninfo link report on its alternate port. Every request runs
//! under a fixed timeout and optionally through a forward proxy so a
//! crawl can reach a mesh it is not directly attached to.

use crate::config::Config;
use crate::olsr::OlsrLinkReport;
use reqwest::{Client, Proxy, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Path of the primary per-node endpoint, including the query
/// parameters requesting link and link-quality metrics.
const SYSINFO_PATH: &str = "/cgi-bin/sysinfo.json?link_info=1&lqm=1";

/// Path of the jsoninfo links endpoint.
const OLSR_LINKS_PATH: &str = "/links";

/// Errors related to node fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid proxy url '{url}': {source}")]
    Proxy { url: String, source: reqwest::Error },

    #[error("request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },

    #[error("{url} returned status {status}")]
    Status { url: String, status: StatusCode },

    #[error("{url} returned malformed body: {source}")]
    Body {
        url: String,
        source: serde_json::Error,
    },
}

/// HTTP client for per-node metadata endpoints.
pub struct SysinfoClient {
    client: Client,
    sysinfo_port: u16,
    olsr_port: u16,
}

impl SysinfoClient {
    /// Build a client from the fetch/olsr configuration.
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let mut builder =
            Client::builder().timeout(Duration::from_secs(config.fetch.timeout_secs()));

        if let Some(url) = &config.fetch.proxy {
            let proxy = Proxy::http(url).map_err(|e| FetchError::Proxy {
                url: url.clone(),
                source: e,
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(FetchError::Client)?;
        Ok(Self {
            client,
            sysinfo_port: config.fetch.sysinfo_port(),
            olsr_port: config.olsr.port(),
        })
    }

    fn sysinfo_url(&self, node: &str) -> String {
        format!("http://{}:{}{}", node, self.sysinfo_port, SYSINFO_PATH)
    }

    fn olsr_url(&self, node: &str) -> String {
        format!("http://{}:{}{}", node, self.olsr_port, OLSR_LINKS_PATH)
    }

    /// Fetch the sysinfo document for `node`.
    pub async fn sysinfo(&self, node: &str) -> Result<Value, FetchError> {
        self.get_json(self.sysinfo_url(node)).await
    }

    /// Fetch the jsoninfo link report for `node`.
    pub async fn olsr_links(&self, node: &str) -> Result<OlsrLinkReport, FetchError> {
        let url = self.olsr_url(node);
        let doc = self.get_json(url.clone()).await?;
        serde_json::from_value(doc).map_err(|e| FetchError::Body { url, source: e })
    }

    async fn get_json(&self, url: String) -> Result<Value, FetchError> {
        debug!(url = %url, "fetching");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                url: url.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url, status });
        }

        let body = response.text().await.map_err(|e| FetchError::Request {
            url: url.clone(),
            source: e,
        })?;

        serde_json::from_str(&body).map_err(|e| FetchError::Body { url, source: e })
    }
}
