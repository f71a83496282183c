//! Neighbor resolution.
//!
//! Resolving a node produces its peer-keyed `link_info` table. The
//! stored document short-circuits the network entirely, so a crawl
//! interrupted and restarted replays prior results byte-for-byte.
//! When the OLSR source is enabled its link report is mandatory:
//! translated records are merged underneath the sysinfo table, the
//! sysinfo side winning field-by-field.

use crate::fetch::{FetchError, SysinfoClient};
use crate::merge::deep_merge;
use crate::names::NameService;
use crate::olsr::OlsrTranslator;
use crate::store::{DocStore, StoreError};
use serde_json::{Map, Value};
use std::future::Future;
use thiserror::Error;
use tracing::debug;

/// Peer-keyed link metadata, as stored under a document's `link_info`.
pub type LinkInfo = Map<String, Value>;

/// Errors related to resolving a node's neighbors.
///
/// Every failure is either transient (worth re-attempting later) or
/// permanent (the node answered, but its document carries no link
/// table). [`is_transient`](ResolveError::is_transient) is the only
/// distinction the traversal loop acts on.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("store failed: {0}")]
    Store(#[from] StoreError),

    #[error("node reported no link_info")]
    MissingLinkInfo,
}

impl ResolveError {
    /// Whether a later attempt could succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ResolveError::MissingLinkInfo)
    }
}

/// Produces a node's neighbor table.
pub trait NeighborResolver {
    /// Resolve `node` to its `link_info` table.
    fn resolve(&self, node: &str) -> impl Future<Output = Result<LinkInfo, ResolveError>>;
}

/// Production resolver: stored-document replay, sysinfo fetch, and an
/// optional OLSR reconciliation step selected at construction time.
pub struct SysinfoResolver<N: NameService> {
    store: DocStore,
    client: SysinfoClient,
    olsr: Option<OlsrTranslator<N>>,
}

impl<N: NameService> SysinfoResolver<N> {
    /// Create a resolver using only the primary sysinfo source.
    pub fn new(store: DocStore, client: SysinfoClient) -> Self {
        Self {
            store,
            client,
            olsr: None,
        }
    }

    /// Add the OLSR link source. Once added it is mandatory: a failed
    /// link-report fetch fails the whole visit.
    pub fn with_olsr(mut self, translator: OlsrTranslator<N>) -> Self {
        self.olsr = Some(translator);
        self
    }

    async fn fetch_document(&self, node: &str) -> Result<Value, ResolveError> {
        let mut doc = self.client.sysinfo(node).await?;

        if let Some(translator) = &self.olsr {
            let report = self.client.olsr_links(node).await?;
            let translated = translator.translate(&report.links).await;
            attach_translated(&mut doc, translated);
        }

        Ok(doc)
    }
}

/// Merge a translated link table underneath the document's own
/// `link_info`. The document side wins on conflicts; nested records
/// merge field-by-field. When the document has no table at all, the
/// translation is only attached if it found at least one peer: an
/// absent table stays absent.
fn attach_translated(doc: &mut Value, translated: Map<String, Value>) {
    let Some(root) = doc.as_object_mut() else {
        return;
    };

    match root.get("link_info").and_then(Value::as_object).cloned() {
        Some(primary) => {
            let mut merged = translated;
            deep_merge(&mut merged, primary);
            root.insert("link_info".to_string(), Value::Object(merged));
        }
        None if !translated.is_empty() => {
            root.insert("link_info".to_string(), Value::Object(translated));
        }
        None => {}
    }
}

impl<N: NameService> NeighborResolver for SysinfoResolver<N> {
    async fn resolve(&self, node: &str) -> Result<LinkInfo, ResolveError> {
        let doc = match self.store.load(node)? {
            Some(doc) => {
                debug!(node, "using stored document");
                doc
            }
            None => {
                let doc = self.fetch_document(node).await?;
                // Persisted before the link_info check: a node that
                // answered without link data replays the same outcome
                // from the store on the next run.
                self.store.save(node, &doc)?;
                doc
            }
        };

        doc.get("link_info")
            .and_then(Value::as_object)
            .cloned()
            .ok_or(ResolveError::MissingLinkInfo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::names::testing::StaticNames;
    use axum::Json;
    use axum::Router;
    use axum::routing::get;
    use serde_json::json;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Serve `doc` at the sysinfo path, counting requests.
    async fn spawn_sysinfo(doc: Value, hits: Arc<AtomicUsize>) -> SocketAddr {
        let app = Router::new().route(
            "/cgi-bin/sysinfo.json",
            get(move || {
                let doc = doc.clone();
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(doc)
                }
            }),
        );
        spawn(app).await
    }

    async fn spawn_links(doc: Value) -> SocketAddr {
        let app = Router::new().route(
            "/links",
            get(move || {
                let doc = doc.clone();
                async move { Json(doc) }
            }),
        );
        spawn(app).await
    }

    async fn spawn(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn client(sysinfo_port: u16, olsr_port: Option<u16>) -> SysinfoClient {
        let mut config = Config::new();
        config.fetch.sysinfo_port = Some(sysinfo_port);
        config.fetch.timeout_secs = Some(5);
        config.olsr.port = olsr_port;
        SysinfoClient::new(&config).unwrap()
    }

    fn resolver(dir: &TempDir, client: SysinfoClient) -> SysinfoResolver<StaticNames> {
        SysinfoResolver::new(DocStore::open(dir.path()).unwrap(), client)
    }

    #[tokio::test]
    async fn test_resolve_returns_peers_and_persists() {
        let doc = json!({
            "node": "N1",
            "link_info": {
                "10.0.0.2": {"hostname": "n2", "linkType": "RF"},
                "10.0.0.3": {"hostname": "n3", "linkType": "DTD"}
            }
        });
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_sysinfo(doc, hits.clone()).await;

        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir, client(addr.port(), None));

        let link_info = resolver.resolve("127.0.0.1").await.unwrap();
        let peers: Vec<&String> = link_info.keys().collect();
        assert_eq!(peers, ["10.0.0.2", "10.0.0.3"]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let stored = DocStore::open(dir.path()).unwrap();
        assert!(stored.contains("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_stored_document_skips_network() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_sysinfo(json!({}), hits.clone()).await;

        let dir = TempDir::new().unwrap();
        let store = DocStore::open(dir.path()).unwrap();
        store
            .save(
                "127.0.0.1",
                &json!({"link_info": {"10.0.0.9": {"linkType": "TUN"}}}),
            )
            .unwrap();

        let resolver = resolver(&dir, client(addr.port(), None));
        let link_info = resolver.resolve("127.0.0.1").await.unwrap();

        assert!(link_info.contains_key("10.0.0.9"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_replay_is_idempotent() {
        let doc = json!({"node": "N1", "link_info": {"10.0.0.2": {}}});
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_sysinfo(doc, hits.clone()).await;

        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir, client(addr.port(), None));

        let first = resolver.resolve("127.0.0.1").await.unwrap();
        let path = DocStore::open(dir.path()).unwrap().path_for("127.0.0.1");
        let bytes_after_first = std::fs::read(&path).unwrap();

        let second = resolver.resolve("127.0.0.1").await.unwrap();
        let bytes_after_second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(bytes_after_first, bytes_after_second);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_link_info_is_permanent_and_stored() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_sysinfo(json!({"node": "N1", "lat": "33.5"}), hits.clone()).await;

        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir, client(addr.port(), None));

        let err = resolver.resolve("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, ResolveError::MissingLinkInfo));
        assert!(!err.is_transient());

        // The document was still persisted, and replays the same
        // classification without touching the network.
        assert!(DocStore::open(dir.path()).unwrap().contains("127.0.0.1"));
        let err = resolver.resolve("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, ResolveError::MissingLinkInfo));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_status_error_is_transient_and_not_stored() {
        let app = Router::new().route(
            "/cgi-bin/sysinfo.json",
            get(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
        let addr = spawn(app).await;

        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir, client(addr.port(), None));

        let err = resolver.resolve("127.0.0.1").await.unwrap_err();
        assert!(err.is_transient());
        assert!(!DocStore::open(dir.path()).unwrap().contains("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_transient() {
        let app = Router::new().route("/cgi-bin/sysinfo.json", get(|| async { "<html>" }));
        let addr = spawn(app).await;

        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir, client(addr.port(), None));

        let err = resolver.resolve("127.0.0.1").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_olsr_merge_prefers_sysinfo_fields() {
        let sysinfo = json!({
            "node": "N1",
            "link_info": {"10.0.0.2": {"linkQuality": 5}}
        });
        let links = json!({
            "links": [
                {"remoteIP": "10.0.0.2", "olsrInterface": "wlan0", "linkQuality": 9}
            ]
        });
        let sysinfo_addr = spawn_sysinfo(sysinfo, Arc::new(AtomicUsize::new(0))).await;
        let links_addr = spawn_links(links).await;

        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir, client(sysinfo_addr.port(), Some(links_addr.port())))
            .with_olsr(OlsrTranslator::new(StaticNames::default()));

        let link_info = resolver.resolve("127.0.0.1").await.unwrap();
        let record = &link_info["10.0.0.2"];

        // Sysinfo wins the conflicting field
        assert_eq!(record["linkQuality"], json!(5));
        // Translation fills what sysinfo did not report
        assert_eq!(record["hostname"], json!("10.0.0.2"));
        assert_eq!(record["linkType"], json!("RF"));
    }

    #[tokio::test]
    async fn test_olsr_adds_peers_missing_from_sysinfo() {
        let sysinfo = json!({
            "node": "N1",
            "link_info": {"10.0.0.2": {"linkType": "RF"}}
        });
        let links = json!({
            "links": [
                {"remoteIP": "10.0.0.7", "olsrInterface": "tun50", "linkQuality": 1.0}
            ]
        });
        let sysinfo_addr = spawn_sysinfo(sysinfo, Arc::new(AtomicUsize::new(0))).await;
        let links_addr = spawn_links(links).await;

        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir, client(sysinfo_addr.port(), Some(links_addr.port())))
            .with_olsr(OlsrTranslator::new(StaticNames::default()));

        let link_info = resolver.resolve("127.0.0.1").await.unwrap();
        assert!(link_info.contains_key("10.0.0.2"));
        assert!(link_info.contains_key("10.0.0.7"));
        assert_eq!(link_info["10.0.0.7"]["linkType"], json!("TUN"));
    }

    #[tokio::test]
    async fn test_olsr_fetch_failure_aborts_visit() {
        let sysinfo = json!({"node": "N1", "link_info": {}});
        let sysinfo_addr = spawn_sysinfo(sysinfo, Arc::new(AtomicUsize::new(0))).await;

        // Nothing listens on the links port.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = listener.local_addr().unwrap().port();
        drop(listener);

        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir, client(sysinfo_addr.port(), Some(dead_port)))
            .with_olsr(OlsrTranslator::new(StaticNames::default()));

        let err = resolver.resolve("127.0.0.1").await.unwrap_err();
        assert!(err.is_transient());
        assert!(!DocStore::open(dir.path()).unwrap().contains("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_olsr_empty_translation_stays_permanent() {
        let sysinfo = json!({"node": "N1"});
        let sysinfo_addr = spawn_sysinfo(sysinfo, Arc::new(AtomicUsize::new(0))).await;
        let links_addr = spawn_links(json!({"links": []})).await;

        let dir = TempDir::new().unwrap();
        let resolver = resolver(&dir, client(sysinfo_addr.port(), Some(links_addr.port())))
            .with_olsr(OlsrTranslator::new(StaticNames::default()));

        let err = resolver.resolve("127.0.0.1").await.unwrap_err();
        assert!(matches!(err, ResolveError::MissingLinkInfo));
    }
}
