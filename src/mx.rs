//! Management interface.
//!
//! A minimal read-only HTTP surface for watching a long crawl: the
//! live frontier and retry backlog as plain-text listings, plus a JSON
//! status summary. Handlers read the latest queue snapshot from the
//! crawler's watch channel, so serving a request never touches the
//! crawl loop's own state. Unauthenticated; bind it accordingly.

use crate::crawl::QueueSnapshot;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// Build the management router over a snapshot receiver.
pub fn router(snapshots: watch::Receiver<QueueSnapshot>) -> Router {
    Router::new()
        .route("/to_crawl", get(to_crawl))
        .route("/error_nodes", get(error_nodes))
        .route("/status", get(status))
        .with_state(snapshots)
}

/// Serve the management interface until the process exits.
pub async fn serve(
    bind_addr: &str,
    port: u16,
    snapshots: watch::Receiver<QueueSnapshot>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind((bind_addr, port)).await?;
    info!(addr = %listener.local_addr()?, "management interface listening");
    axum::serve(listener, router(snapshots)).await
}

fn lines(nodes: &[String]) -> String {
    if nodes.is_empty() {
        String::new()
    } else {
        format!("{}\n", nodes.join("\n"))
    }
}

async fn to_crawl(State(snapshots): State<watch::Receiver<QueueSnapshot>>) -> String {
    lines(&snapshots.borrow().frontier)
}

async fn error_nodes(State(snapshots): State<watch::Receiver<QueueSnapshot>>) -> String {
    lines(&snapshots.borrow().retry_backlog)
}

async fn status(State(snapshots): State<watch::Receiver<QueueSnapshot>>) -> Json<Value> {
    let snapshot = snapshots.borrow().clone();
    Json(json!({
        "visited": snapshot.visited,
        "to_crawl": snapshot.frontier.len(),
        "error_nodes": snapshot.retry_backlog.len(),
        "retry_epochs": snapshot.retry_epochs,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    async fn spawn_mx(snapshots: watch::Receiver<QueueSnapshot>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(snapshots)).await.unwrap();
        });
        addr
    }

    async fn get_text(addr: SocketAddr, path: &str) -> String {
        reqwest::get(format!("http://{addr}{path}"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_queue_listings() {
        let (tx, rx) = watch::channel(QueueSnapshot::default());
        let addr = spawn_mx(rx).await;

        tx.send_replace(QueueSnapshot {
            frontier: vec!["10.0.0.2".to_string(), "10.0.0.3".to_string()],
            retry_backlog: vec!["10.0.0.9".to_string()],
            visited: 4,
            retry_epochs: 1,
        });

        assert_eq!(get_text(addr, "/to_crawl").await, "10.0.0.2\n10.0.0.3\n");
        assert_eq!(get_text(addr, "/error_nodes").await, "10.0.0.9\n");
    }

    #[tokio::test]
    async fn test_empty_queues_render_empty() {
        let (_tx, rx) = watch::channel(QueueSnapshot::default());
        let addr = spawn_mx(rx).await;

        assert_eq!(get_text(addr, "/to_crawl").await, "");
        assert_eq!(get_text(addr, "/error_nodes").await, "");
    }

    #[tokio::test]
    async fn test_status_reflects_latest_snapshot() {
        let (tx, rx) = watch::channel(QueueSnapshot::default());
        let addr = spawn_mx(rx).await;

        tx.send_replace(QueueSnapshot {
            frontier: vec!["a".to_string()],
            retry_backlog: Vec::new(),
            visited: 7,
            retry_epochs: 3,
        });

        let body: Value =
            serde_json::from_str(&get_text(addr, "/status").await).unwrap();
        assert_eq!(body["visited"], json!(7));
        assert_eq!(body["to_crawl"], json!(1));
        assert_eq!(body["error_nodes"], json!(0));
        assert_eq!(body["retry_epochs"], json!(3));

        // A later snapshot is visible on the next read
        tx.send_replace(QueueSnapshot {
            visited: 8,
            ..QueueSnapshot::default()
        });
        let body: Value =
            serde_json::from_str(&get_text(addr, "/status").await).unwrap();
        assert_eq!(body["visited"], json!(8));
    }
}
