//! Mesh traversal engine.
//!
//! The crawler owns every piece of traversal state: the visited set,
//! the FIFO frontier of nodes awaiting a visit, and the backlog of
//! transiently failed nodes. Nothing else mutates these; outside
//! observers read point-in-time snapshots published through a watch
//! channel.
//!
//! Retries are unbounded: whenever the frontier drains, the whole
//! backlog is flushed back into it as one epoch and attempted again.
//! A reachable node that keeps failing transiently keeps the crawl
//! alive indefinitely.

use crate::resolve::NeighborResolver;
use std::collections::{HashSet, VecDeque};
use tokio::sync::watch;
use tracing::{debug, info, warn};


/// Unique identity of a mesh node (hostname or address).
pub type NodeId = String;

/// Point-in-time copy of the crawl queues, published after each
/// mutation for the management interface.
#[derive(Clone, Debug, Default)]
pub struct QueueSnapshot {
    /// Nodes awaiting a first or repeat visit, in dequeue order.
    pub frontier: Vec<NodeId>,
    /// Nodes that failed transiently since the last flush, most
    /// recent first.
    pub retry_backlog: Vec<NodeId>,
    /// Count of successfully resolved nodes.
    pub visited: usize,
    /// Number of backlog flushes performed so far.
    pub retry_epochs: u64,
}

/// Breadth-first mesh crawler.
pub struct Crawler<R: NeighborResolver> {
    resolver: R,
    visited: HashSet<NodeId>,
    frontier: VecDeque<NodeId>,
    retry_backlog: VecDeque<NodeId>,
    retry_epochs: u64,
    transient_failures: u64,
    permanent_failures: u64,
    snapshot_tx: watch::Sender<QueueSnapshot>,
}

impl<R: NeighborResolver> Crawler<R> {
    /// Create a crawler around a resolver. The queues start empty;
    /// seed them with [`enqueue`](Self::enqueue).
    pub fn new(resolver: R) -> Self {
        let (snapshot_tx, _) = watch::channel(QueueSnapshot::default());
        Self {
            resolver,
            visited: HashSet::new(),
            frontier: VecDeque::new(),
            retry_backlog: VecDeque::new(),
            retry_epochs: 0,
            transient_failures: 0,
            permanent_failures: 0,
            snapshot_tx,
        }
    }

    /// Subscribe to queue snapshots. Receivers see the latest state
    /// without blocking or being blocked by the crawl loop.
    pub fn subscribe(&self) -> watch::Receiver<QueueSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Queue a node for visiting unless it already has a home in the
    /// visited set, the frontier, or the retry backlog.
    pub fn enqueue(&mut self, node: impl Into<NodeId>) {
        let node = node.into();
        if self.visited.contains(&node) {
            debug!(node = %node, "skipping, already visited");
            return;
        }
        if self.frontier.contains(&node) || self.retry_backlog.contains(&node) {
            return;
        }
        self.frontier.push_back(node);
        self.publish();
    }

    /// Successfully resolved nodes.
    pub fn visited(&self) -> &HashSet<NodeId> {
        &self.visited
    }

    /// Number of backlog flushes performed.
    pub fn retry_epochs(&self) -> u64 {
        self.retry_epochs
    }

    /// Build a snapshot of the current queue state.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            frontier: self.frontier.iter().cloned().collect(),
            retry_backlog: self.retry_backlog.iter().cloned().collect(),
            visited: self.visited.len(),
            retry_epochs: self.retry_epochs,
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }

    /// Drain the frontier and retry backlog until both are empty.
    ///
    /// Failures never abort the run. Transient failures park the node
    /// in the backlog for the next epoch; permanent failures drop the
    /// node for this attempt only, so a later rediscovery through
    /// another node's links queues it again.
    pub async fn run(&mut self) {
        while self.frontier.len() + self.retry_backlog.len() > 0 {
            if self.frontier.is_empty() {
                self.retry_epochs += 1;
                info!(
                    retrying = self.retry_backlog.len(),
                    retry_epochs = self.retry_epochs,
                    "flushing retry backlog"
                );
                self.frontier.extend(self.retry_backlog.drain(..));
                self.publish();
            }

            info!(
                visited = self.visited.len(),
                frontier = self.frontier.len(),
                retry_backlog = self.retry_backlog.len(),
                retry_epochs = self.retry_epochs,
                "crawl progress"
            );

            let Some(node) = self.frontier.pop_front() else {
                break;
            };

            match self.resolver.resolve(&node).await {
                Ok(link_info) => {
                    info!(node = %node, neighbors = link_info.len(), "resolved");
                    self.visited.insert(node);
                    for peer in link_info.keys() {
                        self.enqueue(peer.clone());
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(node = %node, error = %e, "visit failed, queued for retry");
                    self.transient_failures += 1;
                    self.retry_backlog.push_front(node);
                }
                Err(e) => {
                    warn!(node = %node, error = %e, "visit failed permanently, dropping");
                    self.permanent_failures += 1;
                }
            }

            self.publish();
        }

        info!(
            visited = self.visited.len(),
            retry_epochs = self.retry_epochs,
            transient_failures = self.transient_failures,
            permanent_failures = self.permanent_failures,
            "crawl complete"
        );
    }
}
