//! Cluster nodes and the snapshot of them that requests are routed over.
//!
//! A [`Topology`] never changes after construction apart from its preferred
//! node cursor. Refreshing the cluster view means building a new `Topology`
//! and swapping it into the [`TopologyCache`]; requests already in flight keep
//! the `Arc` they started with and finish on it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;

use crate::ordered_list::{Item, OrderedList};

/// Tag used for nodes known only by url, before the cluster reported theirs.
pub const UNKNOWN_CLUSTER_TAG: &str = "?";

fn unknown_cluster_tag() -> String {
    UNKNOWN_CLUSTER_TAG.to_string()
}

/// One store node able to serve a database.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerNode {
    #[serde(rename = "Url")]
    pub url: String,
    #[serde(rename = "ClusterTag", default = "unknown_cluster_tag")]
    pub cluster_tag: String,
    #[serde(rename = "Database", default)]
    pub database: String,
}

impl ServerNode {
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            cluster_tag: unknown_cluster_tag(),
            database: database.into(),
        }
    }

    pub fn with_cluster_tag(mut self, tag: impl Into<String>) -> Self {
        self.cluster_tag = tag.into();
        self
    }

    /// Absolute url for a request path.
    ///
    /// Paths starting with `/` are rooted at the node, anything else is
    /// relative to the node's database endpoint.
    pub fn resolve(&self, path: &str) -> String {
        let base = self.url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/databases/{}/{path}", self.database)
        }
    }
}

/// Immutable node list plus the cursor of the node requests start at.
#[derive(Debug)]
pub struct Topology {
    etag: i64,
    nodes: OrderedList<ServerNode>,
    preferred: AtomicUsize,
}

impl Topology {
    pub fn new(etag: i64, nodes: impl IntoIterator<Item = ServerNode>) -> Self {
        Self {
            etag,
            nodes: nodes.into_iter().collect(),
            preferred: AtomicUsize::new(0),
        }
    }

    /// Seed topology from configured urls, before the cluster has been asked.
    pub fn from_urls<I, U>(database: &str, urls: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<String>,
    {
        Self::new(
            -1,
            urls.into_iter().map(|url| ServerNode::new(url, database)),
        )
    }

    pub fn etag(&self) -> i64 {
        self.etag
    }

    pub fn nodes(&self) -> &OrderedList<ServerNode> {
        &self.nodes
    }

    /// Node the next request starts at; the first node when the cursor is
    /// out of range.
    pub fn preferred(&self) -> Option<Item<'_, ServerNode>> {
        self.nodes
            .item_at(self.preferred.load(Ordering::Acquire))
            .or_else(|| self.nodes.first())
    }

    pub fn preferred_node(&self) -> Option<&ServerNode> {
        self.preferred().map(|item| item.value())
    }

    pub(crate) fn set_preferred(&self, index: usize) {
        self.preferred.store(index, Ordering::Release);
    }
}

/// Current topology, replaced wholesale and read as a shared snapshot.
#[derive(Debug)]
pub struct TopologyCache {
    current: RwLock<Arc<Topology>>,
}

impl TopologyCache {
    pub fn new(topology: Topology) -> Self {
        Self {
            current: RwLock::new(Arc::new(topology)),
        }
    }

    pub fn snapshot(&self) -> Arc<Topology> {
        // Writers only swap an Arc, so a poisoned lock still holds a whole snapshot.
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Installs `topology` and returns the snapshot it replaced.
    pub fn replace(&self, topology: Topology) -> Arc<Topology> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, Arc::new(topology))
    }

    /// Installs `topology` only if its etag is newer than the current one.
    pub fn replace_if_newer(&self, topology: Topology) -> bool {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if topology.etag <= current.etag {
            return false;
        }
        *current = Arc::new(topology);
        true
    }
}
