//! Boundary trait for the cluster API.
//!
//! The diagnosis core never touches the network: it consumes point-in-time
//! snapshot collections through this trait. Pagination, timeouts, and auth
//! are entirely the implementor's concern (see the `client` crate).

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::{Event, Namespace, Node, Pod};

#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Name used to scope alerts and the dedup store.
    fn cluster_name(&self) -> &str;

    async fn list_namespaces(&self) -> Result<Vec<Namespace>>;

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>>;

    async fn list_nodes(&self) -> Result<Vec<Node>>;

    async fn list_replica_groups(&self, namespace: &str) -> Result<Vec<ReplicaSet>>;

    async fn list_events(&self, namespace: &str) -> Result<Vec<Event>>;

    /// Tail of one container's log. Failures here are non-fatal to the
    /// pass; callers degrade to omitting the capture.
    async fn container_logs(&self, namespace: &str, pod: &str, container: &str) -> Result<String>;
}
