//! Minimal fake cluster clients for unit tests.

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::{Event, Namespace, Node, Pod};

use crate::client::ClusterClient;

/// A client that returns nothing, for derivation tests that only need the
/// log-fetch boundary to exist.
pub struct NullClient;

#[async_trait]
impl ClusterClient for NullClient {
    fn cluster_name(&self) -> &str {
        "test"
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        Ok(Vec::new())
    }

    async fn list_pods(&self, _namespace: &str) -> Result<Vec<Pod>> {
        Ok(Vec::new())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(Vec::new())
    }

    async fn list_replica_groups(&self, _namespace: &str) -> Result<Vec<ReplicaSet>> {
        Ok(Vec::new())
    }

    async fn list_events(&self, _namespace: &str) -> Result<Vec<Event>> {
        Ok(Vec::new())
    }

    async fn container_logs(&self, _namespace: &str, _pod: &str, _container: &str) -> Result<String> {
        Ok(String::new())
    }
}

/// A client that serves a fixed log tail for every container.
pub struct StaticLogsClient {
    logs: String,
}

impl StaticLogsClient {
    pub fn new(logs: impl Into<String>) -> Self {
        Self { logs: logs.into() }
    }
}

#[async_trait]
impl ClusterClient for StaticLogsClient {
    fn cluster_name(&self) -> &str {
        "test"
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        Ok(Vec::new())
    }

    async fn list_pods(&self, _namespace: &str) -> Result<Vec<Pod>> {
        Ok(Vec::new())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(Vec::new())
    }

    async fn list_replica_groups(&self, _namespace: &str) -> Result<Vec<ReplicaSet>> {
        Ok(Vec::new())
    }

    async fn list_events(&self, _namespace: &str) -> Result<Vec<Event>> {
        Ok(Vec::new())
    }

    async fn container_logs(&self, _namespace: &str, _pod: &str, _container: &str) -> Result<String> {
        Ok(self.logs.clone())
    }
}
