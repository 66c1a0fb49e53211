//! kube-backed implementation of the diagnosis core's cluster boundary.
//!
//! Nothing here is clever on purpose: list calls, a log tail, and cluster
//! name resolution from the kubeconfig context. Pagination and retries are
//! `kube`'s problem.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::{Event, Namespace, Node, Pod};
use kube::api::{Api, ListParams, LogParams};
use kube::config::Kubeconfig;
use std::time::Duration;
use tracing::debug;

use diagnose::ClusterClient;

/// Cluster name used when neither config nor kubeconfig provide one.
const DEFAULT_CLUSTER_NAME: &str = "default";

pub struct KubeClusterClient {
    client: kube::Client,
    cluster_name: String,
    log_tail_lines: i64,
}

impl KubeClusterClient {
    /// Connect using the inferred environment (kubeconfig or in-cluster).
    ///
    /// # Errors
    /// Returns an error when no usable Kubernetes configuration can be
    /// inferred or the client cannot be built.
    pub async fn connect(
        cluster_name: Option<String>,
        request_timeout: Option<Duration>,
        log_tail_lines: i64,
    ) -> Result<Self> {
        let mut config = kube::Config::infer()
            .await
            .context("inferring Kubernetes configuration")?;
        if let Some(timeout) = request_timeout {
            config.connect_timeout = Some(timeout);
            config.read_timeout = Some(timeout);
        }
        let client = kube::Client::try_from(config).context("building Kubernetes client")?;

        let cluster_name = cluster_name
            .or_else(current_context_name)
            .unwrap_or_else(|| DEFAULT_CLUSTER_NAME.to_string());
        debug!(%cluster_name, "connected to cluster");

        Ok(Self {
            client,
            cluster_name,
            log_tail_lines,
        })
    }
}

fn current_context_name() -> Option<String> {
    Kubeconfig::read().ok().and_then(|kc| kc.current_context)
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api
            .list(&ListParams::default())
            .await
            .context("listing namespaces")?
            .items)
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api
            .list(&ListParams::default())
            .await
            .with_context(|| format!("listing pods in {namespace}"))?
            .items)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api
            .list(&ListParams::default())
            .await
            .context("listing nodes")?
            .items)
    }

    async fn list_replica_groups(&self, namespace: &str) -> Result<Vec<ReplicaSet>> {
        let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
        Ok(api
            .list(&ListParams::default())
            .await
            .with_context(|| format!("listing replica sets in {namespace}"))?
            .items)
    }

    async fn list_events(&self, namespace: &str) -> Result<Vec<Event>> {
        let api: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        Ok(api
            .list(&ListParams::default())
            .await
            .with_context(|| format!("listing events in {namespace}"))?
            .items)
    }

    async fn container_logs(&self, namespace: &str, pod: &str, container: &str) -> Result<String> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            container: Some(container.to_string()),
            tail_lines: Some(self.log_tail_lines),
            ..LogParams::default()
        };
        api.logs(pod, &params)
            .await
            .with_context(|| format!("fetching logs for {namespace}/{pod}/{container}"))
    }
}
