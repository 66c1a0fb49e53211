//! Health derivation: snapshot in, problem messages out.
//!
//! One derivation function per entity kind, all stateless across entities:
//! each reads the snapshot plus config and writes into that entity's
//! accumulator.

mod event;
mod node;
mod pod;
mod replica;

pub use event::derive_event_state;
pub use node::derive_node_status;
pub use pod::derive_pod_status;
pub use replica::derive_replica_group_status;

use anyhow::Result;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::ReplicaSet;
use k8s_openapi::api::core::v1::{Node, Pod};
use triage_config::TriageConfig;

use crate::client::ClusterClient;
use crate::state::EntityState;

/// Inputs shared by every derivation call within one pass.
pub struct DeriveContext<'a> {
    pub config: &'a TriageConfig,
    /// The pass's single notion of "now"; never re-sampled mid-pass.
    pub now: DateTime<Utc>,
}

impl<'a> DeriveContext<'a> {
    #[must_use]
    pub fn new(config: &'a TriageConfig, now: DateTime<Utc>) -> Self {
        Self { config, now }
    }
}

/// One diagnosable entity snapshot. Events accumulate separately and go
/// through [`derive_event_state`].
pub enum EntitySnapshot<'a> {
    Pod(&'a Pod),
    Node(&'a Node),
    ReplicaGroup(&'a ReplicaSet),
}

/// Dispatch a snapshot to its kind-specific derivation.
///
/// # Errors
/// Propagates derivation errors; each is independent and the caller is
/// expected to aggregate rather than abort.
pub async fn derive_entity_status(
    snapshot: &EntitySnapshot<'_>,
    state: &mut EntityState,
    client: &dyn ClusterClient,
    ctx: &DeriveContext<'_>,
) -> Result<()> {
    match snapshot {
        EntitySnapshot::Pod(pod) => derive_pod_status(pod, state, client, ctx).await,
        EntitySnapshot::Node(node) => derive_node_status(node, state, ctx),
        EntitySnapshot::ReplicaGroup(group) => derive_replica_group_status(group, state, ctx),
    }
}
