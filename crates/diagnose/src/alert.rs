//! Output unit of a diagnosis pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One unhealthy entity (or standalone event group), ready for a sink.
/// Messages and events are display-cleaned and deduplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityAlert {
    pub cluster_name: String,
    pub namespace: String,
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub node: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub events: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub logs_by_container_name: BTreeMap<String, String>,
    /// Earliest surviving problem/event time; "now" when nothing carried a
    /// timestamp.
    pub timestamp: DateTime<Utc>,
}

/// Alerts grouped per cluster, the shape sinks consume.
pub type ClusterAlerts = BTreeMap<String, Vec<EntityAlert>>;
