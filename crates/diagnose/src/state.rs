//! Per-pass accumulators for entity and event health.
//!
//! One `EntityState` exists per live entity observed during a diagnosis
//! pass; it collects the problem messages the derivation engine appends
//! and is discarded when the pass ends. Only fingerprints of its messages
//! outlive the pass, through the dedup store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::markup;

/// Closed set of entity kinds the derivation engine understands, plus the
/// synthetic `Cluster` kind for events without an involved object and a
/// catch-all for event kinds outside the diagnosed set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Pod,
    Node,
    ReplicaGroup,
    Cluster,
    Other(String),
}

impl EntityKind {
    /// Map an involved-object kind string from the cluster API.
    #[must_use]
    pub fn from_object_kind(kind: &str) -> Self {
        match kind {
            "Pod" => Self::Pod,
            "Node" => Self::Node,
            "ReplicaSet" => Self::ReplicaGroup,
            "" => Self::Cluster,
            other => Self::Other(other.to_string()),
        }
    }

    /// Kinds whose orphan events are dropped instead of reported standalone.
    #[must_use]
    pub fn suppresses_standalone_events(&self) -> bool {
        matches!(self, Self::Pod | Self::Node | Self::ReplicaGroup)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pod => write!(f, "Pod"),
            Self::Node => write!(f, "Node"),
            Self::ReplicaGroup => write!(f, "ReplicaSet"),
            Self::Cluster => write!(f, "Cluster"),
            Self::Other(kind) => write!(f, "{kind}"),
        }
    }
}

/// Identity tuple for everything the pass tracks. Used as a map key; two
/// live accumulators never share a name within one pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityName {
    pub namespace: String,
    pub kind: EntityKind,
    pub name: String,
}

impl EntityName {
    #[must_use]
    pub fn new(namespace: impl Into<String>, kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for EntityName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.kind, self.name)
    }
}

/// Insertion-ordered string set: a sequence for order, a hash set for
/// membership.
#[derive(Debug, Default)]
pub(crate) struct OrderedSet {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl OrderedSet {
    pub(crate) fn insert(&mut self, item: String) -> bool {
        if self.seen.contains(&item) {
            return false;
        }
        self.seen.insert(item.clone());
        self.items.push(item);
        true
    }

    pub(crate) fn into_items(self) -> Vec<String> {
        self.items
    }
}

/// Accumulator for one entity's derived problems during a single pass.
#[derive(Debug)]
pub struct EntityState {
    pub name: EntityName,
    /// Scheduling node, for pods.
    pub node: String,
    pub created_timestamp: Option<DateTime<Utc>>,
    /// Earliest timestamp among appended messages; backdates the alert.
    pub problem_timestamp: Option<DateTime<Utc>>,
    /// Captured log tails, keyed by container name.
    pub logs_collections: BTreeMap<String, String>,
    messages: Vec<String>,
}

impl EntityState {
    #[must_use]
    pub fn new(name: EntityName) -> Self {
        Self {
            name,
            node: String::new(),
            created_timestamp: None,
            problem_timestamp: None,
            logs_collections: BTreeMap::new(),
            messages: Vec::new(),
        }
    }

    /// Append a problem message. Whitespace is trimmed and empty results
    /// are dropped. A supplied timestamp lowers `problem_timestamp`; absent
    /// timestamps never do.
    pub fn append_message(&mut self, timestamp: Option<DateTime<Utc>>, message: impl AsRef<str>) {
        let message = message.as_ref().trim();
        if message.is_empty() {
            return;
        }
        self.messages.push(message.to_string());
        if let Some(ts) = timestamp {
            match self.problem_timestamp {
                Some(current) if current <= ts => {}
                _ => self.problem_timestamp = Some(ts),
            }
        }
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.messages.is_empty()
    }

    /// Raw messages, temporal markup included. These feed the dedup store.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Display-cleaned messages, deduplicated by clean text in first-seen
    /// order.
    #[must_use]
    pub fn clean_messages(&self) -> Vec<String> {
        let mut out = OrderedSet::default();
        for message in &self.messages {
            out.insert(markup::clean(message));
        }
        out.into_items()
    }
}

/// One raw cluster event, evaluated independently. An empty message means
/// the event was filtered as healthy noise.
#[derive(Debug, Clone)]
pub struct EventState {
    pub name: EntityName,
    pub message: String,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

impl EventState {
    #[must_use]
    pub fn healthy(name: EntityName) -> Self {
        Self {
            name,
            message: String::new(),
            first_timestamp: None,
            last_timestamp: None,
        }
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.message.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn name() -> EntityName {
        EntityName::new("default", EntityKind::Pod, "web-0")
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn healthy_until_first_message() {
        let mut state = EntityState::new(name());
        assert!(state.is_healthy());
        state.append_message(Some(ts(0)), "something broke");
        assert!(!state.is_healthy());
    }

    #[test]
    fn empty_and_whitespace_messages_ignored() {
        let mut state = EntityState::new(name());
        state.append_message(Some(ts(0)), "");
        state.append_message(Some(ts(0)), "   \n\t ");
        assert!(state.is_healthy());
        assert!(state.problem_timestamp.is_none());
    }

    #[test]
    fn problem_timestamp_takes_minimum() {
        let mut state = EntityState::new(name());
        state.append_message(Some(ts(100)), "first");
        state.append_message(Some(ts(50)), "earlier");
        state.append_message(Some(ts(200)), "later");
        assert_eq!(state.problem_timestamp, Some(ts(50)));
    }

    #[test]
    fn missing_timestamp_never_lowers() {
        let mut state = EntityState::new(name());
        state.append_message(Some(ts(100)), "first");
        state.append_message(None, "no time attached");
        assert_eq!(state.problem_timestamp, Some(ts(100)));
    }

    #[test]
    fn clean_messages_dedup_preserves_order() {
        let mut state = EntityState::new(name());
        state.append_message(Some(ts(0)), "b problem");
        state.append_message(Some(ts(0)), "a problem");
        // same display text after cleaning, different markup content
        state.append_message(Some(ts(0)), "b problem");
        assert_eq!(state.clean_messages(), vec!["b problem", "a problem"]);
    }

    #[test]
    fn kind_mapping() {
        assert_eq!(EntityKind::from_object_kind("Pod"), EntityKind::Pod);
        assert_eq!(EntityKind::from_object_kind("ReplicaSet"), EntityKind::ReplicaGroup);
        assert_eq!(EntityKind::from_object_kind(""), EntityKind::Cluster);
        assert_eq!(
            EntityKind::from_object_kind("Ingress"),
            EntityKind::Other("Ingress".to_string())
        );
        assert!(EntityKind::Pod.suppresses_standalone_events());
        assert!(!EntityKind::Cluster.suppresses_standalone_events());
        assert!(!EntityKind::Other("Ingress".into()).suppresses_standalone_events());
    }
}
