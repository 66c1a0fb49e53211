//! One full diagnosis pass: fetch, derive, correlate, dedup, assemble.

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::alert::EntityAlert;
use crate::client::ClusterClient;
use crate::derive::{derive_entity_status, derive_event_state, DeriveContext, EntitySnapshot};
use crate::markup;
use crate::state::{EntityKind, EntityName, EntityState, EventState, OrderedSet};
use crate::store::DedupStore;
use triage_config::TriageConfig;

/// Events this close to entity creation are scheduling/startup chatter.
fn startup_event_window() -> Duration {
    Duration::seconds(5)
}

/// Result of one pass. Fetch and derivation failures accumulate here
/// instead of aborting: a namespace that fails to list pods does not stop
/// the others from being diagnosed.
pub struct DiagnosisOutcome {
    pub alerts: Vec<EntityAlert>,
    pub errors: Vec<anyhow::Error>,
}

/// Drives a single pass over a point-in-time cluster snapshot.
pub struct Diagnostician<'a> {
    client: &'a dyn ClusterClient,
    config: &'a TriageConfig,
}

/// Insertion-ordered accumulator map; one live state per entity name.
#[derive(Default)]
struct EntityStates {
    index: HashMap<EntityName, usize>,
    states: Vec<EntityState>,
}

impl EntityStates {
    fn get_or_insert(&mut self, name: EntityName) -> &mut EntityState {
        if let Some(idx) = self.index.get(&name) {
            return &mut self.states[*idx];
        }
        let idx = self.states.len();
        self.index.insert(name.clone(), idx);
        self.states.push(EntityState::new(name));
        &mut self.states[idx]
    }
}

impl<'a> Diagnostician<'a> {
    #[must_use]
    pub fn new(client: &'a dyn ClusterClient, config: &'a TriageConfig) -> Self {
        Self { client, config }
    }

    /// Run one pass at `now`. The store decides which derived messages are
    /// new enough to report; the caller flushes it afterwards.
    pub async fn run(&self, store: &mut DedupStore, now: DateTime<Utc>) -> DiagnosisOutcome {
        let ctx = DeriveContext::new(self.config, now);
        let cluster = self.client.cluster_name().to_string();
        let mut errors: Vec<anyhow::Error> = Vec::new();
        let mut states = EntityStates::default();
        let mut events: Vec<EventState> = Vec::new();

        let namespaces = match self.client.list_namespaces().await {
            Ok(list) => list
                .into_iter()
                .filter_map(|ns| ns.metadata.name)
                .filter(|ns| self.config.namespace_relevant(ns))
                .collect(),
            Err(err) => {
                errors.push(err.context("listing namespaces"));
                Vec::new()
            }
        };

        for namespace in &namespaces {
            match self.client.list_events(namespace).await {
                Ok(list) => {
                    for event in &list {
                        let state = derive_event_state(event, &ctx);
                        if !state.is_healthy() {
                            events.push(state);
                        }
                    }
                }
                Err(err) => {
                    errors.push(err.context(format!("listing events in {namespace}")));
                }
            }

            match self.client.list_pods(namespace).await {
                Ok(pods) => {
                    for pod in &pods {
                        let Some(name) = pod.metadata.name.clone() else {
                            continue;
                        };
                        let entity =
                            EntityName::new(namespace.clone(), EntityKind::Pod, name.clone());
                        let state = states.get_or_insert(entity);
                        if let Err(err) = derive_entity_status(
                            &EntitySnapshot::Pod(pod),
                            state,
                            self.client,
                            &ctx,
                        )
                        .await
                        {
                            errors.push(err.context(format!("diagnosing pod {namespace}/{name}")));
                        }
                    }
                }
                Err(err) => {
                    errors.push(err.context(format!("listing pods in {namespace}")));
                }
            }

            match self.client.list_replica_groups(namespace).await {
                Ok(groups) => {
                    for group in &groups {
                        let Some(name) = group.metadata.name.clone() else {
                            continue;
                        };
                        let entity = EntityName::new(
                            namespace.clone(),
                            EntityKind::ReplicaGroup,
                            name.clone(),
                        );
                        let state = states.get_or_insert(entity);
                        if let Err(err) = derive_entity_status(
                            &EntitySnapshot::ReplicaGroup(group),
                            state,
                            self.client,
                            &ctx,
                        )
                        .await
                        {
                            errors.push(
                                err.context(format!("diagnosing replica group {namespace}/{name}")),
                            );
                        }
                    }
                }
                Err(err) => {
                    errors.push(err.context(format!("listing replica groups in {namespace}")));
                }
            }
        }

        match self.client.list_nodes().await {
            Ok(nodes) => {
                for node in &nodes {
                    let Some(name) = node.metadata.name.clone() else {
                        continue;
                    };
                    let entity = EntityName::new("", EntityKind::Node, name.clone());
                    let state = states.get_or_insert(entity);
                    if let Err(err) = derive_entity_status(
                        &EntitySnapshot::Node(node),
                        state,
                        self.client,
                        &ctx,
                    )
                    .await
                    {
                        errors.push(err.context(format!("diagnosing node {name}")));
                    }
                }
            }
            Err(err) => errors.push(err.context("listing nodes")),
        }

        let alerts = self.assemble(&cluster, states, events, store, now);
        info!(
            cluster = %cluster,
            alerts = alerts.len(),
            errors = errors.len(),
            "diagnosis pass finished"
        );
        DiagnosisOutcome { alerts, errors }
    }

    fn assemble(
        &self,
        cluster: &str,
        states: EntityStates,
        events: Vec<EventState>,
        store: &mut DedupStore,
        now: DateTime<Utc>,
    ) -> Vec<EntityAlert> {
        store.record_pass(cluster, now);

        // group unhealthy events by involved object, insertion order kept
        let mut group_index: HashMap<EntityName, usize> = HashMap::new();
        let mut groups: Vec<(EntityName, Vec<EventState>)> = Vec::new();
        for event in events {
            let idx = match group_index.get(&event.name) {
                Some(idx) => *idx,
                None => {
                    let idx = groups.len();
                    group_index.insert(event.name.clone(), idx);
                    groups.push((event.name.clone(), Vec::new()));
                    idx
                }
            };
            groups[idx].1.push(event);
        }
        let mut taken: Vec<bool> = vec![false; groups.len()];

        let mut alerts = Vec::new();
        for state in states.states {
            let correlated = match group_index.get(&state.name) {
                Some(idx) => {
                    taken[*idx] = true;
                    Some(&groups[*idx].1)
                }
                None => None,
            };

            let mut surviving_messages = Vec::new();
            for message in state.messages() {
                if store.try_add(cluster, &state.name, message, now) {
                    surviving_messages.push(message.clone());
                }
            }

            let mut surviving_events: Vec<&EventState> = Vec::new();
            for event in correlated.into_iter().flatten() {
                if is_startup_noise(event, state.created_timestamp) {
                    debug!(name = %state.name, "dropping startup-window event");
                    continue;
                }
                if store.try_add(cluster, &state.name, &event.message, now) {
                    surviving_events.push(event);
                }
            }

            if surviving_messages.is_empty() && surviving_events.is_empty() {
                continue;
            }

            let mut timestamp_candidates = Vec::new();
            if !surviving_messages.is_empty() {
                timestamp_candidates.extend(state.problem_timestamp);
            }
            timestamp_candidates.extend(
                surviving_events
                    .iter()
                    .filter_map(|event| event.first_timestamp),
            );

            alerts.push(EntityAlert {
                cluster_name: cluster.to_string(),
                namespace: state.name.namespace.clone(),
                name: state.name.name.clone(),
                kind: state.name.kind.to_string(),
                node: state.node.clone(),
                messages: clean_unique(surviving_messages.iter().map(String::as_str)),
                events: clean_unique(surviving_events.iter().map(|e| e.message.as_str())),
                logs_by_container_name: state.logs_collections,
                timestamp: timestamp_candidates.into_iter().min().unwrap_or(now),
            });
        }

        // whatever events found no entity this pass
        for (idx, (name, group)) in groups.iter().enumerate() {
            if taken[idx] || name.kind.suppresses_standalone_events() {
                continue;
            }
            let mut surviving: Vec<&EventState> = Vec::new();
            for event in group {
                if store.try_add(cluster, name, &event.message, now) {
                    surviving.push(event);
                }
            }
            if surviving.is_empty() {
                continue;
            }
            alerts.push(EntityAlert {
                cluster_name: cluster.to_string(),
                namespace: name.namespace.clone(),
                name: name.name.clone(),
                kind: name.kind.to_string(),
                node: String::new(),
                messages: Vec::new(),
                events: clean_unique(surviving.iter().map(|e| e.message.as_str())),
                logs_by_container_name: Default::default(),
                timestamp: surviving
                    .iter()
                    .filter_map(|e| e.first_timestamp)
                    .min()
                    .unwrap_or(now),
            });
        }

        alerts
    }
}

/// Display-clean a sequence, dropping repeats while keeping first-seen
/// order.
fn clean_unique<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut set = OrderedSet::default();
    for item in raw {
        set.insert(markup::clean(item));
    }
    set.into_items()
}

fn is_startup_noise(event: &EventState, created: Option<DateTime<Utc>>) -> bool {
    let Some(ts) = event.first_timestamp.or(event.last_timestamp) else {
        return false;
    };
    let Some(created) = created else {
        return false;
    };
    // anything at or before creation is scheduling chatter as well
    ts - created < startup_event_window()
}
