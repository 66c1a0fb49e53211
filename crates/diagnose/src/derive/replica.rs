//! Replica-group (ReplicaSet) health derivation.

use anyhow::Result;
use k8s_openapi::api::apps::v1::ReplicaSet;
use tracing::warn;

use super::DeriveContext;
use crate::markup::wrap_temporal;
use crate::state::EntityState;
use crate::units::{format_duration, humanize_units, reason_as_words};

/// Annotation the deployment controller stamps on managed replica sets;
/// consulted when `spec.replicas` is absent.
const DESIRED_REPLICAS_ANNOTATION: &str = "deployment.kubernetes.io/desired-replicas";

/// Derive problem messages for one replica group into its accumulator.
///
/// # Errors
/// Currently infallible; malformed annotations fall back to a desired
/// count of 1 rather than erroring.
pub fn derive_replica_group_status(
    replica_group: &ReplicaSet,
    state: &mut EntityState,
    ctx: &DeriveContext<'_>,
) -> Result<()> {
    state.created_timestamp = replica_group
        .metadata
        .creation_timestamp
        .as_ref()
        .map(|t| t.0);

    let desired = desired_replicas(replica_group);
    if desired == 0 {
        return Ok(());
    }
    let Some(status) = replica_group.status.as_ref() else {
        return Ok(());
    };
    if status.replicas >= desired {
        return Ok(());
    }

    for condition in status.conditions.iter().flatten() {
        if condition.status == "True" {
            continue;
        }
        let transition = condition.last_transition_time.as_ref().map(|t| t.0);
        let reason = condition.reason.as_deref().unwrap_or(&condition.type_);
        let detail = humanize_units(condition.message.as_deref().unwrap_or_default());
        let since = transition.map_or_else(|| "0s".to_string(), |t| format_duration(ctx.now - t));
        state.append_message(
            transition,
            format!(
                "{}: {} (last transition: {} ago)",
                reason_as_words(reason),
                detail.trim(),
                wrap_temporal(since)
            ),
        );
    }

    Ok(())
}

fn desired_replicas(replica_group: &ReplicaSet) -> i32 {
    if let Some(replicas) = replica_group.spec.as_ref().and_then(|s| s.replicas) {
        return replicas;
    }
    if let Some(annotation) = replica_group
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(DESIRED_REPLICAS_ANNOTATION))
    {
        match annotation.parse::<i32>() {
            Ok(replicas) => return replicas,
            Err(err) => warn!(
                replica_group = replica_group.metadata.name.as_deref().unwrap_or_default(),
                %annotation,
                "unparseable desired-replicas annotation: {err}"
            ),
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{EntityKind, EntityName};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use k8s_openapi::api::apps::v1::{ReplicaSetCondition, ReplicaSetSpec, ReplicaSetStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use std::collections::BTreeMap;
    use triage_config::TriageConfig;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn replica_set(spec_replicas: Option<i32>, current: i32) -> ReplicaSet {
        let mut rs = ReplicaSet::default();
        rs.metadata.name = Some("web-7d9f".to_string());
        rs.metadata.namespace = Some("default".to_string());
        rs.spec = Some(ReplicaSetSpec {
            replicas: spec_replicas,
            ..ReplicaSetSpec::default()
        });
        rs.status = Some(ReplicaSetStatus {
            replicas: current,
            ..ReplicaSetStatus::default()
        });
        rs
    }

    fn annotate(rs: &mut ReplicaSet, value: &str) {
        let mut annotations = BTreeMap::new();
        annotations.insert(DESIRED_REPLICAS_ANNOTATION.to_string(), value.to_string());
        rs.metadata.annotations = Some(annotations);
    }

    fn failure_condition(secs_ago: i64) -> ReplicaSetCondition {
        ReplicaSetCondition {
            type_: "ReplicaFailure".to_string(),
            status: "False".to_string(),
            reason: Some("FailedCreate".to_string()),
            message: Some("pods \"web-7d9f-\" is forbidden".to_string()),
            last_transition_time: Some(Time(now() - Duration::seconds(secs_ago))),
            ..ReplicaSetCondition::default()
        }
    }

    fn derive(rs: &ReplicaSet) -> EntityState {
        let mut state =
            EntityState::new(EntityName::new("default", EntityKind::ReplicaGroup, "web-7d9f"));
        let config = TriageConfig::default();
        let ctx = DeriveContext::new(&config, now());
        derive_replica_group_status(rs, &mut state, &ctx).unwrap();
        state
    }

    #[test]
    fn satisfied_group_is_healthy() {
        let mut rs = replica_set(Some(3), 3);
        rs.status.as_mut().unwrap().conditions = Some(vec![failure_condition(600)]);
        assert!(derive(&rs).is_healthy());
    }

    #[test]
    fn zero_desired_is_healthy() {
        assert!(derive(&replica_set(Some(0), 0)).is_healthy());
    }

    #[test]
    fn annotation_fallback_with_failure_condition() {
        // spec.replicas unset, desired comes from the controller annotation
        let mut rs = replica_set(None, 1);
        annotate(&mut rs, "3");
        rs.status.as_mut().unwrap().conditions = Some(vec![failure_condition(600)]);

        let state = derive(&rs);
        assert_eq!(
            state.clean_messages(),
            vec!["Failed Create: pods \"web-7d9f-\" is forbidden (last transition: 10m ago)"]
        );
    }

    #[test]
    fn unparseable_annotation_defaults_to_one() {
        let mut rs = replica_set(None, 0);
        annotate(&mut rs, "many");
        rs.status.as_mut().unwrap().conditions = Some(vec![failure_condition(600)]);
        // desired falls back to 1, current 0 < 1: conditions reported
        assert!(!derive(&rs).is_healthy());
    }

    #[test]
    fn unsatisfied_without_conditions_stays_silent() {
        let rs = replica_set(Some(3), 1);
        assert!(derive(&rs).is_healthy());
    }

    #[test]
    fn satisfied_true_conditions_not_reported() {
        let mut rs = replica_set(Some(3), 1);
        let mut cond = failure_condition(600);
        cond.status = "True".to_string();
        rs.status.as_mut().unwrap().conditions = Some(vec![cond]);
        assert!(derive(&rs).is_healthy());
    }
}
