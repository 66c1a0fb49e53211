//! Node health derivation: condition polarity plus resource headroom.

use anyhow::Result;
use chrono::Duration;
use k8s_openapi::api::core::v1::Node;

use super::DeriveContext;
use crate::markup::wrap_temporal;
use crate::state::EntityState;
use crate::units::{format_bytes, format_duration, humanize_units, parse_quantity, reason_as_words};

/// Conditions flapping faster than this are kubelet noise.
fn condition_debounce() -> Duration {
    Duration::minutes(1)
}

/// Resources checked for headroom, with their display names. CPU is
/// rendered in cores, the rest in bytes.
const CHECKED_RESOURCES: &[(&str, &str)] =
    &[("cpu", "CPU"), ("memory", "Memory"), ("ephemeral-storage", "EphemeralStorage")];

/// Derive problem messages for one node into its accumulator.
///
/// "Ready" is the one condition that is healthy when true; every other
/// condition type (pressure, unavailability) is healthy when false.
///
/// # Errors
/// Currently infallible; the signature matches the other derivations so
/// the orchestrator can aggregate uniformly.
pub fn derive_node_status(node: &Node, state: &mut EntityState, ctx: &DeriveContext<'_>) -> Result<()> {
    state.created_timestamp = node.metadata.creation_timestamp.as_ref().map(|t| t.0);
    let Some(status) = node.status.as_ref() else {
        return Ok(());
    };

    for condition in status.conditions.iter().flatten() {
        let healthy = if condition.type_ == "Ready" {
            condition.status == "True"
        } else {
            condition.status == "False"
        };
        if healthy {
            continue;
        }
        let transition = condition.last_transition_time.as_ref().map(|t| t.0);
        if let Some(transition) = transition {
            if ctx.now - transition < condition_debounce() {
                continue;
            }
        }
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

    if state.is_healthy() || ctx.config.force_check_node_resources {
        let (Some(allocatable), Some(capacity)) =
            (status.allocatable.as_ref(), status.capacity.as_ref())
        else {
            return Ok(());
        };
        for (resource, display) in CHECKED_RESOURCES {
            let Some(alloc) = allocatable.get(*resource).and_then(|q| parse_quantity(&q.0)) else {
                continue;
            };
            let Some(cap) = capacity.get(*resource).and_then(|q| parse_quantity(&q.0)) else {
                continue;
            };
            if cap <= 0.0 {
                continue;
            }
            let used_ratio = 1.0 - alloc / cap;
            // the boundary itself does not trigger
            if used_ratio <= ctx.config.node_resource_usage_threshold {
                continue;
            }
            let render = |v: f64| {
                if *resource == "cpu" {
                    format!("{v:.2}")
                } else {
                    format_bytes(v)
                }
            };
            state.append_message(
                None,
                format!(
                    "Excessive usage of {display}: {}",
                    wrap_temporal(format!(
                        "{}/{} ({}% usage)",
                        render(alloc),
                        render(cap),
                        (used_ratio * 100.0).round() as i64
                    ))
                ),
            );
        }
    }

    Ok(())
}
