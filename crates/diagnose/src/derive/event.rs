//! Cluster event filtering and message assembly.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Event;

use super::DeriveContext;
use crate::markup::wrap_temporal;
use crate::state::{EntityKind, EntityName, EventState};
use crate::units::format_duration;

/// Routine component-start and sysctl chatter, never worth an alert.
const NOISE_REASONS: &[&str] = &[
    "NodeSysctlChange",
    "ContainerdStart",
    "DockerStart",
    "KubeletStart",
];

/// Kubelet re-sync notices end with this; the condition they echo is
/// already covered by node derivation.
const BENIGN_REAPPLY_SUFFIX: &str = "will be re-applied";

/// Evaluate one raw event. Healthy noise yields a state with an empty
/// message; anything else gets the full assembled message.
#[must_use]
pub fn derive_event_state(event: &Event, ctx: &DeriveContext<'_>) -> EventState {
    let involved = &event.involved_object;
    let name = EntityName::new(
        involved.namespace.clone().unwrap_or_default(),
        EntityKind::from_object_kind(involved.kind.as_deref().unwrap_or_default()),
        involved.name.clone().unwrap_or_default(),
    );

    let reason = event.reason.as_deref().unwrap_or_default();
    let message = event.message.as_deref().unwrap_or_default();
    if event.type_.as_deref() == Some("Normal")
        || NOISE_REASONS.contains(&reason)
        || (reason == "NodeNotReady" && message.trim() == "Node is not ready")
        || message.trim_end().ends_with(BENIGN_REAPPLY_SUFFIX)
    {
        return EventState::healthy(name);
    }

    let first = event
        .first_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.event_time.as_ref().map(|t| t.0));
    let (count, last) = occurrence(event);

    let source = event
        .source
        .as_ref()
        .and_then(|s| s.component.as_deref())
        .or(event.reporting_component.as_deref())
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown");

    let mut head = format!("Event by {source}: {reason} ");
    if count > 1 {
        head.push_str(&format!("x{} ", wrap_temporal(count)));
    }
    match first {
        Some(first) => head.push_str(&format!(
            "since {}, {} ago",
            wrap_temporal(first.format(&ctx.config.time_format)),
            wrap_temporal(format_duration(ctx.now - first))
        )),
        None => head.push_str("since an unknown time"),
    }
    if count > 1 {
        if let Some(last) = last {
            head.push_str(&format!(
                " (last seen {} ago)",
                wrap_temporal(format_duration(ctx.now - last))
            ));
        }
    }
    head.push(':');

    let body: Vec<&str> = message
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    EventState {
        name,
        message: format!("{head}\n\t{}", body.join("\n\t")),
        first_timestamp: first,
        last_timestamp: last.or(first),
    }
}

/// Occurrence count and last-seen time: the series aggregation when
/// present, the legacy count/lastTimestamp pair otherwise, a single
/// occurrence as the final fallback.
fn occurrence(event: &Event) -> (i32, Option<DateTime<Utc>>) {
    if let Some(series) = event.series.as_ref() {
        if let Some(count) = series.count {
            return (
                count,
                series.last_observed_time.as_ref().map(|t| t.0),
            );
        }
    }
    if let Some(count) = event.count {
        return (count, event.last_timestamp.as_ref().map(|t| t.0));
    }
    (1, event.last_timestamp.as_ref().map(|t| t.0))
}
