//! Pod health derivation.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use k8s_openapi::api::core::v1::{ContainerStatus, Pod};
use tracing::warn;

use super::DeriveContext;
use crate::client::ClusterClient;
use crate::markup::wrap_temporal;
use crate::state::EntityState;
use crate::units::{format_duration, humanize_units, reason_as_words};

const PHASE_RUNNING: &str = "Running";
const PHASE_PENDING: &str = "Pending";
const PHASE_SUCCEEDED: &str = "Succeeded";
const REASON_COMPLETED: &str = "Completed";
const REASON_CREATING: &str = "ContainerCreating";
const REASON_INITIALIZING: &str = "PodInitializing";

/// Waiting reasons that never produce a direct message: crash loops are
/// covered by the restart analysis, the creating/initializing pair is
/// batched after the scan.
const IGNORED_WAITING_REASONS: &[&str] = &[
    "CrashLoopBackOff",
    REASON_COMPLETED,
    REASON_CREATING,
    REASON_INITIALIZING,
];

/// Derive problem messages for one pod into its accumulator.
///
/// # Errors
/// Only a pod without a name errors; log-fetch failures degrade to an
/// omitted capture.
pub async fn derive_pod_status(
    pod: &Pod,
    state: &mut EntityState,
    client: &dyn ClusterClient,
    ctx: &DeriveContext<'_>,
) -> Result<()> {
    let Some(status) = pod.status.as_ref() else {
        return Ok(());
    };
    let phase = status.phase.as_deref().unwrap_or("Unknown");
    if phase == PHASE_SUCCEEDED {
        return Ok(());
    }

    let meta = PodMeta {
        namespace: pod.metadata.namespace.as_deref().unwrap_or_default(),
        name: pod
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("pod without a name"))?,
        created: pod.metadata.creation_timestamp.as_ref().map(|t| t.0),
        started: status.start_time.as_ref().map(|t| t.0),
    };
    state.created_timestamp = meta.created;
    if let Some(node) = pod.spec.as_ref().and_then(|s| s.node_name.clone()) {
        state.node = node;
    }

    // Young pods get the benefit of the doubt across the board.
    let reference = meta.started.or(meta.created);
    let creation_grace = seconds(ctx.config.pod_creation_grace_period_seconds);
    if let Some(reference) = reference {
        if ctx.now - reference < creation_grace {
            return Ok(());
        }
    }

    if let Some(reason) = status.reason.as_deref().filter(|r| !r.is_empty()) {
        // Eviction and friends: the API message carries raw byte quantities.
        let detail = humanize_units(status.message.as_deref().unwrap_or_default());
        state.append_message(
            meta.created,
            format!(
                "Pod is in {phase} phase due to {reason}: {}",
                wrap_temporal(detail.trim())
            ),
        );
    } else if let Some(deleted) = pod.metadata.deletion_timestamp.as_ref().map(|t| t.0) {
        let pod_grace = pod
            .spec
            .as_ref()
            .and_then(|s| s.termination_grace_period_seconds);
        let effective =
            pod_grace.map_or_else(|| seconds(ctx.config.pod_termination_grace_period_seconds), Duration::seconds);
        if ctx.now - deleted > effective {
            let mut message = format!(
                "Pod is Terminating since {} ago",
                wrap_temporal(format_duration(ctx.now - deleted))
            );
            if let Some(grace) = pod_grace {
                message.push_str(&format!(" (deletion grace is {grace} sec)"));
            }
            state.append_message(Some(deleted), message);
        }
    } else if phase != PHASE_RUNNING && phase != PHASE_PENDING {
        state.append_message(meta.created, format!("Pod is in {phase} phase"));
    }

    let starting_grace_elapsed = reference
        .is_some_and(|r| ctx.now - r > seconds(ctx.config.pod_starting_grace_period_seconds));

    let empty = Vec::new();
    let init_statuses = status.init_container_statuses.as_ref().unwrap_or(&empty);
    let container_statuses = status.container_statuses.as_ref().unwrap_or(&empty);

    let mut scan = ContainerScan::default();
    let init_healthy = scan_containers(
        &meta,
        init_statuses,
        true,
        starting_grace_elapsed,
        state,
        client,
        ctx,
        &mut scan,
    )
    .await;
    if init_healthy {
        scan_containers(
            &meta,
            container_statuses,
            false,
            starting_grace_elapsed,
            state,
            client,
            ctx,
            &mut scan,
        )
        .await;
    }
    let run_problem = scan.run_problem;
    scan.report_pending(state, reference, ctx);

    if phase != PHASE_RUNNING && !run_problem && state.is_healthy() {
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
        if state.is_healthy() && (phase != PHASE_PENDING || starting_grace_elapsed) {
            match reference {
                Some(reference) => state.append_message(
                    Some(reference),
                    format!(
                        "Pod is in {phase} phase (since {} ago)",
                        wrap_temporal(format_duration(ctx.now - reference))
                    ),
                ),
                None => state.append_message(None, format!("Pod is in {phase} phase")),
            }
        }
    }

    Ok(())
}

struct PodMeta<'a> {
    namespace: &'a str,
    name: &'a str,
    created: Option<DateTime<Utc>>,
    started: Option<DateTime<Utc>>,
}

/// Containers stuck in creation/initialization, reported once per pod after
/// the scan, sorted and joined.
#[derive(Default)]
struct ContainerScan {
    run_problem: bool,
    creating: Vec<String>,
    initializing: Vec<String>,
}

impl ContainerScan {
    fn report_pending(
        self,
        state: &mut EntityState,
        reference: Option<DateTime<Utc>>,
        ctx: &DeriveContext<'_>,
    ) {
        for (mut names, verb) in [(self.creating, "creating"), (self.initializing, "initializing")] {
            if names.is_empty() {
                continue;
            }
            names.sort();
            let head = if names.len() == 1 {
                "One container is".to_string()
            } else {
                format!("{} containers are", names.len())
            };
            let since =
                reference.map_or_else(|| "0s".to_string(), |r| format_duration(ctx.now - r));
            state.append_message(
                reference,
                format!(
                    "{head} still {verb} [ {} ] (since {})",
                    names.join(", "),
                    wrap_temporal(since)
                ),
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn scan_containers(
    meta: &PodMeta<'_>,
    statuses: &[ContainerStatus],
    init: bool,
    starting_grace_elapsed: bool,
    state: &mut EntityState,
    client: &dyn ClusterClient,
    ctx: &DeriveContext<'_>,
    scan: &mut ContainerScan,
) -> bool {
    let mut all_healthy = true;

    for cs in statuses {
        let mut triggered = false;

        if let Some(terminated) = cs.state.as_ref().and_then(|s| s.terminated.as_ref()) {
            if terminated.reason.as_deref().unwrap_or_default() != REASON_COMPLETED {
                all_healthy = false;
                scan.run_problem = true;
                if let Some(finished) = terminated.finished_at.as_ref().map(|t| t.0) {
                    if ctx.now - finished
                        > seconds(ctx.config.pod_termination_grace_period_seconds)
                    {
                        let reason = terminated.reason.as_deref().unwrap_or("Unknown");
                        let mut line = format!("{} terminated due to {reason}", cs.name);
                        let detail =
                            humanize_units(terminated.message.as_deref().unwrap_or_default());
                        let detail = detail.trim();
                        if !detail.is_empty() {
                            line.push_str(&format!(": {detail}"));
                        }
                        line.push_str(&format!(
                            " (exit code {}, {} ago)",
                            terminated.exit_code,
                            wrap_temporal(format_duration(ctx.now - finished))
                        ));
                        state.append_message(Some(finished), line);
                        triggered = true;
                    }
                }
            }
        } else if let Some(waiting) = cs.state.as_ref().and_then(|s| s.waiting.as_ref()) {
            let reason = waiting.reason.as_deref().unwrap_or_default();
            match reason {
                REASON_CREATING if starting_grace_elapsed => scan.creating.push(cs.name.clone()),
                REASON_INITIALIZING if starting_grace_elapsed => {
                    scan.initializing.push(cs.name.clone());
                }
                r if r.is_empty() || IGNORED_WAITING_REASONS.contains(&r) => {}
                _ => {
                    all_healthy = false;
                    scan.run_problem = true;
                    let detail = humanize_units(waiting.message.as_deref().unwrap_or_default());
                    state.append_message(
                        meta.created,
                        format!(
                            "{} still waiting due to {reason}: {}",
                            cs.name,
                            detail.trim()
                        ),
                    );
                    triggered = true;
                }
            }
        }

        if cs.restart_count > ctx.config.pod_restart_grace_count {
            let problem = last_termination_time(cs);
            // Init containers restart by design during rollout; only count
            // them when the pod already has other problems.
            let relevant = !init || !state.is_healthy();
            if relevant && is_excessive_restart(meta.created, meta.started, problem, ctx.now) {
                all_healthy = false;
                scan.run_problem = true;
                let mut line = format!(
                    "{} restarted {} times",
                    cs.name,
                    wrap_temporal(cs.restart_count)
                );
                if let Some(term) = cs.last_state.as_ref().and_then(|s| s.terminated.as_ref()) {
                    let reason = term.reason.as_deref().unwrap_or("Unknown");
                    line.push_str(&format!(", last termination due to {reason}"));
                    let detail = humanize_units(term.message.as_deref().unwrap_or_default());
                    let detail = detail.trim();
                    if !detail.is_empty() {
                        line.push_str(&format!(": {detail}"));
                    }
                }
                state.append_message(problem, line);
                triggered = true;
            }
        }

        if triggered {
            capture_logs(meta, &cs.name, state, client).await;
        }
    }

    all_healthy
}

/// Whether a restart-heavy container is still flapping, as opposed to
/// having crashed once long ago and recovered.
///
/// A problem period under a second means the snapshot caught the pod
/// mid-start; suppress. A healthy period under a minute is an active crash
/// loop. Otherwise compare total observed lifetime against the time it
/// took the problem to first appear: a small ratio means the problem is
/// recent relative to the pod's life.
fn is_excessive_restart(
    created: Option<DateTime<Utc>>,
    started: Option<DateTime<Utc>>,
    problem: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    let (Some(created), Some(problem)) = (created, problem) else {
        return false;
    };
    let problem_period = problem - created;
    if problem_period < Duration::seconds(1) {
        return false;
    }
    if now - problem < Duration::minutes(1) {
        return true;
    }
    let total = now - started.unwrap_or(created);
    let ratio =
        total.num_milliseconds() as f64 / problem_period.num_milliseconds() as f64;
    ratio < 5.0
}

fn last_termination_time(cs: &ContainerStatus) -> Option<DateTime<Utc>> {
    cs.last_state
        .as_ref()
        .and_then(|s| s.terminated.as_ref())
        .or_else(|| cs.state.as_ref().and_then(|s| s.terminated.as_ref()))
        .and_then(|t| t.finished_at.as_ref())
        .map(|t| t.0)
}

async fn capture_logs(
    meta: &PodMeta<'_>,
    container: &str,
    state: &mut EntityState,
    client: &dyn ClusterClient,
) {
    match client.container_logs(meta.namespace, meta.name, container).await {
        Ok(logs) if !logs.trim().is_empty() => {
            state.logs_collections.insert(container.to_string(), logs);
        }
        Ok(_) => {}
        Err(err) => warn!(
            pod = meta.name,
            container, "failed to fetch container logs: {err:#}"
        ),
    }
}

fn seconds(value: u64) -> Duration {
    Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}
