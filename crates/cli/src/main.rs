//! triage: one diagnostic pass over a Kubernetes cluster.
//!
//! Lists namespaces, pods, replica sets, nodes, and events, derives
//! problem messages per entity, filters them through the persisted dedup
//! store, and hands surviving alerts to the selected sink. Partial fetch
//! failures are logged and the pass continues; only a corrupt store or a
//! failed flush aborts.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use client::KubeClusterClient;
use diagnose::{ClusterAlerts, DedupStore, Diagnostician};
use notify::{JsonSink, Sink, TextSink, WebhookSink, YamlSink};
use triage_config::TriageConfig;

/// One-shot Kubernetes health diagnosis with deduplicated alerts
#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "One-shot Kubernetes health diagnosis with deduplicated alerts")]
#[command(version)]
struct Cli {
    /// Path to the config file (YAML or JSON); defaults apply if absent
    #[arg(long, default_value = "triage.yaml")]
    config: PathBuf,

    /// Cluster name override (defaults to the kubeconfig context)
    #[arg(long)]
    cluster_name: Option<String>,

    /// Namespaces to diagnose (comma separated; default all)
    #[arg(long, value_delimiter = ',')]
    namespaces: Vec<String>,

    /// Namespaces to skip
    #[arg(long, value_delimiter = ',')]
    exclude_namespaces: Vec<String>,

    /// Output format
    #[arg(long, default_value = "text")]
    output: OutputFormat,

    /// Additionally POST the alerts as JSON to this URL
    #[arg(long)]
    webhook_url: Option<String>,

    /// Dedup store file path
    #[arg(long)]
    store_file: Option<PathBuf>,

    /// Dedup window in minutes (0 = dedup forever)
    #[arg(long)]
    dedup_minutes: Option<i64>,

    /// Check node resources even on nodes with failing conditions
    #[arg(long)]
    force_check_node_resources: bool,

    /// Kubernetes request timeout in seconds
    #[arg(long, default_value = "30")]
    request_timeout_seconds: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
}

fn merge(config: &mut TriageConfig, cli: &Cli) {
    if cli.cluster_name.is_some() {
        config.cluster_name.clone_from(&cli.cluster_name);
    }
    if !cli.namespaces.is_empty() {
        config.namespaces.clone_from(&cli.namespaces);
    }
    if !cli.exclude_namespaces.is_empty() {
        config.namespaces_deny_list.clone_from(&cli.exclude_namespaces);
    }
    if let Some(store_file) = &cli.store_file {
        config.store_file.clone_from(store_file);
    }
    if let Some(minutes) = cli.dedup_minutes {
        config.messages_deduplication_minutes = minutes;
    }
    if cli.force_check_node_resources {
        config.force_check_node_resources = true;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let mut config = TriageConfig::load_or_default(&cli.config)?;
    merge(&mut config, &cli);

    let now = Utc::now();
    // corrupt store: stop before producing possibly-inconsistent alerts
    let mut store = DedupStore::load(
        &config.store_file,
        Duration::minutes(config.messages_deduplication_minutes),
        now,
    )
    .context("loading dedup store")?;

    let kube = KubeClusterClient::connect(
        config.cluster_name.clone(),
        Some(std::time::Duration::from_secs(cli.request_timeout_seconds)),
        config.log_tail_lines,
    )
    .await?;

    let outcome = Diagnostician::new(&kube, &config).run(&mut store, now).await;
    for err in &outcome.errors {
        error!("diagnosis error: {err:#}");
    }

    if outcome.alerts.is_empty() {
        info!("no unreported problems found");
    } else {
        let mut grouped = ClusterAlerts::new();
        for alert in outcome.alerts {
            grouped.entry(alert.cluster_name.clone()).or_default().push(alert);
        }

        let mut sinks: Vec<Box<dyn Sink>> = vec![match cli.output {
            OutputFormat::Text => Box::new(TextSink),
            OutputFormat::Json => Box::new(JsonSink),
            OutputFormat::Yaml => Box::new(YamlSink),
        }];
        if let Some(url) = &cli.webhook_url {
            sinks.push(Box::new(WebhookSink::new(url.clone())));
        }
        for sink in &sinks {
            sink.report(&grouped)
                .await
                .with_context(|| format!("reporting through {} sink", sink.name()))?;
        }
    }

    store.flush().context("flushing dedup store")?;
    Ok(())
}
