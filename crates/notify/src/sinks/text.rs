//! Human-readable stdout rendering.

use async_trait::async_trait;
use std::io::Write;

use super::Sink;
use crate::error::SinkError;
use diagnose::{ClusterAlerts, EntityAlert};

pub struct TextSink;

impl TextSink {
    fn render(alert: &EntityAlert, out: &mut impl Write) -> Result<(), SinkError> {
        let scope = if alert.namespace.is_empty() {
            alert.name.clone()
        } else {
            format!("{}/{}", alert.namespace, alert.name)
        };
        writeln!(
            out,
            "[{}] {} {}{}",
            alert.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            alert.kind,
            scope,
            if alert.node.is_empty() {
                String::new()
            } else {
                format!(" (node {})", alert.node)
            }
        )?;
        for message in &alert.messages {
            writeln!(out, "  - {message}")?;
        }
        for event in &alert.events {
            writeln!(out, "  * {event}")?;
        }
        for (container, logs) in &alert.logs_by_container_name {
            writeln!(out, "  logs [{container}]:")?;
            for line in logs.lines() {
                writeln!(out, "    {line}")?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Sink for TextSink {
    fn name(&self) -> &'static str {
        "text"
    }

    async fn report(&self, alerts: &ClusterAlerts) -> Result<(), SinkError> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for (cluster, cluster_alerts) in alerts {
            writeln!(out, "cluster {cluster}: {} alert(s)", cluster_alerts.len())?;
            for alert in cluster_alerts {
                Self::render(alert, &mut out)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    #[test]
    fn renders_alert_with_messages_and_logs() {
        let alert = EntityAlert {
            cluster_name: "prod".to_string(),
            namespace: "default".to_string(),
            name: "web-0".to_string(),
            kind: "Pod".to_string(),
            node: "node-a".to_string(),
            messages: vec!["app still waiting due to ImagePullBackOff: nope".to_string()],
            events: vec!["Event by kubelet: BackOff".to_string()],
            logs_by_container_name: BTreeMap::from([("app".to_string(), "line1\nline2".to_string())]),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };

        let mut buf = Vec::new();
        TextSink::render(&alert, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Pod default/web-0 (node node-a)"));
        assert!(text.contains("  - app still waiting due to ImagePullBackOff: nope"));
        assert!(text.contains("  * Event by kubelet: BackOff"));
        assert!(text.contains("  logs [app]:"));
        assert!(text.contains("    line2"));
    }
}
