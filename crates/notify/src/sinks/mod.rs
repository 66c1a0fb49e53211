//! Sink implementations.

pub mod json;
pub mod text;
pub mod webhook;
pub mod yaml;

use async_trait::async_trait;

use crate::error::SinkError;
use diagnose::ClusterAlerts;

/// Trait for alert sinks (stdout renderers, webhook, ...).
#[async_trait]
pub trait Sink: Send + Sync {
    /// Get the name of this sink.
    fn name(&self) -> &'static str;

    /// Render or ship one pass's grouped alerts.
    async fn report(&self, alerts: &ClusterAlerts) -> Result<(), SinkError>;
}
