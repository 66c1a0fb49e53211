//! JSON rendering to stdout.

use async_trait::async_trait;

use super::Sink;
use crate::error::SinkError;
use diagnose::ClusterAlerts;

pub struct JsonSink;

#[async_trait]
impl Sink for JsonSink {
    fn name(&self) -> &'static str {
        "json"
    }

    async fn report(&self, alerts: &ClusterAlerts) -> Result<(), SinkError> {
        println!("{}", serde_json::to_string_pretty(alerts)?);
        Ok(())
    }
}
