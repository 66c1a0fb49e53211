//! YAML rendering to stdout.

use async_trait::async_trait;

use super::Sink;
use crate::error::SinkError;
use diagnose::ClusterAlerts;

pub struct YamlSink;

#[async_trait]
impl Sink for YamlSink {
    fn name(&self) -> &'static str {
        "yaml"
    }

    async fn report(&self, alerts: &ClusterAlerts) -> Result<(), SinkError> {
        print!("{}", serde_yaml::to_string(alerts)?);
        Ok(())
    }
}
