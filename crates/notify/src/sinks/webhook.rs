//! HTTP webhook delivery.

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use super::Sink;
use crate::error::SinkError;
use diagnose::ClusterAlerts;

pub struct WebhookSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    /// Create a webhook sink posting to `url`.
    ///
    /// # Panics
    /// Panics only if the TLS backend cannot initialize, which is a
    /// build-environment defect.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client"),
        }
    }
}

#[async_trait]
impl Sink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn report(&self, alerts: &ClusterAlerts) -> Result<(), SinkError> {
        let response = self.client.post(&self.url).json(alerts).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        info!(url = %self.url, "alerts delivered");
        Ok(())
    }
}
