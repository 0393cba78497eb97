//! MQTT session management and telemetry publishing.

use std::time::Duration;

use aquasight_common::TelemetryRecord;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::MqttConfig;

/// Error type for publish operations.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Publish failed: {0}")]
    Client(#[from] rumqttc::ClientError),
}

/// Publisher owning one MQTT session and a fixed topic.
///
/// The session is driven by a background event-loop task. A lost broker
/// connection is redialed there with exponential backoff, so a publish
/// issued while the session is down is reported to the caller as a failure
/// instead of blocking the polling cycle.
pub struct MqttPublisher {
    client: AsyncClient,
    topic: String,
    event_loop: JoinHandle<()>,
}

impl MqttPublisher {
    /// Open an MQTT session for one site.
    ///
    /// The connection is established asynchronously by the event-loop task;
    /// an unreachable broker surfaces there as warnings and redialing, not
    /// as an error here.
    pub fn connect(config: &MqttConfig, client_id: &str, topic: String) -> Self {
        let mut options = MqttOptions::new(client_id, config.host.as_str(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(true);

        let (client, mut event_loop) = AsyncClient::new(options, 10);

        let id = client_id.to_string();
        let handle = tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);
            loop {
                match event_loop.poll().await {
                    Ok(event) => {
                        trace!(client = %id, event = ?event, "MQTT event");
                        backoff = Duration::from_secs(1);
                    }
                    Err(e) => {
                        warn!(
                            client = %id,
                            error = %e,
                            "MQTT connection error, redialing in {:?}",
                            backoff
                        );
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(Duration::from_secs(60));
                    }
                }
            }
        });

        Self {
            client,
            topic,
            event_loop: handle,
        }
    }

    /// The topic this publisher sends to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish one telemetry record as JSON at QoS 0, non-retained.
    pub async fn publish(&self, record: &TelemetryRecord) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(record)?;
        self.client
            .publish(self.topic.as_str(), QoS::AtMostOnce, false, payload)
            .await?;
        Ok(())
    }

    /// Disconnect and stop the event-loop task.
    pub async fn shutdown(self) {
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "MQTT disconnect failed");
        }
        self.event_loop.abort();
    }
}
