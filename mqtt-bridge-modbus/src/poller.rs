//! Per-site polling and telemetry publishing.

use std::time::Duration;

use aquasight_common::{Measurement, TelemetryRecord, round2};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::{FieldConfig, SiteConfig};
use crate::decode::read_float32;
use crate::link::RegisterSource;
use crate::publisher::{MqttPublisher, PublishError};

/// A poller for a single site profile.
///
/// Owns the site's register source and MQTT session exclusively; when more
/// than one site is configured, each runs as an independent task sharing
/// no state with the others.
pub struct SitePoller<S> {
    site: SiteConfig,
    link: S,
    publisher: MqttPublisher,
}

impl<S: RegisterSource> SitePoller<S> {
    /// Create a new poller for a site.
    pub fn new(site: SiteConfig, link: S, publisher: MqttPublisher) -> Self {
        Self {
            site,
            link,
            publisher,
        }
    }

    /// Run the polling loop until the shutdown signal fires.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.site.poll_interval_secs);
        let site_id = self.site.id.clone();

        info!(
            site = %site_id,
            interval_secs = self.site.poll_interval_secs,
            topic = %self.publisher.topic(),
            "Starting site poller"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            // No error terminates the loop; a failed cycle is logged and the
            // next one starts after the normal interval.
            match self.poll_once().await {
                Ok(()) => debug!(site = %site_id, "Cycle complete"),
                Err(e) => error!(site = %site_id, error = %e, "Polling cycle failed"),
            }

            // Interval measured from the end of the cycle; slow reads shift
            // the schedule rather than piling up.
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {}
            }
        }

        self.publisher.shutdown().await;
        info!(site = %site_id, "Site poller stopped");
    }

    /// Perform one complete cycle: read every field, build one record,
    /// attempt one publish.
    ///
    /// A failed publish is not retried; the record is simply lost and the
    /// next cycle starts from scratch after the normal interval.
    async fn poll_once(&mut self) -> Result<(), PublishError> {
        let measurements =
            collect_measurements(&mut self.link, &self.site.id, &self.site.fields).await;
        let record = TelemetryRecord::new(measurements);

        self.publisher.publish(&record).await?;

        info!(
            site = %self.site.id,
            topic = %self.publisher.topic(),
            timestamp = %record.timestamp,
            "Published telemetry record"
        );

        Ok(())
    }
}

/// Read every field of a site profile in order.
///
/// A failed read degrades that field to unavailable and the remaining
/// fields are still attempted, so one cycle always yields the full field
/// set of the profile.
pub async fn collect_measurements<S: RegisterSource>(
    source: &mut S,
    site: &str,
    fields: &[FieldConfig],
) -> Vec<Measurement> {
    let mut measurements = Vec::with_capacity(fields.len());

    for field in fields {
        match read_float32(source, field.address).await {
            Ok(value) => {
                debug!(
                    site = %site,
                    field = %field.name,
                    address = field.address,
                    value,
                    "Read field"
                );
                measurements.push(Measurement::available(
                    field.name.clone(),
                    round2(f64::from(value)),
                ));
            }
            Err(e) => {
                warn!(
                    site = %site,
                    field = %field.name,
                    address = field.address,
                    error = %e,
                    "Failed to read field"
                );
                measurements.push(Measurement::unavailable(field.name.clone()));
            }
        }
    }

    measurements
}
