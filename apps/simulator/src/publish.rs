use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use fleet::Fleet;
use shared::protocol::ReadingRecord;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Destination for published reading records. The broker transport lives
/// behind this seam.
#[async_trait]
pub trait ReadingSink: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> anyhow::Result<()>;
}

/// Writes every record to the log.
pub struct LogSink {
    broker_address: String,
}

impl LogSink {
    pub fn new(broker_address: impl Into<String>) -> Self {
        Self {
            broker_address: broker_address.into(),
        }
    }
}

#[async_trait]
impl ReadingSink for LogSink {
    async fn publish(&self, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
        info!(
            broker = %self.broker_address,
            topic,
            payload = %String::from_utf8_lossy(payload),
            "publish: record"
        );
        Ok(())
    }
}

/// Publishes one record per device of every collector. Returns the number of
/// records sent.
pub async fn publish_fleet(fleet: &Fleet, sink: &dyn ReadingSink) -> anyhow::Result<usize> {
    let mut published = 0;
    for collector in fleet.collectors() {
        for (device_id, readings) in collector.readings().await {
            let record = ReadingRecord::new(collector.id(), device_id, readings);
            let topic = record.topic();
            let payload = record
                .payload()
                .with_context(|| format!("failed to encode record for {topic}"))?;
            sink.publish(&topic, &payload)
                .await
                .with_context(|| format!("failed to publish {topic}"))?;
            published += 1;
        }
    }
    Ok(published)
}

/// Publishes immediately and then once per `interval` until `shutdown` fires.
/// A failed cycle is logged and the loop carries on.
pub async fn run_publisher(
    fleet: &Fleet,
    sink: &dyn ReadingSink,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match publish_fleet(fleet, sink).await {
            Ok(published) => debug!(published, "publish: cycle complete"),
            Err(error) => warn!(error = %format!("{error:#}"), "publish: cycle failed"),
        }
    }
    info!("publish: stopped");
}

#[cfg(test)]
#[path = "tests/publish_tests.rs"]
mod tests;
