use super::*;

use anyhow::anyhow;
use drift::DriftConfig;
use fleet::FleetPlan;
use tokio::sync::Mutex;

#[derive(Default)]
struct MemorySink {
    records: Mutex<Vec<(String, Vec<u8>)>>,
    fail_topic: Option<String>,
}

#[async_trait]
impl ReadingSink for MemorySink {
    async fn publish(&self, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
        if self.fail_topic.as_deref() == Some(topic) {
            return Err(anyhow!("broker rejected {topic}"));
        }
        self.records
            .lock()
            .await
            .push((topic.to_string(), payload.to_vec()));
        Ok(())
    }
}

async fn two_collector_fleet() -> Fleet {
    let plan = FleetPlan {
        collectors: 2,
        devices_per_collector: vec![2, 1],
    };
    Fleet::build(&plan, DriftConfig::default())
        .await
        .expect("fleet")
}

#[tokio::test(start_paused = true)]
async fn publishes_one_record_per_device() {
    let fleet = two_collector_fleet().await;
    let sink = MemorySink::default();

    let published = publish_fleet(&fleet, &sink).await.expect("publish");
    assert_eq!(published, 3);

    let records = sink.records.lock().await;
    let topics: Vec<_> = records.iter().map(|(topic, _)| topic.as_str()).collect();
    assert_eq!(topics, vec!["/R0/Rig0", "/R0/Rig1", "/R1/Rig0"]);

    let payload: serde_json::Value = serde_json::from_slice(&records[2].1).expect("json");
    assert_eq!(payload["collector_id"], 1);
    assert_eq!(payload["device_id"], 0);
    assert!(payload["readings"]["temperature"].is_f64());
    drop(records);

    fleet.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn sink_failure_names_the_topic() {
    let fleet = two_collector_fleet().await;
    let sink = MemorySink {
        fail_topic: Some("/R0/Rig1".into()),
        ..MemorySink::default()
    };

    let error = publish_fleet(&fleet, &sink).await.expect_err("failure");
    assert!(error.to_string().contains("/R0/Rig1"));
    assert_eq!(sink.records.lock().await.len(), 1);

    fleet.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn publisher_runs_each_interval_until_shutdown() {
    let fleet = two_collector_fleet().await;
    let sink = MemorySink::default();
    let shutdown = CancellationToken::new();

    let stopper = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(10_500)).await;
            shutdown.cancel();
        })
    };
    run_publisher(&fleet, &sink, Duration::from_secs(5), shutdown).await;
    stopper.await.expect("stopper");

    // Cycles at 0 s, 5 s and 10 s.
    assert_eq!(sink.records.lock().await.len(), 9);

    fleet.shutdown().await;
}
