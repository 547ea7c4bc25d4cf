use drift::{DriftConfig, Lifecycle};
use fleet::{Fleet, FleetPlan};
use shared::domain::{CollectorId, DeviceId};

#[tokio::test(start_paused = true)]
async fn fleet_builds_from_plan_and_shuts_down_every_device() {
    let plan = FleetPlan {
        collectors: 3,
        devices_per_collector: vec![2, 0],
    };
    let fleet = Fleet::build(&plan, DriftConfig::default())
        .await
        .expect("fleet");

    let ids: Vec<_> = fleet.collectors().iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec![CollectorId(0), CollectorId(1), CollectorId(2)]);

    let counts = [
        fleet.collectors()[0].device_ids().await.len(),
        fleet.collectors()[1].device_ids().await.len(),
        fleet.collectors()[2].device_ids().await.len(),
    ];
    assert_eq!(counts, [2, 0, 1]);

    let first = fleet
        .collector(CollectorId(0))
        .expect("collector")
        .device(DeviceId(1))
        .await
        .expect("device");
    assert_eq!(first.lifecycle(), Lifecycle::Running);

    fleet.shutdown().await;
    for collector in fleet.collectors() {
        for device_id in collector.device_ids().await {
            let device = collector.device(device_id).await.expect("device");
            assert_eq!(device.lifecycle(), Lifecycle::Stopped);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn stopped_collector_restarts_without_rerandomizing() {
    let mut fleet = Fleet::new(DriftConfig::default());
    let collector_id = fleet.add_collector(2).await.expect("collector");
    let collector = fleet.collector(collector_id).expect("collector");

    collector.stop_all().await;
    let before = collector.readings().await;

    tokio::time::sleep(std::time::Duration::from_secs(3)).await;
    assert_eq!(collector.readings().await, before);

    collector.start_all().await;
    assert_eq!(collector.readings().await, before);
    for device_id in collector.device_ids().await {
        let device = collector.device(device_id).await.expect("device");
        assert_eq!(device.generation(), 2);
        assert_eq!(device.lifecycle(), Lifecycle::Running);
    }

    fleet.shutdown().await;
}
