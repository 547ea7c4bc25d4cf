use super::*;

#[test]
fn allocator_issues_increasing_ids_until_exhausted() {
    let mut ids = IdAllocator::new();
    for expected in 0..=u8::MAX {
        assert_eq!(ids.allocate().expect("id"), expected);
    }
    assert_eq!(ids.issued(), IdAllocator::CAPACITY);
    assert_eq!(ids.allocate(), Err(SimError::IdsExhausted(256)));
}

#[test]
fn plan_falls_back_to_default_device_count() {
    let plan = FleetPlan {
        collectors: 3,
        devices_per_collector: vec![4],
    };
    assert_eq!(plan.devices_for(0), 4);
    assert_eq!(plan.devices_for(1), DEFAULT_DEVICES_PER_COLLECTOR);
    assert_eq!(plan.devices_for(2), DEFAULT_DEVICES_PER_COLLECTOR);
}

#[tokio::test(start_paused = true)]
async fn removed_ids_are_never_reused() {
    let collector = Collector::new(CollectorId(0), DriftConfig::default());
    let first = collector.add_device().await.expect("first");
    let second = collector.add_device().await.expect("second");
    assert_eq!((first, second), (DeviceId(0), DeviceId(1)));

    collector.remove_device(second).await.expect("remove");
    let third = collector.add_device().await.expect("third");
    assert_eq!(third, DeviceId(2));
    assert_eq!(collector.device_ids().await, vec![DeviceId(0), DeviceId(2)]);
    assert_eq!(collector.issued_ids().await, 3);

    collector.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn removing_a_device_stops_it() {
    let collector = Collector::new(CollectorId(1), DriftConfig::default());
    let device_id = collector.add_device().await.expect("add");
    let device = collector.device(device_id).await.expect("device");

    collector.remove_device(device_id).await.expect("remove");
    assert_eq!(device.lifecycle(), Lifecycle::Stopped);
    assert!(collector.device(device_id).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn unknown_device_operations_fail() {
    let collector = Collector::new(CollectorId(2), DriftConfig::default());
    assert_eq!(
        collector.remove_device(DeviceId(9)).await,
        Err(SimError::UnknownDevice(DeviceId(9)))
    );
    assert_eq!(
        collector
            .set_targets(DeviceId(9), SensorReadings::default())
            .await,
        Err(SimError::UnknownDevice(DeviceId(9)))
    );
}

#[tokio::test(start_paused = true)]
async fn readings_cover_every_device_in_id_order() {
    let collector = Collector::new(CollectorId(3), DriftConfig::default());
    for _ in 0..4 {
        collector.add_device().await.expect("add");
    }

    let readings = collector.readings().await;
    let ids: Vec<_> = readings.iter().map(|(device_id, _)| *device_id).collect();
    assert_eq!(ids, vec![DeviceId(0), DeviceId(1), DeviceId(2), DeviceId(3)]);
    for (_, reading) in &readings {
        for (kind, value) in reading.iter() {
            assert!(kind.range().contains(value));
        }
    }

    collector.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn set_targets_reaches_the_device() {
    let collector = Collector::new(CollectorId(4), DriftConfig::default());
    let device_id = collector.add_device().await.expect("add");
    let targets = SensorReadings {
        temperature: 22.0,
        humidity: 40.0,
        ph: 6.5,
        water_level: 4.0,
        light_intensity: 75.0,
    };

    collector
        .set_targets(device_id, targets)
        .await
        .expect("set targets");
    let device = collector.device(device_id).await.expect("device");
    assert_eq!(device.targets(), targets);

    collector.stop_all().await;
}

#[tokio::test(start_paused = true)]
async fn fleet_rejects_unreachable_quorum() {
    let plan = FleetPlan {
        collectors: 1,
        devices_per_collector: vec![1],
    };
    let config = DriftConfig {
        convergence_quorum: 0,
        ..DriftConfig::default()
    };
    assert_eq!(
        Fleet::build(&plan, config).await.err().map(|error| error.code()),
        Some(shared::error::ErrorCode::Validation)
    );
}
