use std::{collections::BTreeMap, sync::Arc};

use drift::{DeviceController, DriftConfig, Lifecycle};
use shared::{
    domain::{CollectorId, DeviceId, SensorReadings},
    error::SimError,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const DEFAULT_DEVICES_PER_COLLECTOR: usize = 1;

/// Hands out `u8` ids in increasing order. Ids are never reused, even after
/// the holder has been removed.
#[derive(Debug, Default)]
pub struct IdAllocator {
    issued: usize,
}

impl IdAllocator {
    pub const CAPACITY: usize = u8::MAX as usize + 1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> Result<u8, SimError> {
        let id = u8::try_from(self.issued).map_err(|_| SimError::IdsExhausted(Self::CAPACITY))?;
        self.issued += 1;
        Ok(id)
    }

    pub fn issued(&self) -> usize {
        self.issued
    }
}

struct CollectorState {
    ids: IdAllocator,
    devices: BTreeMap<DeviceId, Arc<DeviceController>>,
}

/// Groups devices under one publisher.
pub struct Collector {
    id: CollectorId,
    config: DriftConfig,
    state: Mutex<CollectorState>,
}

impl Collector {
    pub fn new(id: CollectorId, config: DriftConfig) -> Self {
        info!(collector_id = id.0, "fleet: created collector");
        Self {
            id,
            config,
            state: Mutex::new(CollectorState {
                ids: IdAllocator::new(),
                devices: BTreeMap::new(),
            }),
        }
    }

    pub fn id(&self) -> CollectorId {
        self.id
    }

    pub async fn add_device(&self) -> Result<DeviceId, SimError> {
        let mut guard = self.state.lock().await;
        let device_id = DeviceId(guard.ids.allocate()?);
        let device = DeviceController::spawn(device_id, self.config)?;
        guard.devices.insert(device_id, Arc::new(device));
        info!(
            collector_id = self.id.0,
            device_id = device_id.0,
            "fleet: created device"
        );
        Ok(device_id)
    }

    /// Detaches the device and stops it.
    pub async fn remove_device(&self, device_id: DeviceId) -> Result<(), SimError> {
        let device = self
            .state
            .lock()
            .await
            .devices
            .remove(&device_id)
            .ok_or(SimError::UnknownDevice(device_id))?;

        match device.stop().await {
            Ok(()) | Err(SimError::NotRunning(_)) => {}
            Err(error) => return Err(error),
        }
        info!(
            collector_id = self.id.0,
            device_id = device_id.0,
            "fleet: removed device"
        );
        Ok(())
    }

    pub async fn device(&self, device_id: DeviceId) -> Option<Arc<DeviceController>> {
        self.state.lock().await.devices.get(&device_id).cloned()
    }

    pub async fn device_ids(&self) -> Vec<DeviceId> {
        self.state.lock().await.devices.keys().copied().collect()
    }

    /// Number of device ids ever handed out by this collector.
    pub async fn issued_ids(&self) -> usize {
        self.state.lock().await.ids.issued()
    }

    /// Current readings of every device, ordered by device id.
    pub async fn readings(&self) -> Vec<(DeviceId, SensorReadings)> {
        let guard = self.state.lock().await;
        guard
            .devices
            .iter()
            .map(|(device_id, device)| (*device_id, device.read_current()))
            .collect()
    }

    pub async fn set_targets(
        &self,
        device_id: DeviceId,
        targets: SensorReadings,
    ) -> Result<(), SimError> {
        let device = self
            .device(device_id)
            .await
            .ok_or(SimError::UnknownDevice(device_id))?;
        device.set_targets(targets)
    }

    pub async fn stop_all(&self) {
        for device in self.devices_in(Lifecycle::Running).await {
            if let Err(error) = device.stop().await {
                warn!(collector_id = self.id.0, %error, "fleet: stop skipped");
            }
        }
    }

    pub async fn start_all(&self) {
        for device in self.devices_in(Lifecycle::Stopped).await {
            if let Err(error) = device.start() {
                warn!(collector_id = self.id.0, %error, "fleet: start skipped");
            }
        }
    }

    async fn devices_in(&self, lifecycle: Lifecycle) -> Vec<Arc<DeviceController>> {
        self.state
            .lock()
            .await
            .devices
            .values()
            .filter(|device| device.lifecycle() == lifecycle)
            .cloned()
            .collect()
    }
}

/// How many collectors to build and how many devices each one gets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetPlan {
    pub collectors: usize,
    pub devices_per_collector: Vec<usize>,
}

impl FleetPlan {
    /// Collectors without an explicit count get
    /// [`DEFAULT_DEVICES_PER_COLLECTOR`] devices.
    pub fn devices_for(&self, index: usize) -> usize {
        self.devices_per_collector
            .get(index)
            .copied()
            .unwrap_or(DEFAULT_DEVICES_PER_COLLECTOR)
    }
}

pub struct Fleet {
    ids: IdAllocator,
    config: DriftConfig,
    collectors: Vec<Collector>,
}

impl Fleet {
    pub fn new(config: DriftConfig) -> Self {
        Self {
            ids: IdAllocator::new(),
            config,
            collectors: Vec::new(),
        }
    }

    pub async fn build(plan: &FleetPlan, config: DriftConfig) -> Result<Self, SimError> {
        config.validate()?;
        let mut fleet = Self::new(config);
        for index in 0..plan.collectors {
            fleet.add_collector(plan.devices_for(index)).await?;
        }
        Ok(fleet)
    }

    pub async fn add_collector(&mut self, devices: usize) -> Result<CollectorId, SimError> {
        let collector = Collector::new(CollectorId(self.ids.allocate()?), self.config);
        for _ in 0..devices {
            collector.add_device().await?;
        }
        let collector_id = collector.id();
        self.collectors.push(collector);
        Ok(collector_id)
    }

    pub fn collectors(&self) -> &[Collector] {
        &self.collectors
    }

    pub fn collector(&self, collector_id: CollectorId) -> Option<&Collector> {
        self.collectors
            .iter()
            .find(|collector| collector.id() == collector_id)
    }

    /// Stops every live device in every collector.
    pub async fn shutdown(&self) {
        for collector in &self.collectors {
            collector.stop_all().await;
        }
        info!(collectors = self.collectors.len(), "fleet: shutdown complete");
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
