use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CollectorId, DeviceId, SensorReadings};

/// Topic a device's readings are published under, e.g. `/R0/Rig3`.
pub fn reading_topic(collector_id: CollectorId, device_id: DeviceId) -> String {
    format!("/R{}/Rig{}", collector_id.0, device_id.0)
}

/// One published snapshot of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingRecord {
    pub collector_id: CollectorId,
    pub device_id: DeviceId,
    pub readings: SensorReadings,
    pub sampled_at: DateTime<Utc>,
}

impl ReadingRecord {
    pub fn new(collector_id: CollectorId, device_id: DeviceId, readings: SensorReadings) -> Self {
        Self {
            collector_id,
            device_id,
            readings,
            sampled_at: Utc::now(),
        }
    }

    pub fn topic(&self) -> String {
        reading_topic(self.collector_id, self.device_id)
    }

    pub fn payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names_collector_and_device() {
        assert_eq!(reading_topic(CollectorId(2), DeviceId(14)), "/R2/Rig14");
    }

    #[test]
    fn payload_carries_all_channels() {
        let record = ReadingRecord::new(
            CollectorId(0),
            DeviceId(1),
            SensorReadings {
                temperature: 21.5,
                humidity: 60.0,
                ph: 6.8,
                water_level: 3.25,
                light_intensity: 90.0,
            },
        );
        let value: serde_json::Value =
            serde_json::from_slice(&record.payload().expect("payload")).expect("json");
        assert_eq!(value["device_id"], 1);
        assert_eq!(value["readings"]["water_level"], 3.25);
        assert_eq!(value["readings"]["light_intensity"], 90.0);
        assert!(value["sampled_at"].is_string());
    }
}
