use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::{domain::SensorKind, error::SimError};

const DEFAULT_TICK_INTERVAL_MS: u64 = 500;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
const DEFAULT_HOLD_MS: u64 = 10_000;
const DEFAULT_CONVERGENCE_QUORUM: usize = 3;

/// Cadence of the drift engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Period between two drift steps of a channel.
    pub tick_interval_ms: u64,
    /// Period between two convergence checks of the overseer.
    pub poll_interval_ms: u64,
    /// How long converged targets are held before retargeting.
    pub hold_ms: u64,
    /// Number of arrived channels that triggers a hold.
    pub convergence_quorum: usize,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            hold_ms: DEFAULT_HOLD_MS,
            convergence_quorum: DEFAULT_CONVERGENCE_QUORUM,
        }
    }
}

impl DriftConfig {
    /// The quorum must be reachable and non-zero, otherwise a device either
    /// never holds or holds on every poll.
    pub fn validate(&self) -> Result<(), SimError> {
        let channels = SensorKind::ALL.len();
        if !(1..=channels).contains(&self.convergence_quorum) {
            return Err(SimError::InvalidQuorum {
                quorum: self.convergence_quorum,
                channels,
            });
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn hold_duration(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}
