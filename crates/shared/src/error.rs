use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DeviceId, SensorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Conflict,
    Exhausted,
}

/// Caller errors. None of these affect tasks that are already running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("expected {expected} sensor values, got {actual}")]
    IncompleteVector { expected: usize, actual: usize },
    #[error("sensor value for {kind} is not finite")]
    NonFiniteValue { kind: SensorKind },
    #[error("sensor value {value} for {kind} is outside its range")]
    OutOfRange { kind: SensorKind, value: f64 },
    #[error("convergence quorum must be between 1 and {channels}, got {quorum}")]
    InvalidQuorum { quorum: usize, channels: usize },
    #[error("device {0} not present")]
    UnknownDevice(DeviceId),
    #[error("device {0} is already running")]
    AlreadyRunning(DeviceId),
    #[error("device {0} is not running")]
    NotRunning(DeviceId),
    #[error("all {0} ids have been issued")]
    IdsExhausted(usize),
}

impl SimError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SimError::IncompleteVector { .. }
            | SimError::NonFiniteValue { .. }
            | SimError::OutOfRange { .. }
            | SimError::InvalidQuorum { .. } => ErrorCode::Validation,
            SimError::UnknownDevice(_) => ErrorCode::NotFound,
            SimError::AlreadyRunning(_) | SimError::NotRunning(_) => ErrorCode::Conflict,
            SimError::IdsExhausted(_) => ErrorCode::Exhausted,
        }
    }
}
