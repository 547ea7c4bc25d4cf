//! Gradual sensor drift: per-channel controllers that walk a reading toward a
//! target one step at a time, and a device controller that retargets its
//! channels once most of them have arrived.

mod channel;
mod config;
mod device;

pub use channel::{step_toward, ChannelController};
pub use config::DriftConfig;
pub use device::{DeviceController, Lifecycle, OverseerPhase};
