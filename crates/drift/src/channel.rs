use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::domain::{ChannelRange, SensorKind};
use tokio::{
    sync::watch,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Moves `current` one `range.step` toward `target`.
///
/// Nothing moves once the channel has arrived (within one step of the
/// target), and a step that would reach or cross a bound is skipped, so the
/// value never overshoots the target and never leaves `[min, max]`. A target
/// outside the bounds makes the channel creep toward the nearest bound and
/// stop there.
pub fn step_toward(current: f64, target: f64, range: &ChannelRange) -> f64 {
    if range.arrived(current, target) {
        return current;
    }

    if target > current {
        if current + range.step < range.max {
            return current + range.step;
        }
    } else if current - range.step > range.min {
        return current - range.step;
    }

    current
}

/// Owns one drifting sensor value. The value is stored as raw `f64` bits so
/// readers never see a torn write while the channel task ticks.
#[derive(Debug)]
pub struct ChannelController {
    kind: SensorKind,
    range: ChannelRange,
    current: AtomicU64,
}

impl ChannelController {
    pub fn new(kind: SensorKind, initial: f64) -> Self {
        Self::with_range(kind, kind.range(), initial)
    }

    pub fn with_range(kind: SensorKind, range: ChannelRange, initial: f64) -> Self {
        Self {
            kind,
            range,
            current: AtomicU64::new(initial.to_bits()),
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn range(&self) -> &ChannelRange {
        &self.range
    }

    pub fn current(&self) -> f64 {
        f64::from_bits(self.current.load(Ordering::Acquire))
    }

    pub fn arrived(&self, target: f64) -> bool {
        self.range.arrived(self.current(), target)
    }

    /// Applies one drift step. Returns whether the value changed.
    pub fn tick(&self, target: f64) -> bool {
        let current = self.current();
        let next = step_toward(current, target, &self.range);
        if next == current {
            return false;
        }
        self.current.store(next.to_bits(), Ordering::Release);
        true
    }

    /// Ticks every `period` until `cancel` fires. `target_of` is consulted on
    /// each tick; while `paused` holds `true` ticks are skipped but the loop
    /// keeps listening. Cancellation wins over a pending pause.
    pub async fn run<F>(
        self: Arc<Self>,
        target_of: F,
        paused: watch::Receiver<bool>,
        cancel: CancellationToken,
        period: Duration,
    ) where
        F: Fn(SensorKind) -> f64,
    {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let is_paused = *paused.borrow();
            if is_paused {
                continue;
            }

            let target = target_of(self.kind);
            if self.tick(target) {
                trace!(
                    channel = self.kind.as_str(),
                    current = self.current(),
                    target,
                    "drift: step"
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/channel_tests.rs"]
mod tests;
