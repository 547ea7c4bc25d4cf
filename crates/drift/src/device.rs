use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::thread_rng;
use shared::{
    domain::{DeviceId, SensorKind, SensorReadings},
    error::SimError,
};
use tokio::{sync::watch, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{channel::ChannelController, config::DriftConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Running,
    Stopped,
}

/// State of the convergence overseer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverseerPhase {
    Running,
    Holding,
}

struct DeviceInner {
    id: DeviceId,
    channels: [Arc<ChannelController>; 5],
    targets: Mutex<SensorReadings>,
    paused: watch::Sender<bool>,
    phase: watch::Sender<OverseerPhase>,
}

impl DeviceInner {
    fn targets(&self) -> MutexGuard<'_, SensorReadings> {
        self.targets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn target(&self, kind: SensorKind) -> f64 {
        self.targets().get(kind)
    }

    fn arrived_count(&self) -> usize {
        let targets = *self.targets();
        self.channels
            .iter()
            .filter(|channel| channel.arrived(targets.get(channel.kind())))
            .count()
    }

    fn snapshot(&self) -> SensorReadings {
        let mut readings = SensorReadings::default();
        for channel in &self.channels {
            readings.set(channel.kind(), channel.current());
        }
        readings
    }
}

struct RunState {
    lifecycle: Lifecycle,
    generation: u64,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// One simulated sensor unit: five drifting channels sharing a target vector
/// and a lifecycle, plus an overseer that retargets once enough channels have
/// arrived.
///
/// Construction and [`DeviceController::start`] spawn Tokio tasks and must run
/// inside a Tokio runtime.
pub struct DeviceController {
    inner: Arc<DeviceInner>,
    config: DriftConfig,
    run: Mutex<RunState>,
}

impl DeviceController {
    /// Creates a device with random readings and independently random targets
    /// and starts drifting.
    pub fn spawn(id: DeviceId, config: DriftConfig) -> Result<Self, SimError> {
        config.validate()?;
        let mut rng = thread_rng();
        let current = SensorReadings::random(&mut rng);
        let targets = SensorReadings::random(&mut rng);
        Ok(Self::build(id, current, targets, config))
    }

    /// Creates a device from explicit readings and targets and starts
    /// drifting. Every reading must lie inside its channel's range; targets
    /// only need to be finite.
    pub fn with_state(
        id: DeviceId,
        current: SensorReadings,
        targets: SensorReadings,
        config: DriftConfig,
    ) -> Result<Self, SimError> {
        config.validate()?;
        current.validate_in_range()?;
        targets.validate()?;
        Ok(Self::build(id, current, targets, config))
    }

    fn build(
        id: DeviceId,
        current: SensorReadings,
        targets: SensorReadings,
        config: DriftConfig,
    ) -> Self {
        let channels = SensorKind::ALL
            .map(|kind| Arc::new(ChannelController::new(kind, current.get(kind))));
        let (paused, _) = watch::channel(false);
        let (phase, _) = watch::channel(OverseerPhase::Running);

        let controller = Self {
            inner: Arc::new(DeviceInner {
                id,
                channels,
                targets: Mutex::new(targets),
                paused,
                phase,
            }),
            config,
            run: Mutex::new(RunState {
                lifecycle: Lifecycle::Stopped,
                generation: 0,
                cancel: CancellationToken::new(),
                tasks: Vec::new(),
            }),
        };
        controller.arm(&mut controller.lock_run());
        controller
    }

    pub fn id(&self) -> DeviceId {
        self.inner.id
    }

    /// Point-in-time copy of all five readings.
    pub fn read_current(&self) -> SensorReadings {
        self.inner.snapshot()
    }

    pub fn targets(&self) -> SensorReadings {
        *self.inner.targets()
    }

    /// Replaces the whole target vector at once. Targets set while the device
    /// is holding are overwritten by the retarget at the end of the hold.
    pub fn set_targets(&self, targets: SensorReadings) -> Result<(), SimError> {
        targets.validate()?;
        *self.inner.targets() = targets;
        debug!(device_id = self.inner.id.0, %targets, "drift: targets set");
        Ok(())
    }

    pub fn phase(&self) -> OverseerPhase {
        *self.inner.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<OverseerPhase> {
        self.inner.phase.subscribe()
    }

    pub fn is_paused(&self) -> bool {
        *self.inner.paused.borrow()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lock_run().lifecycle
    }

    /// Number of times the controller has been started.
    pub fn generation(&self) -> u64 {
        self.lock_run().generation
    }

    /// Re-arms a stopped controller with a fresh cancellation token and fresh
    /// tasks. Readings and targets carry over from before the stop.
    pub fn start(&self) -> Result<(), SimError> {
        let mut run = self.lock_run();
        if run.lifecycle == Lifecycle::Running {
            return Err(SimError::AlreadyRunning(self.inner.id));
        }
        self.arm(&mut run);
        Ok(())
    }

    /// Cancels every task of the current lifetime and waits for them to exit.
    pub async fn stop(&self) -> Result<(), SimError> {
        let tasks = {
            let mut run = self.lock_run();
            if run.lifecycle == Lifecycle::Stopped {
                return Err(SimError::NotRunning(self.inner.id));
            }
            run.lifecycle = Lifecycle::Stopped;
            run.cancel.cancel();
            std::mem::take(&mut run.tasks)
        };

        for task in tasks {
            if let Err(error) = task.await {
                warn!(device_id = self.inner.id.0, %error, "drift: task ended abnormally");
            }
        }
        info!(device_id = self.inner.id.0, "drift: device stopped");
        Ok(())
    }

    fn lock_run(&self) -> MutexGuard<'_, RunState> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn arm(&self, run: &mut RunState) {
        self.inner.paused.send_replace(false);
        self.inner.phase.send_replace(OverseerPhase::Running);

        let cancel = CancellationToken::new();
        let mut tasks = Vec::with_capacity(self.inner.channels.len() + 1);
        for channel in &self.inner.channels {
            let inner = Arc::clone(&self.inner);
            tasks.push(tokio::spawn(Arc::clone(channel).run(
                move |kind| inner.target(kind),
                self.inner.paused.subscribe(),
                cancel.clone(),
                self.config.tick_interval(),
            )));
        }
        tasks.push(tokio::spawn(oversee(
            Arc::clone(&self.inner),
            self.config,
            cancel.clone(),
        )));

        run.cancel = cancel;
        run.tasks = tasks;
        run.generation += 1;
        run.lifecycle = Lifecycle::Running;
        info!(
            device_id = self.inner.id.0,
            generation = run.generation,
            "drift: device started"
        );
    }
}

impl Drop for DeviceController {
    fn drop(&mut self) {
        let run = self.run.get_mut().unwrap_or_else(PoisonError::into_inner);
        run.cancel.cancel();
    }
}

async fn oversee(inner: Arc<DeviceInner>, config: DriftConfig, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = time::sleep(config.poll_interval()) => {}
        }

        let arrived = inner.arrived_count();
        if arrived < config.convergence_quorum {
            continue;
        }

        inner.paused.send_replace(true);
        inner.phase.send_replace(OverseerPhase::Holding);
        debug!(device_id = inner.id.0, arrived, "drift: quorum reached, holding");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = time::sleep(config.hold_duration()) => {}
        }

        let targets = SensorReadings::random(&mut thread_rng());
        *inner.targets() = targets;
        inner.phase.send_replace(OverseerPhase::Running);
        inner.paused.send_replace(false);
        debug!(device_id = inner.id.0, %targets, "drift: retargeted");
    }
}

#[cfg(test)]
#[path = "tests/device_tests.rs"]
mod tests;
