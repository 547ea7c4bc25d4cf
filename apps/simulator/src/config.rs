use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use drift::DriftConfig;
use fleet::FleetPlan;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "simulator.toml";
const ENV_PREFIX: &str = "SIM__";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub broker_address: String,
    pub collectors: usize,
    pub devices_per_collector: Vec<usize>,
    pub publish_interval_secs: u64,
    pub drift: DriftConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broker_address: "127.0.0.1:1883".into(),
            collectors: 1,
            devices_per_collector: Vec::new(),
            publish_interval_secs: 5,
            drift: DriftConfig::default(),
        }
    }
}

/// Values given on the command line; `None` keeps the configured value.
#[derive(Debug, Default)]
pub struct Overrides {
    pub broker_address: Option<String>,
    pub collectors: Option<usize>,
    pub devices_per_collector: Vec<usize>,
    pub publish_interval_secs: Option<u64>,
}

impl Settings {
    pub fn fleet_plan(&self) -> FleetPlan {
        FleetPlan {
            collectors: self.collectors,
            devices_per_collector: self.devices_per_collector.clone(),
        }
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs(self.publish_interval_secs.max(1))
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(v) = overrides.broker_address {
            self.broker_address = v;
        }
        if let Some(v) = overrides.collectors {
            self.collectors = v;
        }
        if !overrides.devices_per_collector.is_empty() {
            self.devices_per_collector = overrides.devices_per_collector;
        }
        if let Some(v) = overrides.publish_interval_secs {
            self.publish_interval_secs = v;
        }
    }

    /// Applies `SIM__*` variables. Values that fail to parse are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("BROKER_ADDRESS") {
            self.broker_address = v;
        }
        if let Some(v) = var("COLLECTORS").and_then(|v| v.parse().ok()) {
            self.collectors = v;
        }
        if let Some(v) = var("DEVICES_PER_COLLECTOR").and_then(|v| parse_counts(&v)) {
            self.devices_per_collector = v;
        }
        if let Some(v) = var("PUBLISH_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.publish_interval_secs = v;
        }
        if let Some(v) = var("TICK_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.drift.tick_interval_ms = v;
        }
        if let Some(v) = var("POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.drift.poll_interval_ms = v;
        }
        if let Some(v) = var("HOLD_MS").and_then(|v| v.parse().ok()) {
            self.drift.hold_ms = v;
        }
        if let Some(v) = var("CONVERGENCE_QUORUM").and_then(|v| v.parse().ok()) {
            self.drift.convergence_quorum = v;
        }
    }
}

/// Loads defaults, then the TOML file, then the environment, and checks the
/// drift cadence.
///
/// An explicitly named file must exist; the default `simulator.toml` is
/// optional.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = match path {
        Some(path) => read_settings_file(path)?,
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                read_settings_file(&default_path)?
            } else {
                Settings::default()
            }
        }
    };

    settings.apply_env(|name| std::env::var(name).ok());
    settings
        .drift
        .validate()
        .context("invalid drift settings")?;
    Ok(settings)
}

fn read_settings_file(path: &Path) -> anyhow::Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    parse_settings(&raw).with_context(|| format!("invalid config file '{}'", path.display()))
}

fn parse_settings(raw: &str) -> anyhow::Result<Settings> {
    Ok(toml::from_str(raw)?)
}

fn parse_counts(raw: &str) -> Option<Vec<usize>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse().ok())
        .collect()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
