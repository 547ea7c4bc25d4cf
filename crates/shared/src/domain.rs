use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u8);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(DeviceId);
id_newtype!(CollectorId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Temperature,
    Humidity,
    Ph,
    WaterLevel,
    LightIntensity,
}

impl SensorKind {
    pub const ALL: [SensorKind; 5] = [
        SensorKind::Temperature,
        SensorKind::Humidity,
        SensorKind::Ph,
        SensorKind::WaterLevel,
        SensorKind::LightIntensity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Humidity => "humidity",
            SensorKind::Ph => "ph",
            SensorKind::WaterLevel => "water_level",
            SensorKind::LightIntensity => "light_intensity",
        }
    }

    pub fn range(&self) -> ChannelRange {
        match self {
            // celsius
            SensorKind::Temperature => ChannelRange::new(10.0, 40.0, 0.25),
            // relative humidity, percent
            SensorKind::Humidity => ChannelRange::new(20.0, 100.0, 2.0),
            SensorKind::Ph => ChannelRange::new(0.0, 14.0, 0.05),
            // centimeters of water above the basin floor
            SensorKind::WaterLevel => ChannelRange::new(0.0, 10.0, 0.25),
            // percent of lamps working
            SensorKind::LightIntensity => ChannelRange::new(0.0, 100.0, 1.0),
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounds and drift increment of one sensor channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ChannelRange {
    pub const fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// A channel has arrived once it sits within one step of its target.
    pub fn arrived(&self, current: f64, target: f64) -> bool {
        (current - target).abs() <= self.step
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        rng.gen_range(self.min..self.max)
    }
}

/// One value per sensor channel. Used both for current readings and for
/// target vectors, so a target update always carries all five channels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorReadings {
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub water_level: f64,
    pub light_intensity: f64,
}

impl SensorReadings {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut readings = Self::default();
        for kind in SensorKind::ALL {
            readings.set(kind, kind.range().sample(rng));
        }
        readings
    }

    pub fn get(&self, kind: SensorKind) -> f64 {
        match kind {
            SensorKind::Temperature => self.temperature,
            SensorKind::Humidity => self.humidity,
            SensorKind::Ph => self.ph,
            SensorKind::WaterLevel => self.water_level,
            SensorKind::LightIntensity => self.light_intensity,
        }
    }

    pub fn set(&mut self, kind: SensorKind, value: f64) {
        match kind {
            SensorKind::Temperature => self.temperature = value,
            SensorKind::Humidity => self.humidity = value,
            SensorKind::Ph => self.ph = value,
            SensorKind::WaterLevel => self.water_level = value,
            SensorKind::LightIntensity => self.light_intensity = value,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SensorKind, f64)> + '_ {
        SensorKind::ALL.into_iter().map(|kind| (kind, self.get(kind)))
    }

    /// Rejects vectors carrying NaN or infinite values.
    pub fn validate(&self) -> Result<(), SimError> {
        match self.iter().find(|(_, value)| !value.is_finite()) {
            Some((kind, _)) => Err(SimError::NonFiniteValue { kind }),
            None => Ok(()),
        }
    }

    /// Rejects vectors with a value that is not finite or lies outside its
    /// channel's `[min, max]`.
    pub fn validate_in_range(&self) -> Result<(), SimError> {
        self.validate()?;
        match self.iter().find(|(kind, value)| !kind.range().contains(*value)) {
            Some((kind, value)) => Err(SimError::OutOfRange { kind, value }),
            None => Ok(()),
        }
    }
}

impl TryFrom<&[f64]> for SensorReadings {
    type Error = SimError;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        if values.len() != SensorKind::ALL.len() {
            return Err(SimError::IncompleteVector {
                expected: SensorKind::ALL.len(),
                actual: values.len(),
            });
        }

        let mut readings = Self::default();
        for (kind, value) in SensorKind::ALL.into_iter().zip(values) {
            readings.set(kind, *value);
        }
        readings.validate()?;
        Ok(readings)
    }
}

impl fmt::Display for SensorReadings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{:.2} {:.2} {:.2} {:.2} {:.2}}}",
            self.temperature, self.humidity, self.ph, self.water_level, self.light_intensity
        )
    }
}
