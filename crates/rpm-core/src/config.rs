use crate::error::ConfigError;
use crate::hal::PinId;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_PIN: PinId = 4;
pub const DEFAULT_DEBOUNCE_MS: u64 = 10;
pub const DEFAULT_CALC_INTERVAL_MS: u64 = 1000;

/// Which interval the estimator divides by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalBasis {
    /// Milliseconds actually elapsed since the previous tick. Stays correct
    /// when the task is woken late.
    #[default]
    Measured,
    /// The configured `calc_interval_ms`, whatever the real elapsed time.
    Nominal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorConfig {
    pub pin: PinId,
    pub debounce_ms: u64,
    pub calc_interval_ms: u64,
    /// Magnets passing the sensor per revolution.
    pub pulses_per_revolution: u32,
    pub interval_basis: IntervalBasis,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            pin: DEFAULT_PIN,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            calc_interval_ms: DEFAULT_CALC_INTERVAL_MS,
            pulses_per_revolution: 1,
            interval_basis: IntervalBasis::Measured,
        }
    }
}

impl SensorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.calc_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.pulses_per_revolution == 0 {
            return Err(ConfigError::ZeroPulsesPerRevolution);
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Loads and validates a JSON config file. Missing fields take their
    /// defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }
}
