use crate::hal::{HalError, PinId};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to configure GPIO {pin}: {source}")]
    PinConfig {
        pin: PinId,
        #[source]
        source: HalError,
    },
    #[error("failed to install ISR service: {0}")]
    IsrService(#[source] HalError),
    #[error("failed to add ISR handler for GPIO {pin}: {source}")]
    HandlerRegistration {
        pin: PinId,
        #[source]
        source: HalError,
    },
    #[error("sensor already initialized on GPIO {0}")]
    AlreadyInitialized(PinId),
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("failed to create RPM task: {0}")]
    TaskSpawn(#[source] HalError),
    #[error("sensor not initialized")]
    NotInitialized,
    #[error("RPM task already running")]
    AlreadyStarted,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("calc_interval_ms must be greater than zero")]
    ZeroInterval,
    #[error("pulses_per_revolution must be greater than zero")]
    ZeroPulsesPerRevolution,
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
