//! Platform seams the measurement core calls into.
//!
//! Everything here is implemented by the board support layer: pin
//! configuration, the GPIO interrupt service, a monotonic clock and task
//! creation. The host build provides [`crate::SystemClock`] and
//! [`crate::ThreadSpawner`]; `hal_sim` provides in-memory versions.

use std::sync::Arc;
use thiserror::Error;

use crate::task::{EstimatorTask, TaskHandle, TaskSpec};

/// Physical input line number.
pub type PinId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    Up,
    Down,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeTrigger {
    Rising,
    Falling,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl EdgeTrigger {
    /// Whether a `from -> to` level transition fires this trigger.
    pub fn matches(self, from: Level, to: Level) -> bool {
        match (self, from, to) {
            (_, a, b) if a == b => false,
            (EdgeTrigger::Any, _, _) => true,
            (EdgeTrigger::Rising, Level::Low, Level::High) => true,
            (EdgeTrigger::Falling, Level::High, Level::Low) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputConfig {
    pub pin: PinId,
    pub pull: Pull,
    pub trigger: EdgeTrigger,
}

impl InputConfig {
    /// Pull-up input interrupting on the falling edge, the wiring of an
    /// open-drain hall sensor.
    pub fn hall_sensor(pin: PinId) -> Self {
        Self {
            pin,
            pull: Pull::Up,
            trigger: EdgeTrigger::Falling,
        }
    }
}

#[derive(Debug, Error)]
pub enum HalError {
    #[error("invalid pin {0}")]
    InvalidPin(PinId),
    #[error("invalid state")]
    InvalidState,
    #[error("out of memory")]
    NoMemory,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Callback bound to a pin's interrupt.
///
/// Runs in interrupt context: implementations must not block, allocate or
/// log, and must finish in bounded time.
pub trait EdgeHandler: Send + Sync {
    fn on_edge(&self);
}

/// Monotonic millisecond clock plus the periodic task's wait primitive.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
    fn delay_ms(&self, ms: u64);
}

pub trait GpioPlatform: Send + Sync {
    fn configure_input(&self, config: &InputConfig) -> Result<(), HalError>;

    /// Installs the shared GPIO interrupt service. Returns
    /// [`HalError::InvalidState`] when it is already installed.
    fn install_isr_service(&self) -> Result<(), HalError>;

    fn add_isr_handler(&self, pin: PinId, handler: Arc<dyn EdgeHandler>) -> Result<(), HalError>;
}

pub trait TaskSpawner: Send + Sync {
    fn spawn(&self, spec: &TaskSpec, task: EstimatorTask) -> Result<TaskHandle, HalError>;
}

/// The collaborators one sensor channel needs.
#[derive(Clone)]
pub struct SensorHal {
    pub gpio: Arc<dyn GpioPlatform>,
    pub clock: Arc<dyn Clock>,
    pub spawner: Arc<dyn TaskSpawner>,
}

impl SensorHal {
    pub fn new(
        gpio: Arc<dyn GpioPlatform>,
        clock: Arc<dyn Clock>,
        spawner: Arc<dyn TaskSpawner>,
    ) -> Self {
        Self {
            gpio,
            clock,
            spawner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falling_trigger_only_matches_high_to_low() {
        assert!(EdgeTrigger::Falling.matches(Level::High, Level::Low));
        assert!(!EdgeTrigger::Falling.matches(Level::Low, Level::High));
        assert!(!EdgeTrigger::Falling.matches(Level::Low, Level::Low));
    }

    #[test]
    fn any_trigger_ignores_steady_level() {
        assert!(EdgeTrigger::Any.matches(Level::Low, Level::High));
        assert!(EdgeTrigger::Any.matches(Level::High, Level::Low));
        assert!(!EdgeTrigger::Any.matches(Level::High, Level::High));
    }

    #[test]
    fn hall_sensor_input_is_pull_up_falling() {
        let cfg = InputConfig::hall_sensor(4);
        assert_eq!(cfg.pin, 4);
        assert_eq!(cfg.pull, Pull::Up);
        assert_eq!(cfg.trigger, EdgeTrigger::Falling);
    }
}
