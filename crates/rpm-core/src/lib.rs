pub mod channel;
pub mod config;
pub mod error;
pub mod estimator;
pub mod hal;
#[cfg(any(test, feature = "simulation"))]
pub mod hal_sim;
pub mod pulse_counter;
pub mod sensor;
pub mod task;
pub mod timebase;

pub use channel::SensorChannel;
pub use config::{IntervalBasis, SensorConfig};
pub use error::{ConfigError, InitError, StartError};
pub use estimator::{pulses_to_rpm, EstimatorStats, RpmEstimator};
pub use hal::{Clock, EdgeHandler, GpioPlatform, HalError, PinId, SensorHal, TaskSpawner};
pub use pulse_counter::PulseCounter;
pub use sensor::{RpmReader, RpmSensor, SensorState};
pub use task::{TaskHandle, TaskSpec, ThreadSpawner};
pub use timebase::SystemClock;
