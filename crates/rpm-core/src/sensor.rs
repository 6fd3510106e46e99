use crate::channel::SensorChannel;
use crate::config::SensorConfig;
use crate::error::{ConfigError, InitError, StartError};
use crate::estimator::{EstimatorStats, RpmEstimator};
use crate::hal::{EdgeHandler, HalError, InputConfig, PinId, SensorHal};
use crate::pulse_counter::PulseCounter;
use crate::task::{TaskHandle, TaskSpec};
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    /// No handler bound, no task running.
    Uninitialized,
    /// Edge handler registered; pulses are being counted.
    Armed,
    /// Estimator task spawned.
    Running,
}

/// Read-only view of a sensor channel, usable from any task.
#[derive(Clone)]
pub struct RpmReader {
    channel: Arc<SensorChannel>,
}

impl RpmReader {
    pub fn get_rpm(&self) -> f32 {
        self.channel.read_rpm()
    }

    pub fn ticks(&self) -> u32 {
        self.channel.ticks()
    }

    pub fn pulse_count(&self) -> u32 {
        self.channel.pulse_count()
    }

    pub fn pending_pulses(&self) -> u32 {
        self.channel.pending_pulses()
    }
}

/// One hall-effect RPM sensor channel.
pub struct RpmSensor {
    config: SensorConfig,
    hal: SensorHal,
    channel: Arc<SensorChannel>,
    state: SensorState,
    pin: Option<PinId>,
    stop: Arc<AtomicBool>,
    task: Option<TaskHandle>,
}

impl RpmSensor {
    pub fn new(config: SensorConfig, hal: SensorHal) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            hal,
            channel: Arc::new(SensorChannel::new()),
            state: SensorState::Uninitialized,
            pin: None,
            stop: Arc::new(AtomicBool::new(false)),
            task: None,
        })
    }

    /// Configures `pin` as a pull-up input interrupting on the falling edge
    /// and arms a debouncing [`PulseCounter`] on it.
    pub fn initialize(&mut self, pin: PinId) -> Result<(), InitError> {
        let handler = PulseCounter::new(
            Arc::clone(&self.channel),
            Arc::clone(&self.hal.clock),
            self.config.debounce_ms,
        );
        debug!("Debounce window {} ms on GPIO {}", handler.debounce_ms(), pin);
        self.initialize_with_handler(pin, Arc::new(handler))
    }

    /// Same as [`initialize`](Self::initialize) with a caller-supplied edge
    /// handler, for alternative debounce strategies sharing this channel.
    pub fn initialize_with_handler(
        &mut self,
        pin: PinId,
        handler: Arc<dyn EdgeHandler>,
    ) -> Result<(), InitError> {
        if let Some(current) = self.pin {
            return Err(InitError::AlreadyInitialized(current));
        }

        let gpio = &self.hal.gpio;
        gpio.configure_input(&InputConfig::hall_sensor(pin))
            .map_err(|source| {
                error!("Failed to configure GPIO {}: {}", pin, source);
                InitError::PinConfig { pin, source }
            })?;

        match gpio.install_isr_service() {
            Ok(()) => {}
            Err(HalError::InvalidState) => debug!("GPIO ISR service already installed"),
            Err(e) => {
                error!("Failed to install ISR service: {}", e);
                return Err(InitError::IsrService(e));
            }
        }

        gpio.add_isr_handler(pin, handler).map_err(|source| {
            error!("Failed to add ISR handler for GPIO {}: {}", pin, source);
            InitError::HandlerRegistration { pin, source }
        })?;

        self.pin = Some(pin);
        self.state = SensorState::Armed;
        info!("RPM sensor initialized on GPIO {}", pin);
        Ok(())
    }

    /// Spawns the periodic estimator task.
    pub fn start(&mut self) -> Result<(), StartError> {
        match self.state {
            SensorState::Uninitialized => return Err(StartError::NotInitialized),
            SensorState::Running => return Err(StartError::AlreadyStarted),
            SensorState::Armed => {}
        }

        info!("Starting RPM measurement");
        // Pulses counted since arming belong to no window; the first tick
        // covers exactly one interval from here.
        let dropped = self.channel.consume_delta();
        if dropped > 0 {
            debug!("Discarding {} pulse(s) counted before start", dropped);
        }
        let mut estimator = RpmEstimator::new(
            Arc::clone(&self.channel),
            Arc::clone(&self.hal.clock),
            &self.config,
        );
        let stop = Arc::clone(&self.stop);
        let task = self
            .hal
            .spawner
            .spawn(
                &TaskSpec::ESTIMATOR,
                Box::new(move || {
                    estimator.run(&stop);
                    estimator.into_stats()
                }),
            )
            .map_err(|e| {
                error!("Failed to create RPM task: {}", e);
                StartError::TaskSpawn(e)
            })?;

        self.task = Some(task);
        self.state = SensorState::Running;
        info!("Waiting for pulses from hall sensor...");
        Ok(())
    }

    /// Last published RPM. Never blocks.
    pub fn get_rpm(&self) -> f32 {
        self.channel.read_rpm()
    }

    pub fn reader(&self) -> RpmReader {
        RpmReader {
            channel: Arc::clone(&self.channel),
        }
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    pub fn pin(&self) -> Option<PinId> {
        self.pin
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Stops the estimator after its current period and returns its
    /// statistics. The edge handler stays registered.
    pub fn shutdown(mut self) -> Option<EstimatorStats> {
        self.stop.store(true, Ordering::Relaxed);
        self.task.take()?.join()
    }
}
