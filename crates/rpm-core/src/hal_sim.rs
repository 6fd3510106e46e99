//! In-memory platform used by the host runtime and the tests.

use crate::hal::{
    Clock, EdgeHandler, GpioPlatform, HalError, InputConfig, Level, PinId, Pull, TaskSpawner,
};
use crate::task::{EstimatorTask, TaskHandle, TaskSpec};
use portable_atomic::{AtomicU64, Ordering};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

/// ESP32 exposes GPIO 0..=39.
pub const DEFAULT_PIN_COUNT: PinId = 40;

/// Manually driven clock. `delay_ms` advances time instead of sleeping.
#[derive(Debug, Default)]
pub struct SimulatedClock {
    now_ms: AtomicU64,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ms(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::Release);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::AcqRel);
    }
}

impl Clock for SimulatedClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Acquire)
    }

    fn delay_ms(&self, ms: u64) {
        self.advance_ms(ms);
        thread::yield_now();
    }
}

/// Initialization step a failure can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitStep {
    ConfigureInput,
    InstallIsrService,
    AddIsrHandler,
}

struct PinState {
    config: InputConfig,
    level: Level,
    handler: Option<Arc<dyn EdgeHandler>>,
}

#[derive(Default)]
struct GpioState {
    pins: HashMap<PinId, PinState>,
    isr_installed: bool,
    failures: HashMap<InitStep, HalError>,
}

/// GPIO bank with a level per configured pin. Level transitions matching a
/// pin's trigger call its handler on the caller's thread, which plays the
/// part of interrupt context.
pub struct SimulatedGpio {
    pin_count: PinId,
    state: Mutex<GpioState>,
}

impl SimulatedGpio {
    pub fn new(pin_count: PinId) -> Self {
        Self {
            pin_count,
            state: Mutex::new(GpioState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, GpioState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next call to `step` fails with `error`.
    pub fn inject_failure(&self, step: InitStep, error: HalError) {
        self.state().failures.insert(step, error);
    }

    /// Marks the interrupt service as installed by someone else.
    pub fn preinstall_isr_service(&self) {
        self.state().isr_installed = true;
    }

    pub fn isr_installed(&self) -> bool {
        self.state().isr_installed
    }

    pub fn input_config(&self, pin: PinId) -> Option<InputConfig> {
        self.state().pins.get(&pin).map(|p| p.config)
    }

    pub fn has_handler(&self, pin: PinId) -> bool {
        self.state()
            .pins
            .get(&pin)
            .is_some_and(|p| p.handler.is_some())
    }

    pub fn level(&self, pin: PinId) -> Option<Level> {
        self.state().pins.get(&pin).map(|p| p.level)
    }

    /// Drives `pin` to `level`. Returns whether a handler ran.
    pub fn set_level(&self, pin: PinId, level: Level) -> bool {
        let handler = {
            let mut state = self.state();
            let isr_installed = state.isr_installed;
            let Some(pin_state) = state.pins.get_mut(&pin) else {
                return false;
            };
            let previous = pin_state.level;
            pin_state.level = level;
            if !isr_installed || !pin_state.config.trigger.matches(previous, level) {
                return false;
            }
            pin_state.handler.clone()
        };

        match handler {
            Some(handler) => {
                handler.on_edge();
                true
            }
            None => false,
        }
    }

    /// High-low-high pulse, as an open-drain sensor produces when a magnet passes.
    pub fn pulse(&self, pin: PinId) -> bool {
        self.set_level(pin, Level::High);
        let fired = self.set_level(pin, Level::Low);
        self.set_level(pin, Level::High);
        fired
    }
}

impl Default for SimulatedGpio {
    fn default() -> Self {
        Self::new(DEFAULT_PIN_COUNT)
    }
}

impl GpioPlatform for SimulatedGpio {
    fn configure_input(&self, config: &InputConfig) -> Result<(), HalError> {
        let mut state = self.state();
        if let Some(err) = state.failures.remove(&InitStep::ConfigureInput) {
            return Err(err);
        }
        if config.pin >= self.pin_count {
            return Err(HalError::InvalidPin(config.pin));
        }

        let level = match config.pull {
            Pull::Down => Level::Low,
            Pull::Up | Pull::None => Level::High,
        };
        let handler = state.pins.remove(&config.pin).and_then(|p| p.handler);
        state.pins.insert(
            config.pin,
            PinState {
                config: *config,
                level,
                handler,
            },
        );
        Ok(())
    }

    fn install_isr_service(&self) -> Result<(), HalError> {
        let mut state = self.state();
        if let Some(err) = state.failures.remove(&InitStep::InstallIsrService) {
            return Err(err);
        }
        if state.isr_installed {
            return Err(HalError::InvalidState);
        }
        state.isr_installed = true;
        Ok(())
    }

    fn add_isr_handler(&self, pin: PinId, handler: Arc<dyn EdgeHandler>) -> Result<(), HalError> {
        let mut state = self.state();
        if let Some(err) = state.failures.remove(&InitStep::AddIsrHandler) {
            return Err(err);
        }
        if !state.isr_installed {
            return Err(HalError::InvalidState);
        }
        let pin_state = state.pins.get_mut(&pin).ok_or(HalError::InvalidPin(pin))?;
        pin_state.handler = Some(handler);
        Ok(())
    }
}

/// Spawner that records tasks instead of running them.
#[derive(Default)]
pub struct ManualSpawner {
    spawned: Mutex<Vec<(TaskSpec, EstimatorTask)>>,
    failure: Mutex<Option<HalError>>,
}

impl ManualSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next spawn fails with `error`.
    pub fn fail_next(&self, error: HalError) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    pub fn spawned_specs(&self) -> Vec<TaskSpec> {
        self.spawned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(spec, _)| *spec)
            .collect()
    }

    /// Removes the oldest recorded task so the caller can run it.
    pub fn take_task(&self) -> Option<EstimatorTask> {
        let mut spawned = self.spawned.lock().unwrap_or_else(PoisonError::into_inner);
        if spawned.is_empty() {
            None
        } else {
            Some(spawned.remove(0).1)
        }
    }
}

impl TaskSpawner for ManualSpawner {
    fn spawn(&self, spec: &TaskSpec, task: EstimatorTask) -> Result<TaskHandle, HalError> {
        if let Some(err) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(err);
        }
        self.spawned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((*spec, task));
        Ok(TaskHandle::detached())
    }
}

/// Hall sensor facing a rotating shaft, driving a [`SimulatedGpio`] pin.
///
/// Each magnet pass produces one falling edge, optionally followed by
/// `bounce_edges` extra low-high-low chatters at the same instant.
#[derive(Clone)]
pub struct SimulatedHallSensor {
    gpio: Arc<SimulatedGpio>,
    pin: PinId,
    target_rpm: f64,
    pulses_per_revolution: u32,
    bounce_edges: u32,
    // Time and passes since the last speed change.
    elapsed_ms: u64,
    passes: u64,
    pulses_emitted: u64,
}

impl SimulatedHallSensor {
    pub fn new(gpio: Arc<SimulatedGpio>, pin: PinId, pulses_per_revolution: u32) -> Self {
        Self {
            gpio,
            pin,
            target_rpm: 0.0,
            pulses_per_revolution: pulses_per_revolution.max(1),
            bounce_edges: 0,
            elapsed_ms: 0,
            passes: 0,
            pulses_emitted: 0,
        }
    }

    pub fn with_bounce(mut self, bounce_edges: u32) -> Self {
        self.bounce_edges = bounce_edges;
        self
    }

    pub fn set_target_rpm(&mut self, rpm: f64) {
        self.target_rpm = if rpm.is_finite() { rpm.max(0.0) } else { 0.0 };
        self.elapsed_ms = 0;
        self.passes = 0;
    }

    pub fn target_rpm(&self) -> f64 {
        self.target_rpm
    }

    pub fn pulses_emitted(&self) -> u64 {
        self.pulses_emitted
    }

    /// Milliseconds between magnet passes, `None` when stopped.
    pub fn pulse_period_ms(&self) -> Option<f64> {
        if self.target_rpm > 0.0 {
            Some(60_000.0 / (self.target_rpm * f64::from(self.pulses_per_revolution)))
        } else {
            None
        }
    }

    /// Advances the shaft by `dt_ms`. Returns the magnet passes emitted.
    ///
    /// All passes of one step share a timestamp, so callers step at a finer
    /// granularity than the pulse period.
    pub fn step(&mut self, dt_ms: u64) -> u32 {
        self.elapsed_ms += dt_ms;
        let due = (self.elapsed_ms as f64 * self.target_rpm * f64::from(self.pulses_per_revolution)
            / 60_000.0)
            .floor() as u64;

        let mut emitted = 0;
        while self.passes < due {
            self.passes += 1;
            self.emit_pass();
            emitted += 1;
        }
        emitted
    }

    fn emit_pass(&mut self) {
        self.gpio.set_level(self.pin, Level::Low);
        for _ in 0..self.bounce_edges {
            self.gpio.set_level(self.pin, Level::High);
            self.gpio.set_level(self.pin, Level::Low);
        }
        self.gpio.set_level(self.pin, Level::High);
        self.pulses_emitted += 1;
    }
}
