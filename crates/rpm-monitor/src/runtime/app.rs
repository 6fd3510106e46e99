use crate::runtime::config::RuntimeConfig;
use crate::runtime::logging::init_tracing;
use rpm_core::hal_sim::{SimulatedGpio, SimulatedHallSensor};
use rpm_core::{Clock, RpmReader, RpmSensor, SensorHal, SystemClock, ThreadSpawner};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const HALL_STEP: Duration = Duration::from_millis(1);

pub fn run_from_args() -> ExitCode {
    let config = RuntimeConfig::from_env();
    if config.show_help {
        RuntimeConfig::print_help();
        return ExitCode::SUCCESS;
    }
    run(config)
}

pub fn run(config: RuntimeConfig) -> ExitCode {
    if let Err(e) = init_tracing(config.json_logs) {
        eprintln!("Failed to install log subscriber: {e}");
    }

    let sensor_config = match config.sensor_config() {
        Ok(sensor_config) => sensor_config,
        Err(e) => {
            error!(error = %e, "Invalid sensor configuration");
            return ExitCode::FAILURE;
        }
    };

    let gpio = Arc::new(SimulatedGpio::default());
    let clock = Arc::new(SystemClock::new());
    let hal = SensorHal::new(gpio.clone(), clock.clone(), Arc::new(ThreadSpawner));

    info!(
        pin = sensor_config.pin,
        debounce_ms = sensor_config.debounce_ms,
        calc_interval_ms = sensor_config.calc_interval_ms,
        pulses_per_revolution = sensor_config.pulses_per_revolution,
        interval_basis = ?sensor_config.interval_basis,
        "Configuring RPM sensor"
    );

    let pin = sensor_config.pin;
    let pulses_per_revolution = sensor_config.pulses_per_revolution;
    let debounce_ms = sensor_config.debounce_ms;

    let mut sensor = match RpmSensor::new(sensor_config, hal) {
        Ok(sensor) => sensor,
        Err(e) => {
            error!(error = %e, "Invalid sensor configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = sensor.initialize(pin) {
        error!(error = %e, "Failed to initialize RPM sensor");
        return ExitCode::FAILURE;
    }
    if let Err(e) = sensor.start() {
        error!(error = %e, "Failed to start RPM measurement");
        return ExitCode::FAILURE;
    }

    let mut hall =
        SimulatedHallSensor::new(gpio, pin, pulses_per_revolution).with_bounce(config.sim_bounce);
    hall.set_target_rpm(config.sim_rpm);
    if let Some(period_ms) = hall.pulse_period_ms() {
        if period_ms <= debounce_ms as f64 {
            warn!(
                period_ms,
                debounce_ms, "Simulated pulse period is inside the debounce window"
            );
        }
    }
    info!(
        rpm = hall.target_rpm(),
        bounce_edges = config.sim_bounce,
        "Starting simulated hall sensor"
    );

    let stop = Arc::new(AtomicBool::new(false));
    let hall_handle = {
        let stop = Arc::clone(&stop);
        let clock = clock.clone();
        thread::Builder::new()
            .name("hall_sim".to_string())
            .spawn(move || drive_hall_sensor(hall, clock.as_ref(), &stop))
    };
    let hall_handle = match hall_handle {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Failed to start hall sensor simulation, no pulses will arrive");
            None
        }
    };

    let deadline = run_deadline(Instant::now(), config.run_seconds);
    report_rpm(&sensor.reader(), config.report_period(), deadline);

    stop.store(true, Ordering::Relaxed);
    let pulses_emitted = match hall_handle.map(|handle| handle.join()) {
        Some(Ok(emitted)) => emitted,
        Some(Err(_)) => {
            warn!("Hall sensor simulation panicked");
            0
        }
        None => 0,
    };
    let pulses_counted = sensor.reader().pulse_count();

    match sensor.shutdown() {
        Some(stats) => info!(
            ticks = stats.ticks,
            missed_ticks = stats.missed_ticks,
            max_lateness_ms = stats.max_lateness_ms,
            total_pulses = stats.total_pulses,
            pulses_counted,
            pulses_emitted,
            "Run complete"
        ),
        None => warn!("RPM task did not report statistics"),
    }
    ExitCode::SUCCESS
}

/// End of a `--run-seconds` run. `None` runs until killed, which is also what
/// a duration past the clock's range means.
fn run_deadline(start: Instant, run_seconds: Option<u64>) -> Option<Instant> {
    let seconds = run_seconds?;
    match start.checked_add(Duration::from_secs(seconds)) {
        Some(deadline) => {
            info!(seconds, "Running for limited duration");
            Some(deadline)
        }
        None => {
            warn!(seconds, "Run duration out of range, running until stopped");
            None
        }
    }
}

/// Steps the simulated shaft in real time until `stop` is set. Returns the
/// number of magnet passes produced.
fn drive_hall_sensor(mut hall: SimulatedHallSensor, clock: &dyn Clock, stop: &AtomicBool) -> u64 {
    let mut last = clock.now_ms();
    while !stop.load(Ordering::Relaxed) {
        thread::sleep(HALL_STEP);
        let now = clock.now_ms();
        hall.step(now - last);
        last = now;
    }
    hall.pulses_emitted()
}

/// Logs each newly published RPM every `period`, forever or until `deadline`.
fn report_rpm(reader: &RpmReader, period: Duration, deadline: Option<Instant>) {
    let mut last_ticks = reader.ticks();
    loop {
        let sleep_for = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return;
                }
                period.min(deadline - now)
            }
            None => period,
        };
        thread::sleep(sleep_for);

        let ticks = reader.ticks();
        if ticks == last_ticks {
            debug!("No new RPM estimate yet");
            continue;
        }
        last_ticks = ticks;
        info!(rpm = reader.get_rpm(), ticks, "RPM");
    }
}
