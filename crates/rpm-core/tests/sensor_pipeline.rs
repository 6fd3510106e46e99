use rpm_core::hal::InputConfig;
use rpm_core::hal_sim::{ManualSpawner, SimulatedClock, SimulatedGpio, SimulatedHallSensor};
use rpm_core::{
    GpioPlatform, IntervalBasis, PulseCounter, RpmEstimator, RpmSensor, SensorChannel,
    SensorConfig, SensorHal, SensorState, SystemClock, ThreadSpawner,
};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const PIN: u32 = 4;

#[test]
fn bouncing_hall_sensor_reads_true_rpm() {
    let gpio = Arc::new(SimulatedGpio::default());
    let clock = Arc::new(SimulatedClock::new());
    let channel = Arc::new(SensorChannel::new());
    let config = SensorConfig::default();

    gpio.configure_input(&InputConfig::hall_sensor(PIN)).unwrap();
    gpio.install_isr_service().unwrap();
    gpio.add_isr_handler(
        PIN,
        Arc::new(PulseCounter::new(
            Arc::clone(&channel),
            clock.clone(),
            config.debounce_ms,
        )),
    )
    .unwrap();

    let mut estimator = RpmEstimator::new(Arc::clone(&channel), clock.clone(), &config);
    let mut hall = SimulatedHallSensor::new(Arc::clone(&gpio), PIN, 1).with_bounce(2);
    hall.set_target_rpm(1200.0);

    for _ in 0..1000 {
        clock.advance_ms(1);
        hall.step(1);
    }

    assert_eq!(hall.pulses_emitted(), 20);
    assert_eq!(estimator.tick(), 1200.0);
    assert_eq!(channel.read_rpm(), 1200.0);
}

#[test]
fn two_magnet_wheel_halves_pulse_rate() {
    let gpio = Arc::new(SimulatedGpio::default());
    let clock = Arc::new(SimulatedClock::new());
    let channel = Arc::new(SensorChannel::new());
    let config = SensorConfig {
        pulses_per_revolution: 2,
        interval_basis: IntervalBasis::Nominal,
        ..Default::default()
    };

    gpio.configure_input(&InputConfig::hall_sensor(PIN)).unwrap();
    gpio.install_isr_service().unwrap();
    gpio.add_isr_handler(
        PIN,
        Arc::new(PulseCounter::new(Arc::clone(&channel), clock.clone(), 10)),
    )
    .unwrap();

    let mut estimator = RpmEstimator::new(Arc::clone(&channel), clock.clone(), &config);
    let mut hall = SimulatedHallSensor::new(Arc::clone(&gpio), PIN, 2);
    hall.set_target_rpm(300.0);

    for _ in 0..1000 {
        clock.advance_ms(1);
        hall.step(1);
    }

    assert_eq!(hall.pulses_emitted(), 10);
    assert_eq!(estimator.tick(), 300.0);
}

#[test]
fn threaded_sensor_counts_every_spaced_pulse() {
    let gpio = Arc::new(SimulatedGpio::default());
    let hal = SensorHal::new(
        gpio.clone(),
        Arc::new(SystemClock::new()),
        Arc::new(ThreadSpawner),
    );
    let config = SensorConfig {
        debounce_ms: 2,
        calc_interval_ms: 50,
        ..Default::default()
    };

    let mut sensor = RpmSensor::new(config, hal).unwrap();
    sensor.initialize(PIN).unwrap();
    sensor.start().unwrap();
    assert_eq!(sensor.state(), SensorState::Running);

    let reader = sensor.reader();
    for _ in 0..60 {
        gpio.pulse(PIN);
        thread::sleep(Duration::from_millis(5));
    }

    let stats = sensor.shutdown().expect("estimator thread stats");
    assert_eq!(reader.pulse_count(), 60);
    assert!(stats.ticks >= 1);
    assert_eq!(stats.ticks, u64::from(reader.ticks()));
    assert_eq!(
        stats.total_pulses + u64::from(reader.pending_pulses()),
        u64::from(reader.pulse_count())
    );
}

#[test]
fn manually_spawned_task_stops_on_shutdown() {
    let gpio = Arc::new(SimulatedGpio::default());
    let spawner = Arc::new(ManualSpawner::new());
    let hal = SensorHal::new(gpio, Arc::new(SimulatedClock::new()), spawner.clone());

    let mut sensor = RpmSensor::new(SensorConfig::default(), hal).unwrap();
    sensor.initialize(PIN).unwrap();
    sensor.start().unwrap();

    let task = spawner.take_task().expect("recorded task");
    let worker = thread::spawn(task);

    let reader = sensor.reader();
    let deadline = Instant::now() + Duration::from_secs(5);
    while reader.ticks() < 3 && Instant::now() < deadline {
        thread::yield_now();
    }

    assert!(sensor.shutdown().is_none());
    let stats = worker.join().unwrap();
    assert!(stats.ticks >= 3);
    assert_eq!(stats.missed_ticks, 0);
    assert_eq!(reader.get_rpm(), 0.0);
}
