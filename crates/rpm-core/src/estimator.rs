use crate::channel::SensorChannel;
use crate::config::{IntervalBasis, SensorConfig};
use crate::hal::Clock;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const MS_PER_MINUTE: f64 = 60_000.0;

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct EstimatorStats {
    pub ticks: u64,
    /// Whole periods skipped because the task woke up too late.
    pub missed_ticks: u64,
    pub max_lateness_ms: u64,
    pub total_pulses: u64,
    pub last_delta: u32,
    pub last_elapsed_ms: u64,
}

/// Pulses counted over `interval_ms` scaled to revolutions per minute.
pub fn pulses_to_rpm(delta: u32, interval_ms: u64, pulses_per_revolution: u32) -> f32 {
    let pulses_per_minute = f64::from(delta) * MS_PER_MINUTE / interval_ms as f64;
    (pulses_per_minute / f64::from(pulses_per_revolution)) as f32
}

/// Periodic side of the channel: consumes the pulse delta every tick and
/// publishes the resulting RPM.
pub struct RpmEstimator {
    channel: Arc<SensorChannel>,
    clock: Arc<dyn Clock>,
    interval_ms: u64,
    pulses_per_revolution: u32,
    basis: IntervalBasis,
    last_tick_ms: u64,
    stats: EstimatorStats,
}

impl RpmEstimator {
    /// `config` is expected to be validated: a zero interval or zero pulses per
    /// revolution would publish a non-finite RPM.
    pub fn new(channel: Arc<SensorChannel>, clock: Arc<dyn Clock>, config: &SensorConfig) -> Self {
        let last_tick_ms = clock.now_ms();
        Self {
            channel,
            clock,
            interval_ms: config.calc_interval_ms,
            pulses_per_revolution: config.pulses_per_revolution,
            basis: config.interval_basis,
            last_tick_ms,
            stats: EstimatorStats::default(),
        }
    }

    /// One estimator step. Returns the published RPM.
    pub fn tick(&mut self) -> f32 {
        let delta = self.channel.consume_delta();
        let now = self.clock.now_ms();
        let elapsed_ms = now.saturating_sub(self.last_tick_ms);
        self.last_tick_ms = now;

        let interval_ms = match self.basis {
            IntervalBasis::Measured if elapsed_ms > 0 => elapsed_ms,
            _ => self.interval_ms,
        };
        let rpm = pulses_to_rpm(delta, interval_ms, self.pulses_per_revolution);
        self.channel.publish_rpm(rpm);

        self.stats.ticks += 1;
        self.stats.total_pulses += u64::from(delta);
        self.stats.last_delta = delta;
        self.stats.last_elapsed_ms = elapsed_ms;

        info!("Pulses: {}, RPM: {:.2}", delta, rpm);
        rpm
    }

    /// Wait-then-tick loop. Each tick is scheduled one interval after the
    /// previous deadline; when the task wakes more than a full interval late
    /// the schedule restarts from now.
    pub fn run(&mut self, stop: &AtomicBool) {
        let mut next_tick = self.clock.now_ms().saturating_add(self.interval_ms);

        while !stop.load(Ordering::Relaxed) {
            let now = self.clock.now_ms();
            if now < next_tick {
                self.clock.delay_ms(next_tick - now);
            }

            let woke = self.clock.now_ms();
            let lateness = woke.saturating_sub(next_tick);
            self.stats.max_lateness_ms = self.stats.max_lateness_ms.max(lateness);
            if lateness >= self.interval_ms {
                let missed = lateness / self.interval_ms;
                self.stats.missed_ticks += missed;
                warn!("RPM task {} ms late, {} tick(s) missed", lateness, missed);
                next_tick = woke;
            }

            self.tick();
            next_tick = next_tick.saturating_add(self.interval_ms);
        }
    }

    pub fn stats(&self) -> &EstimatorStats {
        &self.stats
    }

    pub fn into_stats(self) -> EstimatorStats {
        self.stats
    }
}
