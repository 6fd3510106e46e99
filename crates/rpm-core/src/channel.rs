use core::cell::Cell;
use critical_section::Mutex;
use portable_atomic::{AtomicF32, AtomicU32, Ordering};

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    pulse_count: u32,
    last_accepted_ms: Option<u64>,
    last_consumed_count: u32,
}

/// State shared between the edge handler, the estimator task and readers.
///
/// `pulse_count` wraps on overflow; consumers only ever look at wrapping
/// deltas. The counters sit behind a critical section that is held for a
/// handful of instructions. The published RPM is a single atomic word and is
/// read without any locking.
pub struct SensorChannel {
    counters: Mutex<Cell<Counters>>,
    current_rpm: AtomicF32,
    ticks: AtomicU32,
}

impl SensorChannel {
    pub const fn new() -> Self {
        Self {
            counters: Mutex::new(Cell::new(Counters {
                pulse_count: 0,
                last_accepted_ms: None,
                last_consumed_count: 0,
            })),
            current_rpm: AtomicF32::new(0.0),
            ticks: AtomicU32::new(0),
        }
    }

    #[cfg(test)]
    pub(crate) fn starting_at(pulse_count: u32) -> Self {
        let channel = Self::new();
        critical_section::with(|cs| {
            let cell = channel.counters.borrow(cs);
            cell.set(Counters {
                pulse_count,
                last_accepted_ms: None,
                last_consumed_count: pulse_count,
            });
        });
        channel
    }

    /// Called from interrupt context on every qualifying edge.
    ///
    /// Accepts the pulse if none was accepted before or more than
    /// `debounce_ms` passed since the last accepted one. Rejected edges leave
    /// the debounce clock untouched. Returns whether the pulse was counted.
    pub fn record_pulse(&self, now_ms: u64, debounce_ms: u64) -> bool {
        critical_section::with(|cs| {
            let cell = self.counters.borrow(cs);
            let mut counters = cell.get();
            let accept = match counters.last_accepted_ms {
                None => true,
                Some(last) => now_ms.saturating_sub(last) > debounce_ms,
            };
            if accept {
                counters.pulse_count = counters.pulse_count.wrapping_add(1);
                counters.last_accepted_ms = Some(now_ms);
                cell.set(counters);
            }
            accept
        })
    }

    /// Called by the estimator once per tick.
    ///
    /// Returns the pulses accepted since the previous call and moves the
    /// consumed snapshot forward, atomically with respect to
    /// [`record_pulse`](Self::record_pulse).
    pub fn consume_delta(&self) -> u32 {
        critical_section::with(|cs| {
            let cell = self.counters.borrow(cs);
            let mut counters = cell.get();
            let delta = counters.pulse_count.wrapping_sub(counters.last_consumed_count);
            counters.last_consumed_count = counters.pulse_count;
            cell.set(counters);
            delta
        })
    }

    /// Called by the estimator only. Single writer, no lock.
    pub fn publish_rpm(&self, rpm: f32) {
        debug_assert!(rpm.is_finite() && rpm >= 0.0, "rpm out of range: {rpm}");
        self.current_rpm.store(rpm, Ordering::Release);
        self.ticks.fetch_add(1, Ordering::Release);
    }

    /// Safe from any context.
    pub fn read_rpm(&self) -> f32 {
        self.current_rpm.load(Ordering::Acquire)
    }

    /// Number of completed publications.
    pub fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::Acquire)
    }

    pub fn pulse_count(&self) -> u32 {
        critical_section::with(|cs| self.counters.borrow(cs).get().pulse_count)
    }

    /// Pulses accepted but not yet consumed by a tick.
    pub fn pending_pulses(&self) -> u32 {
        critical_section::with(|cs| {
            let counters = self.counters.borrow(cs).get();
            counters.pulse_count.wrapping_sub(counters.last_consumed_count)
        })
    }
}

impl Default for SensorChannel {
    fn default() -> Self {
        Self::new()
    }
}
