use crate::channel::SensorChannel;
use crate::hal::{Clock, EdgeHandler};
use std::sync::Arc;

/// Debouncing edge handler: counts an edge only when more than `debounce_ms`
/// have passed since the last counted one.
pub struct PulseCounter {
    channel: Arc<SensorChannel>,
    clock: Arc<dyn Clock>,
    debounce_ms: u64,
}

impl PulseCounter {
    pub fn new(channel: Arc<SensorChannel>, clock: Arc<dyn Clock>, debounce_ms: u64) -> Self {
        Self {
            channel,
            clock,
            debounce_ms,
        }
    }

    pub fn debounce_ms(&self) -> u64 {
        self.debounce_ms
    }
}

impl EdgeHandler for PulseCounter {
    fn on_edge(&self) {
        let now = self.clock.now_ms();
        self.channel.record_pulse(now, self.debounce_ms);
    }
}
