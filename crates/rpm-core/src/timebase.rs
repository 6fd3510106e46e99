use crate::hal::Clock;
use std::thread;
use std::time::{Duration, Instant};

/// Host monotonic clock, counting from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn delay_ms(&self, ms: u64) {
        thread::sleep(Duration::from_millis(ms));
    }
}
