//! Monotonic time adapter.
//!
//! Wraps `std::time::Instant` (CLOCK_MONOTONIC on Linux hosts).  Capture
//! stamps must never come from the wall clock: an NTP step would make the
//! aggregator skip or repeat conversions.

use std::time::Instant;

use crate::app::ports::MonotonicClock;

/// Nanoseconds since the adapter was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl MonotonicClock for SystemClock {
    fn now_ns(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}
