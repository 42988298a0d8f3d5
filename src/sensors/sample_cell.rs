//! Latest-value cell shared between the data-ready ISR and the application.
//!
//! ```text
//!   ISR (single writer)            application (single reader)
//!   ─────────────────────          ───────────────────────────
//!   generation += 1  (odd)
//!   value  := raw                  g0 := generation   (retry if odd)
//!   stamp  := now    (Release)     v  := value ; t := stamp
//!   generation += 1  (even)        g1 := generation   (retry if g0 != g1)
//! ```
//!
//! The writer never waits.  The value is always published before its
//! timestamp, and the generation counter lets the reader discard a snapshot
//! that straddled a write instead of pairing a new value with an old stamp.

use core::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering, fence};

/// One decoded conversion and the monotonic time it was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    /// Sign-extended raw ADC code.
    pub raw: i32,
    /// Capture time in nanoseconds; `0` means nothing captured yet.
    pub stamp_ns: u64,
}

impl Reading {
    /// True if this reading was captured after `stamp_ns`.
    pub fn is_newer_than(&self, stamp_ns: u64) -> bool {
        self.stamp_ns > stamp_ns
    }
}

pub struct SampleCell {
    generation: AtomicU32,
    value: AtomicI32,
    stamp: AtomicU64,
}

impl Default for SampleCell {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleCell {
    pub const fn new() -> Self {
        Self {
            generation: AtomicU32::new(0),
            value: AtomicI32::new(0),
            stamp: AtomicU64::new(0),
        }
    }

    /// Publish a new reading.  Interrupt context only; there must be a
    /// single writer.
    pub fn publish(&self, raw: i32, stamp_ns: u64) {
        let generation = self.generation.load(Ordering::Relaxed);
        self.generation
            .store(generation.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);

        self.value.store(raw, Ordering::Relaxed);
        self.stamp.store(stamp_ns, Ordering::Release);

        self.generation
            .store(generation.wrapping_add(2), Ordering::Release);
    }

    /// Take a consistent snapshot of the latest reading.
    pub fn latest(&self) -> Reading {
        loop {
            let before = self.generation.load(Ordering::Acquire);
            if before & 1 == 1 {
                core::hint::spin_loop();
                continue;
            }

            let stamp_ns = self.stamp.load(Ordering::Acquire);
            let raw = self.value.load(Ordering::Relaxed);
            fence(Ordering::Acquire);

            if self.generation.load(Ordering::Relaxed) == before {
                return Reading { raw, stamp_ns };
            }
            core::hint::spin_loop();
        }
    }
}
