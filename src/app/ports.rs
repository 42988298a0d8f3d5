//! Port traits: the boundary between the acquisition core and the platform.
//!
//! ```text
//!   Platform adapter ──▶ Port trait ──▶ Scale (domain)
//! ```
//!
//! The platform hands out embedded-hal pins and delays, a monotonic clock,
//! and falling-edge interrupt registration.  [`Scale`](super::scale::Scale)
//! consumes them via generics, so the core never touches GPIO registers.

use core::fmt::Debug;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source used to stamp conversions.
pub trait MonotonicClock {
    /// Nanoseconds since an arbitrary fixed origin.  Never decreases.
    fn now_ns(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Platform port (GPIO, delays, edge interrupts)
// ───────────────────────────────────────────────────────────────

/// GPIO primitives supplied by the board support layer.
///
/// Every handle is `Send + 'static` because the data-ready handler is
/// moved into the platform's interrupt dispatcher.
pub trait Platform {
    type Error: Debug;
    type Input: InputPin + Send + 'static;
    type Output: OutputPin + Send + 'static;
    type Delay: DelayNs + Send + 'static;
    type Clock: MonotonicClock + Send + 'static;

    /// Configure `pin` as a digital input.
    fn input_pin(&mut self, pin: i32) -> Result<Self::Input, Self::Error>;

    /// Configure `pin` as a digital output, driven low.
    fn output_pin(&mut self, pin: i32) -> Result<Self::Output, Self::Error>;

    /// A delay provider with microsecond and millisecond granularity.
    fn delay(&mut self) -> Self::Delay;

    /// The monotonic clock used for capture timestamps.
    fn clock(&mut self) -> Self::Clock;

    /// Run `handler` on every falling edge of `pin`.
    ///
    /// The handler executes in interrupt (or interrupt-like) context and
    /// is never invoked re-entrantly.  Edges latched while it runs (DOUT
    /// toggles during shift-out) may be delivered after it returns.
    fn subscribe_falling_edge<F>(&mut self, pin: i32, handler: F) -> Result<(), Self::Error>
    where
        F: FnMut() + Send + 'static;

    /// Stop delivering edges on `pin` and drop its handler.
    fn unsubscribe(&mut self, pin: i32) -> Result<(), Self::Error>;
}
