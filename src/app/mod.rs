//! Application boundary: the scale facade and the platform ports it needs.
//!
//! All interaction with GPIO, delays and interrupts happens through the
//! **port traits** in [`ports`], keeping the acquisition core testable on
//! the host without real peripherals.

pub mod ports;
pub mod scale;
