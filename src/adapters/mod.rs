//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter | Implements       | Connects to                         |
//! |---------|------------------|-------------------------------------|
//! | `sim`   | Platform         | Simulated HX711 on a host thread    |
//! | `time`  | MonotonicClock   | `std::time::Instant`                |

pub mod sim;
pub mod time;
