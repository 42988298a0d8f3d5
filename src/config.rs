//! Scale channel configuration parameters
//!
//! Everything needed to bring up one HX711 channel.  Calibration constants
//! are normally persisted by the caller and fed back in through
//! `initial_tare_raw` / `initial_scale` at boot.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pins;
use crate::sensors::hx711::Gain;

/// HX711 powers down when PD_SCK stays high this long.
const POWER_DOWN_THRESHOLD_US: u32 = 60;

/// Configuration of a single load-cell channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    // --- Wiring ---
    /// DOUT / data-ready GPIO
    pub data_pin: i32,
    /// PD_SCK GPIO
    pub clock_pin: i32,

    // --- Calibration seed ---
    /// Raw code at zero load
    pub initial_tare_raw: i32,
    /// Weight units per raw count
    pub initial_scale: f64,

    // --- Protocol ---
    /// Input channel and gain selected for every following conversion.
    /// Fixed for the life of the channel; the protocol default is
    /// channel A at gain 128 (one extra clock pulse).
    pub gain: Gain,
    /// Delay between data-ready and the first clock pulse (µs)
    pub settle_us: u32,
    /// Clock high time per pulse (µs)
    pub pulse_us: u32,

    // --- Aggregation ---
    /// Sleep between polls of the sample cell (ms)
    pub poll_interval_ms: u32,
    /// Give up waiting for a conversion after this long (ms); `None` waits forever
    pub stall_timeout_ms: Option<u32>,
    /// Negate every sample (load cell wired in reverse)
    pub invert_polarity: bool,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            data_pin: pins::HX711_DOUT_GPIO,
            clock_pin: pins::HX711_SCK_GPIO,

            initial_tare_raw: 0,
            initial_scale: 1.0,

            gain: Gain::ChannelA128,
            settle_us: 5,
            pulse_us: 5,

            poll_interval_ms: 1,
            stall_timeout_ms: None,
            invert_polarity: false,
        }
    }
}

impl ScaleConfig {
    /// Reject configurations the channel cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.data_pin == self.clock_pin {
            return Err(Error::Config("data and clock pins must differ"));
        }
        if self.pulse_us >= POWER_DOWN_THRESHOLD_US {
            return Err(Error::Config("clock pulse would power the HX711 down"));
        }
        if self.settle_us >= POWER_DOWN_THRESHOLD_US {
            return Err(Error::Config("settle delay exceeds the conversion window"));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll interval must be non-zero"));
        }
        if !self.initial_scale.is_finite() {
            return Err(Error::Config("initial scale must be finite"));
        }
        if self.stall_timeout_ms == Some(0) {
            return Err(Error::Config("stall timeout must be non-zero"));
        }
        Ok(())
    }
}
