//! Scale facade: the API consumed by the relay, persistence and UI layers.
//!
//! [`Scale::init`] wires one HX711 channel: pins from the [`Platform`],
//! a [`Hx711Decoder`] moved into the falling-edge handler, and a
//! [`WeightAggregator`] for the caller's context.  Both sides share one
//! [`LoadCellChannel`].
//!
//! [`ScaleHandle`] is a cheap clone of the shared side (raw readings,
//! calibration, counters) for use from another thread while
//! [`Scale::get_weight`] is blocked.

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use super::ports::Platform;
use crate::config::ScaleConfig;
use crate::error::{Error, Result};
use crate::sensors::LoadCellChannel;
use crate::sensors::aggregator::{WeightAggregator, apply_polarity};
use crate::sensors::calibration::Calibration;
use crate::sensors::hx711::{DecoderStats, Hx711Decoder};

/// Shared, thread-safe view of a running channel.
#[derive(Clone)]
pub struct ScaleHandle {
    channel: Arc<LoadCellChannel>,
    invert_polarity: bool,
}

impl ScaleHandle {
    /// Latest sign-extended conversion, unbatched and unfiltered.
    pub fn get_raw_reading(&self) -> i32 {
        apply_polarity(self.channel.sample.latest().raw, self.invert_polarity)
    }

    /// Two-point calibration from an unloaded and a loaded raw reading.
    /// The stored calibration is untouched if the inputs are rejected.
    pub fn set_calibration_data(&self, tare_raw: i32, loaded_raw: i32, known_weight: f32) -> Result<()> {
        match Calibration::from_two_point(tare_raw, loaded_raw, known_weight) {
            Ok(calibration) => {
                self.channel.calibration.set(calibration);
                info!(
                    "calibration set: tare={} scale={:.9} (ref {} at raw {})",
                    calibration.tare_raw, calibration.scale, known_weight, loaded_raw
                );
                Ok(())
            }
            Err(e) => {
                warn!("calibration rejected: {e} (tare={tare_raw} loaded={loaded_raw})");
                Err(Error::Calibration(e))
            }
        }
    }

    /// Current calibration, for persistence by the caller.
    pub fn get_calibration_data(&self) -> Calibration {
        self.channel.calibration.get()
    }

    pub fn stats(&self) -> DecoderStats {
        self.channel.stats()
    }
}

/// One HX711 channel: interrupt-side decoder plus application-side aggregator.
pub struct Scale<D> {
    handle: ScaleHandle,
    aggregator: WeightAggregator<D>,
    data_pin: i32,
}

impl<D: DelayNs + Send + 'static> Scale<D> {
    /// Configure pins, seed the calibration and start decoding conversions.
    pub fn init<P>(platform: &mut P, config: &ScaleConfig) -> Result<Self>
    where
        P: Platform<Delay = D>,
    {
        config.validate()?;

        let data_pin = platform.input_pin(config.data_pin).map_err(|e| {
            warn!("scale: data pin {} unavailable: {:?}", config.data_pin, e);
            Error::Init("data pin")
        })?;
        let clock_pin = platform.output_pin(config.clock_pin).map_err(|e| {
            warn!("scale: clock pin {} unavailable: {:?}", config.clock_pin, e);
            Error::Init("clock pin")
        })?;

        let channel = Arc::new(LoadCellChannel::new(Calibration::new(
            config.initial_tare_raw,
            config.initial_scale,
        )));

        let mut decoder = Hx711Decoder::new(
            clock_pin,
            data_pin,
            platform.delay(),
            platform.clock(),
            Arc::clone(&channel),
            config,
        );
        platform
            .subscribe_falling_edge(config.data_pin, move || decoder.on_data_ready())
            .map_err(|e| {
                warn!("scale: edge interrupt on pin {} refused: {:?}", config.data_pin, e);
                Error::Init("data-ready interrupt")
            })?;

        info!(
            "scale: HX711 on DOUT={} SCK={} gain={:?} tare={} scale={}",
            config.data_pin,
            config.clock_pin,
            config.gain,
            config.initial_tare_raw,
            config.initial_scale
        );

        Ok(Self {
            handle: ScaleHandle {
                channel,
                invert_polarity: config.invert_polarity,
            },
            aggregator: WeightAggregator::new(platform.delay(), config),
            data_pin: config.data_pin,
        })
    }

    /// Block until a fresh batch of conversions is available and return its
    /// calibrated, outlier-clamped mean weight (never negative).
    ///
    /// With the default config this waits forever if the sensor stops
    /// producing conversions; set `stall_timeout_ms` to get
    /// [`SensorError::Stalled`](crate::error::SensorError::Stalled) instead.
    ///
    /// The weight is `f32`, the width the scale has always reported.  It is
    /// computed in `f64` and narrowed once; widen with `f64::from` if needed.
    pub fn get_weight(&mut self) -> Result<f32> {
        Ok(self.aggregator.weigh(&self.handle.channel)?)
    }

    pub fn get_raw_reading(&self) -> i32 {
        self.handle.get_raw_reading()
    }

    pub fn set_calibration_data(&self, tare_raw: i32, loaded_raw: i32, known_weight: f32) -> Result<()> {
        self.handle.set_calibration_data(tare_raw, loaded_raw, known_weight)
    }

    pub fn get_calibration_data(&self) -> Calibration {
        self.handle.get_calibration_data()
    }

    pub fn stats(&self) -> DecoderStats {
        self.handle.stats()
    }

    /// A clonable handle onto the shared channel state.
    pub fn handle(&self) -> ScaleHandle {
        self.handle.clone()
    }

    /// Unregister the data-ready interrupt.  The decoder (and its pins) is
    /// dropped by the platform along with the handler.
    pub fn shutdown<P: Platform>(self, platform: &mut P) -> Result<()> {
        platform.unsubscribe(self.data_pin).map_err(|e| {
            warn!("scale: unsubscribe pin {} failed: {:?}", self.data_pin, e);
            Error::Init("data-ready interrupt")
        })?;
        let stats = self.stats();
        info!(
            "scale: stopped after {} conversions ({} spurious, {} faults)",
            stats.conversions, stats.spurious_triggers, stats.bus_faults
        );
        Ok(())
    }
}
