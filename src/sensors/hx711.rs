//! HX711 24-bit load-cell ADC: data-ready interrupt decoder.
//!
//! The HX711 pulls DOUT low when a conversion is ready.  The falling edge
//! runs [`Hx711Decoder::on_data_ready`], which bit-bangs PD_SCK to shift the
//! 24-bit two's-complement result out MSB first, then issues the extra
//! gain-select pulses that configure the *next* conversion:
//!
//! | Gain            | Total SCK pulses | Extra pulses |
//! |-----------------|------------------|--------------|
//! | Channel A, 128  | 25               | 1            |
//! | Channel B, 32   | 26               | 2            |
//! | Channel A, 64   | 27               | 3            |
//!
//! The decoded sample is published into the channel's
//! [`SampleCell`](super::sample_cell::SampleCell).  Nothing here allocates,
//! logs or waits longer than the protocol's microsecond delays.

use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use serde::{Deserialize, Serialize};

use super::LoadCellChannel;
use crate::app::ports::MonotonicClock;
use crate::config::ScaleConfig;
use crate::error::SensorError;

/// Significant bits in one conversion.
pub const DATA_BITS: u32 = 24;

const SIGN_BIT: u32 = 1 << (DATA_BITS - 1);
const DATA_MASK: u32 = (1 << DATA_BITS) - 1;
const SIGN_EXTENSION: u32 = !DATA_MASK;

/// Input channel and amplifier gain for the next conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gain {
    ChannelA128,
    ChannelB32,
    ChannelA64,
}

impl Gain {
    /// Clock pulses issued after the 24 data bits.
    pub const fn extra_pulses(self) -> u8 {
        match self {
            Gain::ChannelA128 => 1,
            Gain::ChannelB32 => 2,
            Gain::ChannelA64 => 3,
        }
    }
}

/// Sign-extend a 24-bit two's-complement field to `i32`.
pub const fn sign_extend_24(bits: u32) -> i32 {
    let bits = bits & DATA_MASK;
    if bits & SIGN_BIT != 0 {
        (bits | SIGN_EXTENSION) as i32
    } else {
        bits as i32
    }
}

// ── Decoder state flag ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DecoderState {
    Idle = 0,
    Reading = 1,
}

/// Two-state busy flag shared by every invocation of the handler.
pub struct DecoderFlag(AtomicU8);

impl DecoderFlag {
    pub const fn new() -> Self {
        Self(AtomicU8::new(DecoderState::Idle as u8))
    }

    pub fn state(&self) -> DecoderState {
        if self.0.load(Ordering::Acquire) == DecoderState::Reading as u8 {
            DecoderState::Reading
        } else {
            DecoderState::Idle
        }
    }

    /// Idle → Reading.  Returns `false` if a read is already in progress.
    pub fn try_begin(&self) -> bool {
        self.0
            .compare_exchange(
                DecoderState::Idle as u8,
                DecoderState::Reading as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Reading → Idle.
    pub fn finish(&self) {
        self.0.store(DecoderState::Idle as u8, Ordering::Release);
    }
}

impl Default for DecoderFlag {
    fn default() -> Self {
        Self::new()
    }
}

// ── Observability counters ────────────────────────────────────

/// Snapshot of the decoder counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Conversions decoded and published.
    pub conversions: u32,
    /// Edges ignored because a read was in progress or DOUT was high.
    pub spurious_triggers: u32,
    /// Conversions aborted on a GPIO error.
    pub bus_faults: u32,
}

#[derive(Default)]
pub struct DecoderCounters {
    conversions: AtomicU32,
    spurious_triggers: AtomicU32,
    bus_faults: AtomicU32,
}

impl DecoderCounters {
    pub fn snapshot(&self) -> DecoderStats {
        DecoderStats {
            conversions: self.conversions.load(Ordering::Relaxed),
            spurious_triggers: self.spurious_triggers.load(Ordering::Relaxed),
            bus_faults: self.bus_faults.load(Ordering::Relaxed),
        }
    }
}

// ── Decoder ───────────────────────────────────────────────────

pub struct Hx711Decoder<CLK, DATA, D, C> {
    clock_pin: CLK,
    data_pin: DATA,
    delay: D,
    clock: C,
    channel: Arc<LoadCellChannel>,
    extra_pulses: u8,
    settle_us: u32,
    pulse_us: u32,
}

impl<CLK, DATA, D, C> Hx711Decoder<CLK, DATA, D, C>
where
    CLK: OutputPin,
    DATA: InputPin,
    D: DelayNs,
    C: MonotonicClock,
{
    pub fn new(
        clock_pin: CLK,
        data_pin: DATA,
        delay: D,
        clock: C,
        channel: Arc<LoadCellChannel>,
        config: &ScaleConfig,
    ) -> Self {
        Self {
            clock_pin,
            data_pin,
            delay,
            clock,
            channel,
            extra_pulses: config.gain.extra_pulses(),
            settle_us: config.settle_us,
            pulse_us: config.pulse_us,
        }
    }

    /// Falling-edge handler.  Runs in interrupt context.
    pub fn on_data_ready(&mut self) {
        let outcome = self.try_capture();
        let counters = &self.channel.counters;
        match outcome {
            Ok(true) => {
                counters.conversions.fetch_add(1, Ordering::Relaxed);
            }
            Ok(false) => {
                counters.spurious_triggers.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                counters.bus_faults.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Returns `Ok(false)` when the edge was not a valid data-ready signal.
    fn try_capture(&mut self) -> Result<bool, SensorError> {
        if self.channel.decoder.state() == DecoderState::Reading {
            return Ok(false);
        }
        // DOUT must still be low: anything else is a glitch or an edge
        // caused by our own clocking.
        if self
            .data_pin
            .is_high()
            .map_err(|_| SensorError::GpioReadFailed)?
        {
            return Ok(false);
        }
        if !self.channel.decoder.try_begin() {
            return Ok(false);
        }

        let result = self.shift_in().map(|bits| {
            let stamp_ns = self.clock.now_ns().max(1);
            self.channel.sample.publish(sign_extend_24(bits), stamp_ns);
        });
        if result.is_err() {
            // Never leave SCK high: the amplifier would power down.
            let _ = self.clock_pin.set_low();
        }

        self.channel.decoder.finish();
        result.map(|()| true)
    }

    fn shift_in(&mut self) -> Result<u32, SensorError> {
        self.delay.delay_us(self.settle_us);

        let mut bits: u32 = 0;
        for _ in 0..DATA_BITS {
            self.clock_high()?;
            bits <<= 1;
            self.delay.delay_us(self.pulse_us);
            self.clock_low()?;
            if self
                .data_pin
                .is_high()
                .map_err(|_| SensorError::GpioReadFailed)?
            {
                bits |= 1;
            }
        }

        for _ in 0..self.extra_pulses {
            self.clock_high()?;
            self.delay.delay_us(self.pulse_us);
            self.clock_low()?;
        }

        Ok(bits)
    }

    fn clock_high(&mut self) -> Result<(), SensorError> {
        self.clock_pin
            .set_high()
            .map_err(|_| SensorError::GpioWriteFailed)
    }

    fn clock_low(&mut self) -> Result<(), SensorError> {
        self.clock_pin
            .set_low()
            .map_err(|_| SensorError::GpioWriteFailed)
    }
}
