//! Two-point tare/scale calibration.
//!
//! `weight = (raw - tare_raw) * scale`.  The pair is read by the aggregator
//! on every weight and replaced rarely by an operator, so it sits behind a
//! critical-section mutex rather than atomics.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// Raw code at zero load.
    pub tare_raw: i32,
    /// Weight units per raw count.
    pub scale: f64,
}

impl Calibration {
    pub const fn new(tare_raw: i32, scale: f64) -> Self {
        Self { tare_raw, scale }
    }

    /// Derive a calibration from an unloaded and a loaded raw reading and
    /// the reference weight that produced the loaded one.
    pub fn from_two_point(
        tare_raw: i32,
        loaded_raw: i32,
        known_weight: f32,
    ) -> Result<Self, CalibrationError> {
        if loaded_raw == tare_raw {
            return Err(CalibrationError::DegenerateSpan);
        }
        if !known_weight.is_finite() {
            return Err(CalibrationError::NonFiniteReference);
        }
        let span = f64::from(loaded_raw) - f64::from(tare_raw);
        Ok(Self {
            tare_raw,
            scale: f64::from(known_weight) / span,
        })
    }

    /// Calibrated weight of one raw code (may be negative).
    pub fn weight_of(&self, raw: i32) -> f64 {
        (f64::from(raw) - f64::from(self.tare_raw)) * self.scale
    }
}

/// Calibration shared between the aggregator and operator calls.
pub struct CalibrationCell {
    inner: Mutex<CriticalSectionRawMutex, Cell<Calibration>>,
}

impl CalibrationCell {
    pub const fn new(calibration: Calibration) -> Self {
        Self {
            inner: Mutex::new(Cell::new(calibration)),
        }
    }

    pub fn get(&self) -> Calibration {
        self.inner.lock(Cell::get)
    }

    pub fn set(&self, calibration: Calibration) {
        self.inner.lock(|c| c.set(calibration));
    }
}
