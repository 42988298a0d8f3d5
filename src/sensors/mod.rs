//! Load-cell acquisition: decoder, shared cell, filter and calibration.
//!
//! ```text
//!   DOUT falling edge
//!         │
//!         ▼
//!   Hx711Decoder ──publish──▶ SampleCell ──poll──▶ WeightAggregator ──▶ f32
//!   (interrupt)                                    (application)
//!                                                        ▲
//!                                      CalibrationCell ──┘
//! ```
//!
//! Everything the two contexts share lives in one [`LoadCellChannel`],
//! held behind an `Arc` by the interrupt closure and by the
//! [`Scale`](crate::app::scale::Scale) facade.

pub mod aggregator;
pub mod calibration;
pub mod filter;
pub mod hx711;
pub mod sample_cell;

use calibration::{Calibration, CalibrationCell};
use hx711::{DecoderCounters, DecoderFlag, DecoderStats};
use sample_cell::SampleCell;

/// State of one HX711 channel shared between interrupt and application.
pub struct LoadCellChannel {
    pub sample: SampleCell,
    pub decoder: DecoderFlag,
    pub counters: DecoderCounters,
    pub calibration: CalibrationCell,
}

impl LoadCellChannel {
    pub fn new(calibration: Calibration) -> Self {
        Self {
            sample: SampleCell::new(),
            decoder: DecoderFlag::new(),
            counters: DecoderCounters::default(),
            calibration: CalibrationCell::new(calibration),
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.counters.snapshot()
    }
}
