//! Batches fresh conversions from the [`SampleCell`] into calibrated weights.
//!
//! The aggregator polls the cell, sleeping `poll_interval_ms` between polls,
//! until it has seen [`SAMPLES_PER_WEIGHT`] readings with strictly newer
//! timestamps than the last one it consumed.  The last consumed timestamp
//! survives across calls, so no conversion is ever weighed twice.

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use super::LoadCellChannel;
use super::filter::{self, Batch, SAMPLES_PER_WEIGHT};
use super::sample_cell::{Reading, SampleCell};
use crate::config::ScaleConfig;
use crate::error::SensorError;

/// Negate a sample when the load cell is wired in reverse.
pub fn apply_polarity(raw: i32, invert: bool) -> i32 {
    if invert { raw.wrapping_neg() } else { raw }
}

pub struct WeightAggregator<D> {
    delay: D,
    poll_interval_ms: u32,
    stall_timeout_ms: Option<u32>,
    invert_polarity: bool,
    last_consumed_ns: u64,
}

impl<D: DelayNs> WeightAggregator<D> {
    pub fn new(delay: D, config: &ScaleConfig) -> Self {
        Self {
            delay,
            poll_interval_ms: config.poll_interval_ms,
            stall_timeout_ms: config.stall_timeout_ms,
            invert_polarity: config.invert_polarity,
            last_consumed_ns: 0,
        }
    }

    /// Suspend until the cell holds a reading newer than the last consumed
    /// one, or until `timeout_ms` of polling has elapsed.  `None` waits
    /// forever.
    pub fn wait_newer(
        &mut self,
        cell: &SampleCell,
        timeout_ms: Option<u32>,
    ) -> Result<Reading, SensorError> {
        let mut waited_ms: u32 = 0;
        loop {
            let reading = cell.latest();
            if reading.is_newer_than(self.last_consumed_ns) {
                self.last_consumed_ns = reading.stamp_ns;
                return Ok(reading);
            }
            if timeout_ms.is_some_and(|limit| waited_ms >= limit) {
                return Err(SensorError::Stalled);
            }
            self.delay.delay_ms(self.poll_interval_ms);
            waited_ms = waited_ms.saturating_add(self.poll_interval_ms);
        }
    }

    /// Collect one batch of fresh samples in capture order.
    pub fn collect_batch(&mut self, cell: &SampleCell) -> Result<Batch, SensorError> {
        let mut batch: Batch = [0; SAMPLES_PER_WEIGHT];
        for slot in &mut batch {
            let reading = self.wait_newer(cell, self.stall_timeout_ms)?;
            *slot = apply_polarity(reading.raw, self.invert_polarity);
        }
        Ok(batch)
    }

    /// Produce one calibrated weight from the next batch of conversions.
    pub fn weigh(&mut self, channel: &LoadCellChannel) -> Result<f32, SensorError> {
        let batch = match self.collect_batch(&channel.sample) {
            Ok(batch) => batch,
            Err(e) => {
                warn!("weight: {e} (last stamp {} ns)", self.last_consumed_ns);
                return Err(e);
            }
        };

        // One snapshot per batch: a concurrent calibration lands wholly
        // before or wholly after this weight.
        let calibration = channel.calibration.get();
        let weight = filter::weigh_batch(batch, &calibration);
        debug!("weight={:.3} from {} samples", weight, SAMPLES_PER_WEIGHT);
        Ok(weight)
    }
}
