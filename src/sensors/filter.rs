//! Fixed-batch outlier clamp and calibrated mean.
//!
//! The pivot is the average of the 4th and 5th samples *in capture order*.
//! It is not a sorted median; the positional form is kept so weights match
//! the values the scale has always reported.

use super::calibration::Calibration;

/// Samples averaged into one weight.
pub const SAMPLES_PER_WEIGHT: usize = 8;

pub type Batch = [i32; SAMPLES_PER_WEIGHT];

/// Centre and half-width of the band a sample must fall in to be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlierBand {
    pub pivot: i32,
    pub tolerance: i32,
}

impl OutlierBand {
    pub fn of(batch: &Batch) -> Self {
        let mid = SAMPLES_PER_WEIGHT / 2;
        let pivot = ((i64::from(batch[mid]) + i64::from(batch[mid - 1])) / 2) as i32;
        let tolerance = (pivot / 10).abs();
        Self { pivot, tolerance }
    }

    pub fn contains(&self, sample: i32) -> bool {
        (i64::from(sample) - i64::from(self.pivot)).abs() <= i64::from(self.tolerance)
    }
}

/// Replace every sample outside the band with the pivot.  Returns the band
/// and how many samples were replaced; the batch length never changes.
pub fn clamp_outliers(batch: &mut Batch) -> (OutlierBand, usize) {
    let band = OutlierBand::of(batch);
    let mut replaced = 0;
    for sample in batch.iter_mut() {
        if !band.contains(*sample) {
            log::debug!(
                "outlier {} (deviation {}, tolerance {}) -> {}",
                sample,
                (i64::from(*sample) - i64::from(band.pivot)).abs(),
                band.tolerance,
                band.pivot
            );
            *sample = band.pivot;
            replaced += 1;
        }
    }
    (band, replaced)
}

/// Mean calibrated weight of the batch, floored at zero.
pub fn mean_weight(batch: &Batch, calibration: &Calibration) -> f32 {
    let total: f64 = batch.iter().map(|&raw| calibration.weight_of(raw)).sum();
    let weight = (total / SAMPLES_PER_WEIGHT as f64) as f32;
    if weight < 0.0 { 0.0 } else { weight }
}

/// Clamp outliers then average: the full per-batch computation.
pub fn weigh_batch(mut batch: Batch, calibration: &Calibration) -> f32 {
    clamp_outliers(&mut batch);
    mean_weight(&batch, calibration)
}
