//! ScaleNode acquisition library.
//!
//! HX711 load-cell pipeline: data-ready interrupt decoder, lock-free
//! latest-sample cell, fixed-batch outlier filter and two-point
//! calibration.  Platform access goes through [`app::ports`]; the
//! [`adapters`] module carries the host clock and board simulation.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod pins;
pub mod sensors;

pub use app::scale::{Scale, ScaleHandle};
pub use config::ScaleConfig;
pub use error::{CalibrationError, Error, Result, SensorError};
pub use sensors::calibration::Calibration;
