//! GPIO pin assignments for the scale node.
//!
//! Single source of truth for the default [`ScaleConfig`](crate::config::ScaleConfig)
//! pins.  Deployments with different wiring override them in the config.

// ---------------------------------------------------------------------------
// HX711 load-cell amplifier
// ---------------------------------------------------------------------------

/// HX711 DOUT: data output and data-ready signal (falls when a conversion
/// is available).  Input, falling-edge interrupt.
pub const HX711_DOUT_GPIO: i32 = 5;

/// HX711 PD_SCK: serial clock driven by the node.  Output, idles LOW
/// (holding it HIGH for 60 µs or more powers the amplifier down).
pub const HX711_SCK_GPIO: i32 = 6;
