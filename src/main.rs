//! ScaleNode simulator entry point
//!
//! Runs the acquisition pipeline against a simulated HX711 and walks
//! through the operator procedure the real node uses:
//!
//! ```text
//!   empty scale ──▶ raw tare ──▶ reference weight ──▶ raw loaded
//!                                                        │
//!            set_calibration_data(tare, loaded, ref) ◀───┘
//!                          │
//!                          ▼
//!                 get_weight() for a few loads
//! ```
//!
//! Usage: `scalenode-sim [config.json]`.  Logging via `RUST_LOG`.

use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use scalenode::adapters::sim::{SimConfig, SimPlatform, SimSensor};
use scalenode::{Scale, ScaleConfig};

/// Raw code of the empty platform.
const TARE_CODE: i32 = 84_000;
/// Counts per gram of the simulated load cell.
const COUNTS_PER_GRAM: f32 = 420.0;
/// Reference mass used for calibration (g).
const REFERENCE_GRAMS: f32 = 500.0;
/// Simulated conversion period (HX711 RATE pin high, 80 SPS).
const CONVERSION_PERIOD: Duration = Duration::from_micros(12_500);

fn place(sensor: &SimSensor, grams: f32) {
    sensor.set_load_code(TARE_CODE + (grams * COUNTS_PER_GRAM) as i32);
}

fn load_config() -> Result<ScaleConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(ScaleConfig::default());
    };
    let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let config = serde_json::from_str(&text).with_context(|| format!("parsing {path}"))?;
    info!("Config loaded from {}", path);
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("ScaleNode simulator v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config()?;
    if config.stall_timeout_ms.is_none() {
        // The library default waits forever; the demo must terminate.
        config.stall_timeout_ms = Some(2_000);
    }

    let mut platform = SimPlatform::new(SimConfig {
        data_pin: config.data_pin,
        clock_pin: config.clock_pin,
        conversion_period: CONVERSION_PERIOD,
    });
    let sensor = platform.sensor();
    sensor.set_jitter(60);
    place(&sensor, 0.0);

    let mut scale = Scale::init(&mut platform, &config).context("scale init")?;

    // ── Two-point calibration ─────────────────────────────────
    scale.get_weight()?;
    let tare = scale.get_raw_reading();
    info!("Tare reading: {}", tare);

    place(&sensor, REFERENCE_GRAMS);
    scale.get_weight()?;
    let loaded = scale.get_raw_reading();
    info!("Reference reading: {} ({} g)", loaded, REFERENCE_GRAMS);

    scale
        .set_calibration_data(tare, loaded, REFERENCE_GRAMS)
        .context("calibration")?;
    let calibration = scale.get_calibration_data();
    info!(
        "Calibration to persist: tare={} scale={:.9}",
        calibration.tare_raw, calibration.scale
    );

    // ── Weighing ──────────────────────────────────────────────
    for grams in [0.0, 125.0, 740.0, 2_000.0] {
        place(&sensor, grams);
        scale.get_weight()?; // flush conversions taken before the load settled
        if !sensor.inject_spike(TARE_CODE * 40) {
            warn!("spike not injected");
        }
        match scale.get_weight() {
            Ok(weight) => info!("Load {:>7.1} g -> weight {:>7.1} g", grams, weight),
            Err(e) => warn!("Load {:.1} g -> {}", grams, e),
        }
    }

    let stats = scale.stats();
    info!(
        "Decoder: {} conversions, {} spurious edges, {} bus faults; amplifier saw {} SCK edges last frame",
        stats.conversions,
        stats.spurious_triggers,
        stats.bus_faults,
        sensor.last_frame_edges()
    );

    scale.shutdown(&mut platform)?;
    Ok(())
}
