//! Bit-level protocol tests for the data-ready decoder.
//!
//! The decoder is driven through `Scale::init` so that the handler under
//! test is exactly the closure the platform receives.

use scalenode::sensors::hx711::Gain;
use scalenode::{Scale, ScaleConfig};

use crate::mock_hw::{BusEvent, MockDelay, MockPlatform};

fn start(config: &ScaleConfig) -> (MockPlatform, Scale<MockDelay>) {
    let mut platform = MockPlatform::new();
    let scale = Scale::init(&mut platform, config).expect("init");
    (platform, scale)
}

// ── Frame shape ───────────────────────────────────────────────

#[test]
fn gain_128_frame_has_25_clock_pulses() {
    let (platform, scale) = start(&ScaleConfig::default());
    platform.fire(0x00_1234);
    assert_eq!(platform.bus.lock().unwrap().rising_edges(), 25);
    assert_eq!(scale.get_raw_reading(), 0x1234);
}

#[test]
fn extra_pulses_follow_configured_gain() {
    for (gain, expected) in [
        (Gain::ChannelA128, 25),
        (Gain::ChannelB32, 26),
        (Gain::ChannelA64, 27),
    ] {
        let config = ScaleConfig {
            gain,
            ..ScaleConfig::default()
        };
        let (platform, _scale) = start(&config);
        platform.fire(0x00_0001);
        assert_eq!(
            platform.bus.lock().unwrap().rising_edges(),
            expected,
            "{gain:?}"
        );
    }
}

#[test]
fn frame_follows_protocol_order() {
    let (platform, _scale) = start(&ScaleConfig::default());
    platform.fire(0x80_0000);
    let trace = platform.trace();

    // Data-ready check, then the settle delay before the first pulse.
    assert_eq!(trace[0], BusEvent::Sample(false));
    assert_eq!(trace[1], BusEvent::DelayUs(5));

    // Each data bit: rise, hold, fall, sample.
    assert_eq!(
        &trace[2..6],
        &[
            BusEvent::SckHigh,
            BusEvent::DelayUs(5),
            BusEvent::SckLow,
            BusEvent::Sample(true),
        ]
    );
    assert_eq!(
        &trace[6..10],
        &[
            BusEvent::SckHigh,
            BusEvent::DelayUs(5),
            BusEvent::SckLow,
            BusEvent::Sample(false),
        ]
    );

    // Gain pulse with no sample, SCK left low.
    assert_eq!(
        &trace[trace.len() - 3..],
        &[BusEvent::SckHigh, BusEvent::DelayUs(5), BusEvent::SckLow]
    );
    assert!(!platform.bus.lock().unwrap().sck);
}

// ── Decoding ──────────────────────────────────────────────────

#[test]
fn negative_code_is_sign_extended() {
    let (platform, scale) = start(&ScaleConfig::default());
    platform.fire(0x80_0001);
    assert_eq!(scale.get_raw_reading(), -8_388_607);

    platform.fire(0xFF_FFFF);
    assert_eq!(scale.get_raw_reading(), -1);
}

#[test]
fn full_scale_positive_code() {
    let (platform, scale) = start(&ScaleConfig::default());
    platform.fire(0x7F_FFFF);
    assert_eq!(scale.get_raw_reading(), 8_388_607);
}

#[test]
fn raw_reading_is_zero_before_first_conversion() {
    let (_platform, scale) = start(&ScaleConfig::default());
    assert_eq!(scale.get_raw_reading(), 0);
    assert_eq!(scale.stats().conversions, 0);
}

// ── Guards and faults ─────────────────────────────────────────

#[test]
fn edge_with_dout_high_is_ignored() {
    let (platform, scale) = start(&ScaleConfig::default());
    platform.fire(0x00_0064);
    // DOUT is high again after the gain pulse.
    platform.glitch();

    let stats = scale.stats();
    assert_eq!(stats.conversions, 1);
    assert_eq!(stats.spurious_triggers, 1);
    assert_eq!(scale.get_raw_reading(), 100, "glitch must not publish");
    assert_eq!(
        platform.trace().last(),
        Some(&BusEvent::Sample(true)),
        "glitch must not clock the bus"
    );
}

#[test]
fn clock_fault_aborts_frame_and_releases_bus() {
    let (platform, scale) = start(&ScaleConfig::default());
    platform.fire(0x00_0010);
    assert_eq!(scale.get_raw_reading(), 16);

    {
        let mut bus = platform.bus.lock().unwrap();
        bus.fail_sck_after = Some(bus.total_rising_edges + 10);
    }
    platform.fire(0x00_0020);

    let stats = scale.stats();
    assert_eq!(stats.bus_faults, 1);
    assert_eq!(stats.conversions, 1);
    assert_eq!(scale.get_raw_reading(), 16, "aborted frame must not publish");
    assert!(!platform.bus.lock().unwrap().sck, "SCK must be left low");

    // The decoder is idle again and decodes the next clean frame.
    platform.bus.lock().unwrap().fail_sck_after = None;
    platform.fire(0x00_0030);
    assert_eq!(scale.get_raw_reading(), 48);
    assert_eq!(scale.stats().conversions, 2);
}

#[test]
fn init_claims_both_pins_and_subscribes_data_pin() {
    let config = ScaleConfig {
        data_pin: 21,
        clock_pin: 22,
        ..ScaleConfig::default()
    };
    let (platform, _scale) = start(&config);
    assert_eq!(platform.inputs, vec![21]);
    assert_eq!(platform.outputs, vec![22]);
    assert_eq!(platform.subscribed_pin, Some(21));
    assert!(platform.has_handler());
}
