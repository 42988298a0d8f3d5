//! Host simulation of the scale board: one HX711 on two GPIOs.
//!
//! A conversion thread plays the amplifier.  Every `conversion_period` it
//! latches the next raw code, pulls DOUT low and calls the registered
//! falling-edge handler on its own thread (the stand-in for interrupt
//! context).  Each SCK rising edge shifts the next bit onto DOUT, MSB first;
//! from the 25th edge on DOUT returns high and the pulse count selects the
//! gain of the following conversion, as on the real part.
//!
//! [`SimSensor`] is the test-bench side: it sets the load, adds jitter and
//! injects one-off spikes.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use heapless::Deque;
use log::{debug, info, warn};

use super::time::SystemClock;
use crate::app::ports::Platform;
use crate::sensors::hx711::DATA_BITS;

/// Spikes that can be queued ahead of the conversion thread.
const SPIKE_QUEUE_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    /// No simulated device is wired to this GPIO.
    UnknownPin(i32),
    /// The GPIO was already handed out.
    PinTaken(i32),
}

#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    pub data_pin: i32,
    pub clock_pin: i32,
    pub conversion_period: Duration,
}

// ── Amplifier model ───────────────────────────────────────────

struct Device {
    dout: bool,
    sck: bool,
    word: u32,
    edges: u8,
    last_frame_edges: u8,
    load_code: i32,
    jitter: u32,
    rng: u32,
    spikes: Deque<i32, SPIKE_QUEUE_DEPTH>,
    conversions: u32,
}

impl Device {
    fn new() -> Self {
        Self {
            dout: true,
            sck: false,
            word: 0,
            edges: 0,
            last_frame_edges: 0,
            load_code: 0,
            jitter: 0,
            rng: 0x2545_F491,
            spikes: Deque::new(),
            conversions: 0,
        }
    }

    fn next_code(&mut self) -> i32 {
        if let Some(code) = self.spikes.pop_front() {
            return code;
        }
        if self.jitter == 0 {
            return self.load_code;
        }
        // xorshift32
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 17;
        self.rng ^= self.rng << 5;
        let span = 2 * self.jitter + 1;
        let offset = (self.rng % span) as i32 - self.jitter as i32;
        self.load_code.saturating_add(offset)
    }

    /// Latch a new conversion.  DOUT pulses high while the output register
    /// updates, so every conversion produces a falling edge, read or not.
    /// Returns false while powered down.
    fn convert(&mut self) -> bool {
        if self.sck {
            // SCK held high: amplifier is powered down.
            return false;
        }
        let code = self.next_code();
        self.word = (code as u32) & ((1 << DATA_BITS) - 1);
        self.last_frame_edges = self.edges;
        self.edges = 0;
        self.conversions += 1;
        self.dout = false;
        true
    }

    fn set_sck(&mut self, high: bool) {
        if high && !self.sck {
            if u32::from(self.edges) < DATA_BITS {
                let bit = DATA_BITS - 1 - u32::from(self.edges);
                self.dout = (self.word >> bit) & 1 == 1;
            } else {
                self.dout = true;
            }
            self.edges = self.edges.saturating_add(1);
        }
        self.sck = high;
    }
}

type Handler = Box<dyn FnMut() + Send>;

struct Shared {
    device: Mutex<Device>,
    handlers: Mutex<HashMap<i32, Handler>>,
    running: AtomicBool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Test-bench handle ─────────────────────────────────────────

/// Controls the simulated load and inspects the amplifier.
#[derive(Clone)]
pub struct SimSensor {
    shared: Arc<Shared>,
}

impl SimSensor {
    /// Raw code produced for the current load.
    pub fn set_load_code(&self, code: i32) {
        lock(&self.shared.device).load_code = code;
    }

    /// Uniform jitter of ± `amplitude` counts on every conversion.
    pub fn set_jitter(&self, amplitude: u32) {
        lock(&self.shared.device).jitter = amplitude;
    }

    /// Produce `code` for exactly one upcoming conversion.  Returns false
    /// if the spike queue is full.
    pub fn inject_spike(&self, code: i32) -> bool {
        let queued = lock(&self.shared.device).spikes.push_back(code).is_ok();
        if !queued {
            warn!("sim: spike queue full, dropping {code}");
        }
        queued
    }

    /// Conversions latched so far.
    pub fn conversions(&self) -> u32 {
        lock(&self.shared.device).conversions
    }

    /// SCK rising edges seen during the last completed frame.
    pub fn last_frame_edges(&self) -> u8 {
        lock(&self.shared.device).last_frame_edges
    }
}

// ── Pins, delay ───────────────────────────────────────────────

pub struct SimInput {
    shared: Arc<Shared>,
}

impl ErrorType for SimInput {
    type Error = Infallible;
}

impl InputPin for SimInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(lock(&self.shared.device).dout)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!lock(&self.shared.device).dout)
    }
}

pub struct SimOutput {
    shared: Arc<Shared>,
}

impl ErrorType for SimOutput {
    type Error = Infallible;
}

impl OutputPin for SimOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        lock(&self.shared.device).set_sck(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        lock(&self.shared.device).set_sck(true);
        Ok(())
    }
}

/// Thread-sleep delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimDelay;

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

// ── Platform ──────────────────────────────────────────────────

pub struct SimPlatform {
    config: SimConfig,
    shared: Arc<Shared>,
    taken: Vec<i32>,
    worker: Option<JoinHandle<()>>,
}

impl SimPlatform {
    /// Start the simulated amplifier.  Conversions begin immediately and
    /// are dropped until a handler subscribes to the data pin.
    pub fn new(config: SimConfig) -> Self {
        let shared = Arc::new(Shared {
            device: Mutex::new(Device::new()),
            handlers: Mutex::new(HashMap::new()),
            running: AtomicBool::new(true),
        });

        let worker = {
            let shared = Arc::clone(&shared);
            let data_pin = config.data_pin;
            let period = config.conversion_period;
            std::thread::Builder::new()
                .name("hx711-sim".into())
                .spawn(move || conversion_loop(&shared, data_pin, period))
                .map_err(|e| warn!("sim: conversion thread not started: {e}"))
                .ok()
        };

        info!(
            "sim: HX711 on DOUT={} SCK={} every {:?}",
            config.data_pin, config.clock_pin, config.conversion_period
        );
        Self {
            config,
            shared,
            taken: Vec::new(),
            worker,
        }
    }

    pub fn sensor(&self) -> SimSensor {
        SimSensor {
            shared: Arc::clone(&self.shared),
        }
    }

    fn claim(&mut self, pin: i32, expected: i32) -> Result<(), SimError> {
        if pin != expected {
            return Err(SimError::UnknownPin(pin));
        }
        if self.taken.contains(&pin) {
            return Err(SimError::PinTaken(pin));
        }
        self.taken.push(pin);
        Ok(())
    }
}

fn conversion_loop(shared: &Shared, data_pin: i32, period: Duration) {
    while shared.running.load(Ordering::Acquire) {
        std::thread::sleep(period);
        let fell = lock(&shared.device).convert();
        if fell {
            if let Some(handler) = lock(&shared.handlers).get_mut(&data_pin) {
                handler();
            }
        }
    }
    debug!("sim: conversion thread stopped");
}

impl Drop for SimPlatform {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Platform for SimPlatform {
    type Error = SimError;
    type Input = SimInput;
    type Output = SimOutput;
    type Delay = SimDelay;
    type Clock = SystemClock;

    fn input_pin(&mut self, pin: i32) -> Result<SimInput, SimError> {
        self.claim(pin, self.config.data_pin)?;
        Ok(SimInput {
            shared: Arc::clone(&self.shared),
        })
    }

    fn output_pin(&mut self, pin: i32) -> Result<SimOutput, SimError> {
        self.claim(pin, self.config.clock_pin)?;
        lock(&self.shared.device).set_sck(false);
        Ok(SimOutput {
            shared: Arc::clone(&self.shared),
        })
    }

    fn delay(&mut self) -> SimDelay {
        SimDelay
    }

    fn clock(&mut self) -> SystemClock {
        SystemClock::new()
    }

    fn subscribe_falling_edge<F>(&mut self, pin: i32, handler: F) -> Result<(), SimError>
    where
        F: FnMut() + Send + 'static,
    {
        if pin != self.config.data_pin {
            return Err(SimError::UnknownPin(pin));
        }
        lock(&self.shared.handlers).insert(pin, Box::new(handler));
        Ok(())
    }

    fn unsubscribe(&mut self, pin: i32) -> Result<(), SimError> {
        lock(&self.shared.handlers)
            .remove(&pin)
            .map(drop)
            .ok_or(SimError::UnknownPin(pin))?;
        self.taken.retain(|&p| p != pin && p != self.config.clock_pin);
        Ok(())
    }
}
