//! Mock board for integration tests.
//!
//! Models the HX711 at the bit level and records every clock edge, data
//! sample and microsecond delay so tests can assert on the exact protocol
//! sequence.  Millisecond delays (the aggregator's poll sleep) release the
//! next scripted conversion and run the falling-edge handler inline, which
//! keeps every test single-threaded and deterministic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, ErrorKind, ErrorType, InputPin, OutputPin};
use scalenode::app::ports::{MonotonicClock, Platform};

// ── Bus trace ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    SckHigh,
    SckLow,
    Sample(bool),
    DelayUs(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPinError;

impl digital::Error for MockPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

// ── Amplifier model ───────────────────────────────────────────

pub struct MockBus {
    pub dout: bool,
    pub sck: bool,
    word: u32,
    edges: u32,
    pub trace: Vec<BusEvent>,
    pub script: VecDeque<u32>,
    /// Fail SCK writes once this many rising edges have been issued.
    pub fail_sck_after: Option<u32>,
    pub total_rising_edges: u32,
}

impl MockBus {
    fn new() -> Self {
        Self {
            dout: true,
            sck: false,
            word: 0,
            edges: 0,
            trace: Vec::new(),
            script: VecDeque::new(),
            fail_sck_after: None,
            total_rising_edges: 0,
        }
    }

    fn latch(&mut self, pattern: u32) {
        self.word = pattern & 0x00FF_FFFF;
        self.edges = 0;
        self.dout = false;
        self.trace.clear();
    }

    fn set_sck(&mut self, high: bool) -> Result<(), MockPinError> {
        if high && self.fail_sck_after.is_some_and(|n| self.total_rising_edges >= n) {
            return Err(MockPinError);
        }
        if high && !self.sck {
            self.dout = if self.edges < 24 {
                (self.word >> (23 - self.edges)) & 1 == 1
            } else {
                true
            };
            self.edges += 1;
            self.total_rising_edges += 1;
        }
        self.sck = high;
        self.trace.push(if high { BusEvent::SckHigh } else { BusEvent::SckLow });
        Ok(())
    }

    /// Rising SCK edges in the last frame.
    pub fn rising_edges(&self) -> usize {
        self.trace.iter().filter(|e| **e == BusEvent::SckHigh).count()
    }
}

type Handler = Box<dyn FnMut() + Send>;

// ── Pins, delay, clock ────────────────────────────────────────

pub struct MockInput(Arc<Mutex<MockBus>>);

impl ErrorType for MockInput {
    type Error = MockPinError;
}

impl InputPin for MockInput {
    fn is_high(&mut self) -> Result<bool, MockPinError> {
        let mut bus = self.0.lock().unwrap();
        let level = bus.dout;
        bus.trace.push(BusEvent::Sample(level));
        Ok(level)
    }

    fn is_low(&mut self) -> Result<bool, MockPinError> {
        self.is_high().map(|high| !high)
    }
}

pub struct MockOutput(Arc<Mutex<MockBus>>);

impl ErrorType for MockOutput {
    type Error = MockPinError;
}

impl OutputPin for MockOutput {
    fn set_low(&mut self) -> Result<(), MockPinError> {
        self.0.lock().unwrap().set_sck(false)
    }

    fn set_high(&mut self) -> Result<(), MockPinError> {
        self.0.lock().unwrap().set_sck(true)
    }
}

pub struct MockClock(Arc<AtomicU64>);

impl MonotonicClock for MockClock {
    fn now_ns(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct MockDelay {
    bus: Arc<Mutex<MockBus>>,
    handler: Arc<Mutex<Option<Handler>>>,
    now_ns: Arc<AtomicU64>,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.now_ns.fetch_add(u64::from(ns), Ordering::SeqCst);
        if ns < 1_000_000 {
            self.bus.lock().unwrap().trace.push(BusEvent::DelayUs(ns / 1_000));
            return;
        }
        let next = self.bus.lock().unwrap().script.pop_front();
        if let Some(pattern) = next {
            fire(&self.bus, &self.handler, pattern);
        }
    }
}

fn fire(bus: &Arc<Mutex<MockBus>>, handler: &Arc<Mutex<Option<Handler>>>, pattern: u32) {
    bus.lock().unwrap().latch(pattern);
    if let Some(h) = handler.lock().unwrap().as_mut() {
        h();
    }
}

// ── Platform ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockPlatformError {
    InterruptRefused,
    NotSubscribed,
}

pub struct MockPlatform {
    pub bus: Arc<Mutex<MockBus>>,
    handler: Arc<Mutex<Option<Handler>>>,
    now_ns: Arc<AtomicU64>,
    pub refuse_interrupt: bool,
    pub subscribed_pin: Option<i32>,
    pub inputs: Vec<i32>,
    pub outputs: Vec<i32>,
}

#[allow(dead_code)]
impl MockPlatform {
    pub fn new() -> Self {
        Self {
            bus: Arc::new(Mutex::new(MockBus::new())),
            handler: Arc::new(Mutex::new(None)),
            now_ns: Arc::new(AtomicU64::new(1_000)),
            refuse_interrupt: false,
            subscribed_pin: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Queue raw 24-bit patterns, one released per millisecond of polling.
    pub fn script(&self, patterns: &[u32]) {
        self.bus.lock().unwrap().script.extend(patterns.iter().copied());
    }

    /// Present a conversion and run the handler now.
    pub fn fire(&self, pattern: u32) {
        self.now_ns.fetch_add(12_500_000, Ordering::SeqCst);
        fire(&self.bus, &self.handler, pattern);
    }

    /// Deliver a falling edge without a conversion behind it.
    pub fn glitch(&self) {
        if let Some(h) = self.handler.lock().unwrap().as_mut() {
            h();
        }
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().unwrap().is_some()
    }

    pub fn trace(&self) -> Vec<BusEvent> {
        self.bus.lock().unwrap().trace.clone()
    }

    fn delay_handle(&self) -> MockDelay {
        MockDelay {
            bus: Arc::clone(&self.bus),
            handler: Arc::clone(&self.handler),
            now_ns: Arc::clone(&self.now_ns),
        }
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for MockPlatform {
    type Error = MockPlatformError;
    type Input = MockInput;
    type Output = MockOutput;
    type Delay = MockDelay;
    type Clock = MockClock;

    fn input_pin(&mut self, pin: i32) -> Result<MockInput, MockPlatformError> {
        self.inputs.push(pin);
        Ok(MockInput(Arc::clone(&self.bus)))
    }

    fn output_pin(&mut self, pin: i32) -> Result<MockOutput, MockPlatformError> {
        self.outputs.push(pin);
        Ok(MockOutput(Arc::clone(&self.bus)))
    }

    fn delay(&mut self) -> MockDelay {
        self.delay_handle()
    }

    fn clock(&mut self) -> MockClock {
        MockClock(Arc::clone(&self.now_ns))
    }

    fn subscribe_falling_edge<F>(&mut self, pin: i32, handler: F) -> Result<(), MockPlatformError>
    where
        F: FnMut() + Send + 'static,
    {
        if self.refuse_interrupt {
            return Err(MockPlatformError::InterruptRefused);
        }
        *self.handler.lock().unwrap() = Some(Box::new(handler));
        self.subscribed_pin = Some(pin);
        Ok(())
    }

    fn unsubscribe(&mut self, pin: i32) -> Result<(), MockPlatformError> {
        if self.subscribed_pin != Some(pin) {
            return Err(MockPlatformError::NotSubscribed);
        }
        *self.handler.lock().unwrap() = None;
        self.subscribed_pin = None;
        Ok(())
    }
}
