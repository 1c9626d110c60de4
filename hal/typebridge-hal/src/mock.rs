//! Host-side test doubles
//!
//! Everything here runs on a shared virtual clock. Delays advance the clock
//! instead of sleeping, so timing-dependent behaviour (handshake pulses,
//! response windows, reset pulses) is deterministic and instant in tests.
//!
//! Handles are cheap `Clone`s sharing state: hand one copy to the code under
//! test and keep another to script inputs and inspect outputs.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use core::future::poll_fn;
use core::task::Poll;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::digital::{ErrorType as PinErrorType, InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_io_async::{ErrorKind, ErrorType, Read, ReadReady, Write};

use crate::gpio::Level;
use crate::time::Clock;

// ============================================================================
// Time
// ============================================================================

/// Shared virtual clock with microsecond resolution
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    now_us: Rc<Cell<u64>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in microseconds
    pub fn now_us(&self) -> u64 {
        self.now_us.get()
    }

    pub fn advance_us(&self, us: u64) {
        self.now_us.set(self.now_us.get() + us);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms * 1000);
    }

    /// A delay provider driving this clock
    pub fn delay(&self) -> MockDelay {
        MockDelay {
            clock: self.clone(),
        }
    }
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.now_us.get() / 1000
    }
}

/// Delay that advances the virtual clock instead of waiting
#[derive(Debug, Clone)]
pub struct MockDelay {
    clock: VirtualClock,
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_us(u64::from(ns).div_ceil(1000));
    }

    async fn delay_us(&mut self, us: u32) {
        self.clock.advance_us(u64::from(us));
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.clock.advance_ms(u64::from(ms));
    }
}

// ============================================================================
// GPIO
// ============================================================================

/// Output pin recording every level it is driven to, with timestamps
#[derive(Debug, Clone)]
pub struct RecordingPin {
    clock: VirtualClock,
    initial: Level,
    history: Rc<RefCell<Vec<(u64, Level)>>>,
}

impl RecordingPin {
    pub fn new(clock: &VirtualClock, initial: Level) -> Self {
        Self {
            clock: clock.clone(),
            initial,
            history: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Level currently driven
    pub fn level(&self) -> Level {
        self.history
            .borrow()
            .last()
            .map(|&(_, level)| level)
            .unwrap_or(self.initial)
    }

    /// Every write as `(time_us, level)`, including redundant ones
    pub fn history(&self) -> Vec<(u64, Level)> {
        self.history.borrow().clone()
    }

    /// Writes that changed the level
    pub fn transitions(&self) -> Vec<(u64, Level)> {
        let mut current = self.initial;
        let mut out = Vec::new();
        for &(at, level) in self.history.borrow().iter() {
            if level != current {
                out.push((at, level));
                current = level;
            }
        }
        out
    }

    /// Low pulses as `(start_us, duration_us)`
    pub fn low_pulses(&self) -> Vec<(u64, u64)> {
        let mut out = Vec::new();
        let mut fell_at = None;
        for (at, level) in self.transitions() {
            match (level, fell_at) {
                (Level::Low, _) => fell_at = Some(at),
                (Level::High, Some(start)) => {
                    out.push((start, at - start));
                    fell_at = None;
                }
                (Level::High, None) => {}
            }
        }
        out
    }

    pub fn clear(&self) {
        self.history.borrow_mut().clear();
    }

    fn record(&self, level: Level) {
        self.history
            .borrow_mut()
            .push((self.clock.now_us(), level));
    }
}

impl PinErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.record(Level::Low);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.record(Level::High);
        Ok(())
    }
}

/// Input pin following a time-scheduled list of levels
#[derive(Debug, Clone)]
pub struct ScheduledInput {
    clock: VirtualClock,
    idle: Level,
    schedule: Rc<RefCell<Vec<(u64, Level)>>>,
}

impl ScheduledInput {
    pub fn new(clock: &VirtualClock, idle: Level) -> Self {
        Self {
            clock: clock.clone(),
            idle,
            schedule: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Switch to `level` at absolute time `at_us`
    pub fn schedule(&self, at_us: u64, level: Level) {
        let mut schedule = self.schedule.borrow_mut();
        let index = schedule.partition_point(|&(t, _)| t <= at_us);
        schedule.insert(index, (at_us, level));
    }

    /// Switch to `level` now
    pub fn set(&self, level: Level) {
        self.schedule(self.clock.now_us(), level);
    }

    /// Level at the current virtual time
    pub fn level(&self) -> Level {
        self.level_at(self.clock.now_us())
    }

    fn level_at(&self, at_us: u64) -> Level {
        self.schedule
            .borrow()
            .iter()
            .take_while(|&&(t, _)| t <= at_us)
            .last()
            .map(|&(_, level)| level)
            .unwrap_or(self.idle)
    }

    /// Scheduled switches in `since_us` (exclusive) up to now
    fn switches_since(&self, since_us: u64) -> Vec<Level> {
        let now = self.clock.now_us();
        self.schedule
            .borrow()
            .iter()
            .filter(|&&(t, _)| t > since_us && t <= now)
            .map(|&(_, level)| level)
            .collect()
    }

    /// Whether the line was at `level` at any point since `since_us`
    fn reached_since(&self, since_us: u64, level: Level) -> bool {
        self.level_at(since_us) == level || self.switches_since(since_us).contains(&level)
    }

    /// Whether the line changed to `to` (any level if `None`) since `since_us`
    fn edge_since(&self, since_us: u64, to: Option<Level>) -> bool {
        let mut previous = self.level_at(since_us);
        for level in self.switches_since(since_us) {
            if level != previous && to.map_or(true, |to| to == level) {
                return true;
            }
            previous = level;
        }
        false
    }

    /// Pend until `done` holds, latching anything seen since the first poll
    async fn wait_until(&self, done: impl Fn(&Self, u64) -> bool) -> Result<(), Infallible> {
        let since = self.clock.now_us();
        poll_fn(|cx| {
            if done(self, since) {
                Poll::Ready(Ok(()))
            } else {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        })
        .await
    }
}

impl PinErrorType for ScheduledInput {
    type Error = Infallible;
}

impl InputPin for ScheduledInput {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.level() == Level::High)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(self.level() == Level::Low)
    }
}

/// Waits never advance the clock. They resolve once the clock has been moved
/// past a matching level or edge, even one that has already passed again.
impl Wait for ScheduledInput {
    async fn wait_for_high(&mut self) -> Result<(), Infallible> {
        self.wait_until(|pin, since| pin.reached_since(since, Level::High))
            .await
    }

    async fn wait_for_low(&mut self) -> Result<(), Infallible> {
        self.wait_until(|pin, since| pin.reached_since(since, Level::Low))
            .await
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Infallible> {
        self.wait_until(|pin, since| pin.edge_since(since, Some(Level::High)))
            .await
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Infallible> {
        self.wait_until(|pin, since| pin.edge_since(since, Some(Level::Low)))
            .await
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Infallible> {
        self.wait_until(|pin, since| pin.edge_since(since, None))
            .await
    }
}

// ============================================================================
// Byte streams
// ============================================================================

#[derive(Debug, Default)]
struct StreamState {
    rx: VecDeque<(u64, u8)>,
    tx: Vec<u8>,
    closed: bool,
    fail_writes: bool,
}

impl StreamState {
    fn push_at(&mut self, at_us: u64, byte: u8) {
        let index = self.rx.partition_point(|&(t, _)| t <= at_us);
        self.rx.insert(index, (at_us, byte));
    }

    fn ready(&self, now: u64) -> bool {
        self.rx.front().is_some_and(|&(t, _)| t <= now)
    }

    /// Copy every byte that has arrived by `now` into `buf`
    fn drain_into(&mut self, now: u64, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() && self.ready(now) {
            if let Some((_, byte)) = self.rx.pop_front() {
                buf[n] = byte;
                n += 1;
            }
        }
        n
    }
}

/// Byte stream with timed arrivals
///
/// Reads return bytes whose arrival time has passed. A read with nothing
/// arrived yet fast-forwards the clock to the next arrival. Once closed and
/// drained, reads return `Ok(0)` like a TCP peer hanging up.
#[derive(Debug, Clone)]
pub struct MockStream {
    clock: VirtualClock,
    state: Rc<RefCell<StreamState>>,
}

impl MockStream {
    pub fn new(clock: &VirtualClock) -> Self {
        Self {
            clock: clock.clone(),
            state: Rc::new(RefCell::new(StreamState::default())),
        }
    }

    /// Queue bytes arriving now
    pub fn push(&self, bytes: &[u8]) {
        let now = self.clock.now_us();
        let mut state = self.state.borrow_mut();
        for &byte in bytes {
            state.push_at(now, byte);
        }
    }

    /// Queue a byte arriving at absolute time `at_us`
    pub fn push_at(&self, at_us: u64, byte: u8) {
        self.state.borrow_mut().push_at(at_us, byte);
    }

    /// Bytes written so far
    pub fn written(&self) -> Vec<u8> {
        self.state.borrow().tx.clone()
    }

    /// Bytes written so far, clearing the capture
    pub fn take_written(&self) -> Vec<u8> {
        core::mem::take(&mut self.state.borrow_mut().tx)
    }

    /// Bytes queued but not yet read, arrived or not
    pub fn pending(&self) -> usize {
        self.state.borrow().rx.len()
    }

    /// Hang up: once queued bytes are read, reads return end of stream
    pub fn close(&self) {
        self.state.borrow_mut().closed = true;
    }

    /// Make every further write fail with `BrokenPipe`
    pub fn fail_writes(&self) {
        self.state.borrow_mut().fail_writes = true;
    }
}

impl ErrorType for MockStream {
    type Error = ErrorKind;
}

impl ReadReady for MockStream {
    fn read_ready(&mut self) -> Result<bool, ErrorKind> {
        let state = self.state.borrow();
        Ok(state.ready(self.clock.now_us()) || (state.closed && state.rx.is_empty()))
    }
}

impl Read for MockStream {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.state.borrow_mut();
        match state.rx.front() {
            Some(&(at, _)) => {
                let now = self.clock.now_us();
                if at > now {
                    self.clock.advance_us(at - now);
                }
                Ok(state.drain_into(self.clock.now_us(), buf))
            }
            None if state.closed => Ok(0),
            // Nothing will ever arrive
            None => Err(ErrorKind::TimedOut),
        }
    }
}

impl Write for MockStream {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(ErrorKind::BrokenPipe);
        }
        state.tx.extend_from_slice(buf);
        Ok(buf.len())
    }
}

// ============================================================================
// Simulated typewriter
// ============================================================================

/// Timing of the simulated typewriter's handshake
#[derive(Debug, Clone, Copy)]
pub struct TypewriterTiming {
    /// Delay from a byte being written to the handshake line falling
    pub ack_delay_us: u64,
    /// Duration of the handshake low pulse
    pub ack_pulse_us: u64,
    /// Delay from the end of the second handshake to the first response byte
    pub response_delay_us: u64,
}

impl Default for TypewriterTiming {
    fn default() -> Self {
        Self {
            ack_delay_us: 2100,
            ack_pulse_us: 200,
            response_delay_us: 500,
        }
    }
}

#[derive(Debug, Default)]
struct TypewriterState {
    rx: StreamState,
    received: Vec<u8>,
    commands: Vec<(u8, u8)>,
    pending_first: Option<u8>,
    /// Scripted answers, each a list of `(gap_us, byte)`
    responses: VecDeque<Vec<(u64, u8)>>,
    /// Bytes left to acknowledge; `None` acknowledges forever
    acks_left: Option<usize>,
}

/// Simulated half-duplex typewriter
///
/// Acknowledges every byte written to its serial port with a low pulse on
/// its handshake line. Once both bytes of a command arrived and the command
/// expects an answer (`first & 0xF0 == 0xA0`), the next scripted response is
/// played back on the serial port.
#[derive(Debug, Clone)]
pub struct SimulatedTypewriter {
    clock: VirtualClock,
    timing: TypewriterTiming,
    state: Rc<RefCell<TypewriterState>>,
    handshake: ScheduledInput,
    reset: RecordingPin,
}

impl SimulatedTypewriter {
    pub fn new(clock: &VirtualClock) -> Self {
        Self::with_timing(clock, TypewriterTiming::default())
    }

    pub fn with_timing(clock: &VirtualClock, timing: TypewriterTiming) -> Self {
        Self {
            clock: clock.clone(),
            timing,
            state: Rc::new(RefCell::new(TypewriterState::default())),
            handshake: ScheduledInput::new(clock, Level::High),
            reset: RecordingPin::new(clock, Level::Low),
        }
    }

    /// Serial port as seen from the bridge
    pub fn serial(&self) -> TypewriterSerial {
        TypewriterSerial {
            device: self.clone(),
        }
    }

    /// Handshake line driven by the typewriter (`from_device`)
    pub fn handshake_line(&self) -> ScheduledInput {
        self.handshake.clone()
    }

    /// Reset line driven by the bridge (`to_device`)
    pub fn reset_line(&self) -> RecordingPin {
        self.reset.clone()
    }

    /// Queue an answer for the next qualifying command
    ///
    /// The first byte follows the second handshake after
    /// `response_delay_us`; each later byte follows its predecessor by
    /// `gap_us`.
    pub fn respond(&self, bytes: &[u8], gap_us: u64) {
        let script = bytes
            .iter()
            .enumerate()
            .map(|(i, &b)| (if i == 0 { 0 } else { gap_us }, b))
            .collect();
        self.state.borrow_mut().responses.push_back(script);
    }

    /// Queue an answer with explicit gaps before each byte
    pub fn respond_timed(&self, script: &[(u64, u8)]) {
        self.state.borrow_mut().responses.push_back(script.to_vec());
    }

    /// Send a byte outside any transaction, arriving now
    pub fn emit(&self, byte: u8) {
        let now = self.clock.now_us();
        self.state.borrow_mut().rx.push_at(now, byte);
    }

    /// Send a byte outside any transaction at absolute time `at_us`
    pub fn emit_at(&self, at_us: u64, byte: u8) {
        self.state.borrow_mut().rx.push_at(at_us, byte);
    }

    /// Stop acknowledging after `count` more bytes
    pub fn stop_acknowledging_after(&self, count: usize) {
        self.state.borrow_mut().acks_left = Some(count);
    }

    /// Resume acknowledging every byte
    pub fn acknowledge_all(&self) {
        self.state.borrow_mut().acks_left = None;
    }

    /// Raw bytes received on the serial port
    pub fn received(&self) -> Vec<u8> {
        self.state.borrow().received.clone()
    }

    /// Complete commands received
    pub fn commands(&self) -> Vec<(u8, u8)> {
        self.state.borrow().commands.clone()
    }

    /// Bytes still queued on the serial port towards the bridge
    pub fn pending_output(&self) -> usize {
        self.state.borrow().rx.rx.len()
    }

    fn on_byte(&self, byte: u8) {
        let now = self.clock.now_us();
        let mut state = self.state.borrow_mut();
        state.received.push(byte);

        let acknowledge = match state.acks_left {
            None => true,
            Some(0) => false,
            Some(ref mut n) => {
                *n -= 1;
                true
            }
        };
        let fall = now + self.timing.ack_delay_us;
        let rise = fall + self.timing.ack_pulse_us;
        if acknowledge {
            self.handshake.schedule(fall, Level::Low);
            self.handshake.schedule(rise, Level::High);
        }

        match state.pending_first.take() {
            None => state.pending_first = Some(byte),
            Some(first) => {
                state.commands.push((first, byte));
                if acknowledge && first & 0xF0 == 0xA0 {
                    if let Some(script) = state.responses.pop_front() {
                        let mut at = rise + self.timing.response_delay_us;
                        for (gap, b) in script {
                            at += gap;
                            state.rx.push_at(at, b);
                        }
                    }
                }
            }
        }
    }
}

/// Serial port of a [`SimulatedTypewriter`]
#[derive(Debug, Clone)]
pub struct TypewriterSerial {
    device: SimulatedTypewriter,
}

impl ErrorType for TypewriterSerial {
    type Error = ErrorKind;
}

impl ReadReady for TypewriterSerial {
    fn read_ready(&mut self) -> Result<bool, ErrorKind> {
        let now = self.device.clock.now_us();
        Ok(self.device.state.borrow().rx.ready(now))
    }
}

impl Read for TypewriterSerial {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
        if buf.is_empty() {
            return Ok(0);
        }
        let clock = &self.device.clock;
        let mut state = self.device.state.borrow_mut();
        let Some(&(at, _)) = state.rx.rx.front() else {
            return Err(ErrorKind::TimedOut);
        };
        if at > clock.now_us() {
            clock.advance_us(at - clock.now_us());
        }
        Ok(state.rx.drain_into(clock.now_us(), buf))
    }
}

impl Write for TypewriterSerial {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
        for &byte in buf {
            self.device.on_byte(byte);
        }
        Ok(buf.len())
    }
}

// ============================================================================
// Keyboard matrix
// ============================================================================

/// Simulated 32-line keyboard matrix behind a 5-bit multiplexer
#[derive(Debug, Clone, Default)]
pub struct KeyMatrix {
    pressed: Rc<Cell<u32>>,
    address: Rc<Cell<u8>>,
}

impl KeyMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self, line: u8) {
        self.pressed.set(self.pressed.get() | (1 << (line & 31)));
    }

    pub fn release(&self, line: u8) {
        self.pressed.set(self.pressed.get() & !(1 << (line & 31)));
    }

    pub fn set_pressed(&self, mask: u32) {
        self.pressed.set(mask);
    }

    /// Address currently selected on the bus
    pub fn address(&self) -> u8 {
        self.address.get()
    }

    /// The five address pins, bit 0 first
    pub fn address_pins(&self) -> [AddressLine; 5] {
        core::array::from_fn(|bit| AddressLine {
            bit: bit as u8,
            address: self.address.clone(),
        })
    }

    /// The multiplexed sense line
    pub fn sense_line(&self) -> SenseLine {
        SenseLine {
            matrix: self.clone(),
        }
    }
}

/// One address pin of a [`KeyMatrix`]
#[derive(Debug, Clone)]
pub struct AddressLine {
    bit: u8,
    address: Rc<Cell<u8>>,
}

impl PinErrorType for AddressLine {
    type Error = Infallible;
}

impl OutputPin for AddressLine {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.address.set(self.address.get() & !(1 << self.bit));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.address.set(self.address.get() | (1 << self.bit));
        Ok(())
    }
}

/// Sense line of a [`KeyMatrix`]
#[derive(Debug, Clone)]
pub struct SenseLine {
    matrix: KeyMatrix,
}

impl PinErrorType for SenseLine {
    type Error = Infallible;
}

impl InputPin for SenseLine {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        let line = self.matrix.address.get() & 31;
        Ok(self.matrix.pressed.get() & (1 << line) != 0)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::AddressBus;
    use core::pin::pin;
    use embassy_futures::{block_on, poll_once};
    use std::vec;

    #[test]
    fn test_delay_advances_clock() {
        let clock = VirtualClock::new();
        let mut delay = clock.delay();
        block_on(delay.delay_us(2300));
        block_on(delay.delay_ms(1));
        assert_eq!(clock.now_us(), 3300);
        assert_eq!(clock.now_ms(), 3);
    }

    #[test]
    fn test_recording_pin_pulses() {
        let clock = VirtualClock::new();
        let mut pin = RecordingPin::new(&clock, Level::High);
        pin.set_high().unwrap();
        clock.advance_us(10);
        pin.set_low().unwrap();
        clock.advance_us(1000);
        pin.set_high().unwrap();

        assert_eq!(pin.transitions(), vec![(10, Level::Low), (1010, Level::High)]);
        assert_eq!(pin.low_pulses(), vec![(10, 1000)]);
        assert_eq!(pin.level(), Level::High);
    }

    #[test]
    fn test_scheduled_input_follows_time() {
        let clock = VirtualClock::new();
        let mut input = ScheduledInput::new(&clock, Level::High);
        input.schedule(100, Level::Low);
        input.schedule(300, Level::High);

        assert!(input.is_high().unwrap());
        clock.advance_us(150);
        assert!(input.is_low().unwrap());
        clock.advance_us(150);
        assert!(input.is_high().unwrap());
    }

    #[test]
    fn test_wait_latches_pulse_between_polls() {
        let clock = VirtualClock::new();
        let input = ScheduledInput::new(&clock, Level::High);
        input.schedule(100, Level::Low);
        input.schedule(103, Level::High);

        let mut low = input.clone();
        let mut wait = pin!(low.wait_for_low());
        assert!(poll_once(wait.as_mut()).is_pending());
        clock.advance_us(200);
        assert_eq!(input.level(), Level::High);
        assert!(poll_once(wait.as_mut()).is_ready());
    }

    #[test]
    fn test_wait_for_edges() {
        let clock = VirtualClock::new();
        let input = ScheduledInput::new(&clock, Level::High);
        input.schedule(100, Level::Low);
        input.schedule(103, Level::High);

        let mut rising = input.clone();
        let mut rise = pin!(rising.wait_for_rising_edge());
        assert!(poll_once(rise.as_mut()).is_pending());
        clock.advance_us(101);
        assert!(poll_once(rise.as_mut()).is_pending());
        clock.advance_us(2);
        assert!(poll_once(rise.as_mut()).is_ready());

        // Both edges passed before the wait started
        let mut falling = input.clone();
        let mut fall = pin!(falling.wait_for_falling_edge());
        clock.advance_us(1000);
        assert!(poll_once(fall.as_mut()).is_pending());
    }

    #[test]
    fn test_stream_readiness_and_close() {
        let clock = VirtualClock::new();
        let mut stream = MockStream::new(&clock);
        stream.push_at(500, 0x42);

        assert!(!stream.read_ready().unwrap());
        clock.advance_us(500);
        assert!(stream.read_ready().unwrap());

        let mut buf = [0u8; 4];
        assert_eq!(block_on(stream.read(&mut buf)), Ok(1));
        assert_eq!(buf[0], 0x42);

        stream.close();
        assert!(stream.read_ready().unwrap());
        assert_eq!(block_on(stream.read(&mut buf)), Ok(0));
    }

    #[test]
    fn test_stream_write_capture_and_failure() {
        let clock = VirtualClock::new();
        let mut stream = MockStream::new(&clock);
        block_on(stream.write_all(&[1, 2, 3])).unwrap();
        assert_eq!(stream.take_written(), vec![1, 2, 3]);
        assert!(stream.written().is_empty());

        stream.fail_writes();
        assert_eq!(block_on(stream.write(&[4])), Err(ErrorKind::BrokenPipe));
    }

    #[test]
    fn test_typewriter_acknowledges_and_answers() {
        let clock = VirtualClock::new();
        let typewriter = SimulatedTypewriter::new(&clock);
        typewriter.respond(&[0x05], 0);
        let mut serial = typewriter.serial();
        let mut handshake = typewriter.handshake_line();

        block_on(serial.write_all(&[0xA4])).unwrap();
        assert!(handshake.is_high().unwrap());
        clock.advance_us(2200);
        assert!(handshake.is_low().unwrap());
        clock.advance_us(200);
        assert!(handshake.is_high().unwrap());

        block_on(serial.write_all(&[0x00])).unwrap();
        assert_eq!(typewriter.commands(), vec![(0xA4, 0x00)]);
        assert!(!serial.read_ready().unwrap());

        clock.advance_us(2100 + 200 + 500);
        assert!(serial.read_ready().unwrap());
        let mut buf = [0u8; 1];
        assert_eq!(block_on(serial.read(&mut buf)), Ok(1));
        assert_eq!(buf[0], 0x05);
    }

    #[test]
    fn test_typewriter_stops_acknowledging() {
        let clock = VirtualClock::new();
        let typewriter = SimulatedTypewriter::new(&clock);
        typewriter.stop_acknowledging_after(0);
        let mut serial = typewriter.serial();
        let mut handshake = typewriter.handshake_line();

        block_on(serial.write_all(&[0x10])).unwrap();
        clock.advance_ms(10);
        assert!(handshake.is_high().unwrap());
    }

    #[test]
    fn test_key_matrix_through_address_bus() {
        let matrix = KeyMatrix::new();
        matrix.press(3);
        matrix.press(17);
        let mut bus = matrix.address_pins();
        let mut sense = matrix.sense_line();

        bus.select(17);
        assert_eq!(matrix.address(), 17);
        assert!(sense.is_high().unwrap());

        bus.select(4);
        assert!(sense.is_low().unwrap());
    }
}
