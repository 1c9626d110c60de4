//! Single-client event loop
//!
//! While a client is attached, each sweep services three sources in a fixed
//! order, emitting at most one frame per source:
//!
//! 1. An unsolicited byte from the typewriter, relayed as `0x01 b`
//! 2. The scan timer (implicit mode only), pushed as `0x02 b3 b2 b1 b0`
//! 3. One client instruction: a command, answered with a response frame,
//!    or a scan request, answered with a keyboard frame
//!
//! A sweep that emitted nothing yields for `idle_poll_us` so the network
//! stack keeps running.

use embedded_hal_async::delay::DelayNs;
use heapless::{Deque, Vec};

use typebridge_hal::serial::error_kind;
use typebridge_hal::{ByteStream, Clock};
use typebridge_protocol::{
    BridgeFrame, InboundMode, Instruction, InstructionDecoder, InstructionError, Response,
};

use super::activity::{Activity, CloseReason, SessionStats};
use super::state::{SessionEvent, SessionState};
use crate::traits::{DeviceChannel, KeyScanner, StatusIndicator};

/// Client bytes buffered between sweeps
const INBOUND_CAPACITY: usize = 64;

/// Activities of one sweep, at most one per source
pub type Sweep = Vec<Activity, 3>;

/// Session behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionConfig {
    /// Client framing
    pub mode: InboundMode,
    /// Period of pushed scans in implicit mode
    pub scan_interval_ms: u32,
    /// Yield after a sweep with nothing to do
    pub idle_poll_us: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: InboundMode::Explicit,
            scan_interval_ms: 100,
            idle_poll_us: 100,
        }
    }
}

/// Owner of the device side of the bridge across sessions
pub struct Multiplexer<L, K, C, D> {
    device: L,
    scanner: K,
    clock: C,
    delay: D,
    config: SessionConfig,
    state: SessionState,
}

impl<L, K, C, D> Multiplexer<L, K, C, D>
where
    L: DeviceChannel,
    K: KeyScanner,
    C: Clock,
    D: DelayNs,
{
    pub fn new(device: L, scanner: K, clock: C, delay: D, config: SessionConfig) -> Self {
        Self {
            device,
            scanner,
            clock,
            delay,
            config,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Arm the listener
    pub fn listen(&mut self) {
        self.state = self.state.transition(SessionEvent::Listen);
    }

    /// Start a session with an accepted client
    ///
    /// Pulses `indicator` once to show the connection.
    pub async fn attach<S, I>(
        &mut self,
        client: S,
        indicator: &mut I,
    ) -> Session<'_, L, K, C, D, S>
    where
        S: ByteStream,
        I: StatusIndicator,
    {
        if self.state == SessionState::Idle {
            self.listen();
        }
        self.state = self.state.transition(SessionEvent::Accept);
        indicator.pulse().await;

        let last_scan_ms = self.clock.now_ms();
        let mode = self.config.mode;
        Session {
            mux: self,
            client,
            decoder: InstructionDecoder::new(mode),
            inbound: Deque::new(),
            last_scan_ms,
            stats: SessionStats::default(),
            closed: None,
        }
    }

    /// Return to `Idle` after a session closed
    pub fn reset(&mut self) {
        self.state = self.state.transition(SessionEvent::Reset);
    }
}

/// One attached client
pub struct Session<'a, L, K, C, D, S> {
    mux: &'a mut Multiplexer<L, K, C, D>,
    client: S,
    decoder: InstructionDecoder,
    inbound: Deque<u8, INBOUND_CAPACITY>,
    last_scan_ms: u64,
    stats: SessionStats,
    closed: Option<CloseReason>,
}

impl<L, K, C, D, S> Session<'_, L, K, C, D, S>
where
    L: DeviceChannel,
    K: KeyScanner,
    C: Clock,
    D: DelayNs,
    S: ByteStream,
{
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn state(&self) -> SessionState {
        self.mux.state
    }

    /// Run sweeps until the client goes away
    pub async fn run<F>(mut self, mut on_activity: F) -> (CloseReason, SessionStats)
    where
        F: FnMut(&Activity),
    {
        loop {
            match self.poll_once().await {
                Ok(sweep) => sweep.iter().for_each(&mut on_activity),
                Err(reason) => return (reason, self.stats),
            }
        }
    }

    /// Run one sweep over all sources
    ///
    /// Returns what was done, or why the session ended. Once closed, every
    /// further call returns the same reason.
    pub async fn poll_once(&mut self) -> Result<Sweep, CloseReason> {
        if let Some(reason) = self.closed {
            return Err(reason);
        }

        match self.sweep().await {
            Ok((sweep, emitted)) => {
                for activity in &sweep {
                    self.stats.record(activity);
                }
                if !emitted {
                    self.mux.delay.delay_us(self.mux.config.idle_poll_us).await;
                }
                Ok(sweep)
            }
            Err(reason) => {
                self.closed = Some(reason);
                self.mux.state = self.mux.state.transition(SessionEvent::Disconnect);
                Err(reason)
            }
        }
    }

    async fn sweep(&mut self) -> Result<(Sweep, bool), CloseReason> {
        let mut sweep = Sweep::new();
        let mut emitted = false;

        // Capacity is one slot per source, pushes below cannot fail
        match self.mux.device.poll_unsolicited().await {
            Ok(Some(byte)) => {
                self.send(&BridgeFrame::DeviceByte(byte)).await?;
                emitted = true;
                let _ = sweep.push(Activity::Relayed(byte));
            }
            Ok(None) => {}
            Err(error) => {
                let _ = sweep.push(Activity::DeviceFault(error));
            }
        }

        if self.mux.config.mode.pushes_scans() && self.scan_due() {
            self.last_scan_ms = self.mux.clock.now_ms();
            let snapshot = self.mux.scanner.scan().await;
            self.send(&BridgeFrame::Keyboard(snapshot)).await?;
            emitted = true;
            let _ = sweep.push(Activity::ScanPushed(snapshot));
        }

        match self.next_instruction().await? {
            Some(Ok(Instruction::Command(command))) => {
                let activity = match self.mux.device.transact(command).await {
                    Ok(response) => {
                        let length = response.len() as u8;
                        self.send(&BridgeFrame::Response(response)).await?;
                        Activity::Answered { command, length }
                    }
                    Err(error) => {
                        // Keep a waiting client from stalling
                        self.send(&BridgeFrame::Response(Response::new())).await?;
                        Activity::CommandFailed { command, error }
                    }
                };
                emitted = true;
                let _ = sweep.push(activity);
            }
            Some(Ok(Instruction::Scan)) => {
                let snapshot = self.mux.scanner.scan().await;
                self.send(&BridgeFrame::Keyboard(snapshot)).await?;
                emitted = true;
                let _ = sweep.push(Activity::ScanRequested(snapshot));
            }
            Some(Err(InstructionError::UnknownOpcode(byte))) => {
                let _ = sweep.push(Activity::Malformed(byte));
            }
            Some(Err(InstructionError::ScanNotSupported)) | None => {}
        }

        Ok((sweep, emitted))
    }

    fn scan_due(&self) -> bool {
        let interval = u64::from(self.mux.config.scan_interval_ms);
        self.mux.clock.elapsed_since(self.last_scan_ms) >= interval
    }

    /// Decode the next client instruction from buffered bytes
    ///
    /// Reads from the client only when the buffer is empty. A partial
    /// instruction stays in the decoder until its remaining bytes arrive.
    async fn next_instruction(
        &mut self,
    ) -> Result<Option<Result<Instruction, InstructionError>>, CloseReason> {
        if self.inbound.is_empty() {
            self.fill_inbound().await?;
        }
        while let Some(byte) = self.inbound.pop_front() {
            match self.decoder.feed(byte) {
                Ok(None) => {}
                Ok(Some(instruction)) => return Ok(Some(Ok(instruction))),
                Err(error) => return Ok(Some(Err(error))),
            }
        }
        Ok(None)
    }

    async fn fill_inbound(&mut self) -> Result<(), CloseReason> {
        let ready = self
            .client
            .read_ready()
            .map_err(|e| CloseReason::ReadFailed(error_kind(e)))?;
        if !ready {
            return Ok(());
        }

        let mut buf = [0u8; INBOUND_CAPACITY];
        let n = self
            .client
            .read(&mut buf)
            .await
            .map_err(|e| CloseReason::ReadFailed(error_kind(e)))?;
        if n == 0 {
            return Err(CloseReason::ClientDisconnected);
        }
        // The buffer was empty and holds INBOUND_CAPACITY bytes
        for &byte in &buf[..n] {
            let _ = self.inbound.push_back(byte);
        }
        Ok(())
    }

    async fn send(&mut self, frame: &BridgeFrame) -> Result<(), CloseReason> {
        let bytes = frame.encode_to_vec();
        self.client
            .write_all(&bytes)
            .await
            .map_err(|e| CloseReason::WriteFailed(error_kind(e)))
    }
}
