//! Client end of a bridge connection
//!
//! The bridge answers every command with exactly one response frame, but
//! device bytes and pushed scans may arrive at any time, including while a
//! response is awaited. Such frames are queued and handed out as
//! [`Event`]s.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};
use typebridge_protocol::{
    BridgeFrame, Command, FrameDecoder, InboundMode, Instruction, KeyboardSnapshot, Response,
};

use crate::commands::TypewriterCommand;
use crate::error::{ClientError, Result};

/// Read timeout set on connected sockets
///
/// Short so [`BridgeClient::poll_event`] returns promptly; blocking calls
/// retry until [`BridgeClient::response_timeout`].
pub const POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Default bound on waiting for a frame
///
/// Covers the bridge's worst case of four handshake timeouts plus a
/// response timeout.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Frame the bridge sent without being asked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Byte the typewriter sent on its own
    DeviceByte(u8),
    /// Keyboard scan pushed by the bridge
    Keyboard(KeyboardSnapshot),
}

/// Connection to a bridge
pub struct BridgeClient<S> {
    stream: S,
    mode: InboundMode,
    decoder: FrameDecoder,
    inbox: VecDeque<u8>,
    events: VecDeque<Event>,
    response_timeout: Duration,
}

impl BridgeClient<TcpStream> {
    /// Connect to a bridge listening at `addr`
    pub fn connect<A: ToSocketAddrs>(addr: A, mode: InboundMode) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(POLL_TIMEOUT))?;
        debug!(peer = ?stream.peer_addr().ok(), ?mode, "connected to bridge");
        Ok(Self::new(stream, mode))
    }
}

impl<S: Read + Write> BridgeClient<S> {
    /// Wrap an established stream
    ///
    /// `mode` must match the bridge's configured framing. Reads that fail
    /// with `WouldBlock` or `TimedOut` count as "nothing yet".
    pub fn new(stream: S, mode: InboundMode) -> Self {
        Self {
            stream,
            mode,
            decoder: FrameDecoder::new(),
            inbox: VecDeque::new(),
            events: VecDeque::new(),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    pub fn mode(&self) -> InboundMode {
        self.mode
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    pub fn set_response_timeout(&mut self, timeout: Duration) {
        self.response_timeout = timeout;
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Send one command and wait for its response
    pub fn send(&mut self, command: Command) -> Result<Response> {
        self.write_instruction(Instruction::Command(command))?;
        loop {
            match self.next_frame()? {
                BridgeFrame::Response(response) => {
                    trace!(?command, len = response.len(), "response");
                    return Ok(response);
                }
                other => self.queue(other),
            }
        }
    }

    /// Encode and send a typewriter command
    pub fn execute(&mut self, command: &TypewriterCommand) -> Result<Response> {
        self.send(command.encode()?)
    }

    /// Send commands in order, concatenating their response payloads
    pub fn send_all<'a, I>(&mut self, commands: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = &'a TypewriterCommand>,
    {
        let mut payload = Vec::new();
        for command in commands {
            payload.extend_from_slice(self.execute(command)?.as_slice());
        }
        Ok(payload)
    }

    /// Ask the bridge for a keyboard scan
    ///
    /// Only available in explicit mode; in implicit mode scans are pushed
    /// and arrive through [`next_event`](Self::next_event).
    pub fn request_scan(&mut self) -> Result<KeyboardSnapshot> {
        self.write_instruction(Instruction::Scan)?;
        loop {
            match self.next_frame()? {
                BridgeFrame::Keyboard(snapshot) => return Ok(snapshot),
                BridgeFrame::DeviceByte(byte) => self.events.push_back(Event::DeviceByte(byte)),
                BridgeFrame::Response(response) => {
                    warn!(len = response.len(), "unexpected response frame dropped");
                }
            }
        }
    }

    /// Next unsolicited frame, waiting up to the response timeout
    pub fn next_event(&mut self) -> Result<Event> {
        if let Some(event) = self.events.pop_front() {
            return Ok(event);
        }
        loop {
            let frame = self.next_frame()?;
            if let Some(event) = Self::as_event(frame) {
                return Ok(event);
            }
        }
    }

    /// Next unsolicited frame if one is already available
    pub fn poll_event(&mut self) -> Result<Option<Event>> {
        if let Some(event) = self.events.pop_front() {
            return Ok(Some(event));
        }
        loop {
            while let Some(frame) = self.decode_buffered()? {
                if let Some(event) = Self::as_event(frame) {
                    return Ok(Some(event));
                }
            }
            if !self.fill_inbox()? {
                return Ok(None);
            }
        }
    }

    fn write_instruction(&mut self, instruction: Instruction) -> Result<()> {
        let bytes = instruction.encode(self.mode)?;
        self.stream.write_all(&bytes)?;
        self.stream.flush()?;
        trace!(?instruction, "sent");
        Ok(())
    }

    fn queue(&mut self, frame: BridgeFrame) {
        if let Some(event) = Self::as_event(frame) {
            self.events.push_back(event);
        }
    }

    fn as_event(frame: BridgeFrame) -> Option<Event> {
        match frame {
            BridgeFrame::DeviceByte(byte) => Some(Event::DeviceByte(byte)),
            BridgeFrame::Keyboard(snapshot) => Some(Event::Keyboard(snapshot)),
            BridgeFrame::Response(response) => {
                warn!(len = response.len(), "unexpected response frame dropped");
                None
            }
        }
    }

    /// Read until a whole frame is decoded
    fn next_frame(&mut self) -> Result<BridgeFrame> {
        let deadline = Instant::now() + self.response_timeout;
        loop {
            if let Some(frame) = self.decode_buffered()? {
                return Ok(frame);
            }
            if !self.fill_inbox()? && Instant::now() >= deadline {
                return Err(ClientError::Timeout(self.response_timeout));
            }
        }
    }

    /// Decode one frame from bytes already read
    fn decode_buffered(&mut self) -> Result<Option<BridgeFrame>> {
        while let Some(byte) = self.inbox.pop_front() {
            if let Some(frame) = self.decoder.feed(byte)? {
                trace!(?frame, "frame");
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }

    /// Read whatever the stream has; false if nothing was available
    fn fill_inbox(&mut self) -> Result<bool> {
        let mut buf = [0u8; 256];
        match self.stream.read(&mut buf) {
            Ok(0) => Err(ClientError::Closed),
            Ok(n) => {
                self.inbox.extend(&buf[..n]);
                Ok(true)
            }
            Err(e) if is_retryable(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_retryable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
