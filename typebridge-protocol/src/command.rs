//! Data model shared by the bridge and its client
//!
//! - [`Command`]: two opcode bytes sent to the typewriter
//! - [`Response`]: bytes the typewriter answered with
//! - [`KeyboardSnapshot`]: one bit per keyboard matrix line

use heapless::Vec;

/// Maximum number of bytes in a response
///
/// The response frame header carries the length in its low seven bits.
pub const RESPONSE_CAPACITY: usize = 127;

/// First response byte announcing a multi-byte answer
pub const RESPONSE_SENTINEL: u8 = 0xA4;

/// A command for the typewriter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    pub first: u8,
    pub second: u8,
}

impl Command {
    pub const fn new(first: u8, second: u8) -> Self {
        Self { first, second }
    }

    /// Split a 16-bit command word, high byte first
    pub const fn from_word(word: u16) -> Self {
        Self {
            first: (word >> 8) as u8,
            second: word as u8,
        }
    }

    /// Join both opcodes into a 16-bit command word
    pub const fn to_word(self) -> u16 {
        (self.first as u16) << 8 | self.second as u16
    }

    /// Whether the typewriter answers this command
    ///
    /// Only opcodes in the `0xA0..=0xAF` range produce a response.
    pub const fn expects_response(self) -> bool {
        self.first & 0xF0 == 0xA0
    }

    /// Both opcodes in transmission order
    pub const fn to_bytes(self) -> [u8; 2] {
        [self.first, self.second]
    }
}

impl From<u16> for Command {
    fn from(word: u16) -> Self {
        Self::from_word(word)
    }
}

/// Response captured from the typewriter
///
/// Holds exactly the bytes captured, in capture order. The length can never
/// exceed [`RESPONSE_CAPACITY`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    payload: Vec<u8, RESPONSE_CAPACITY>,
}

impl Response {
    /// An empty response
    pub const fn new() -> Self {
        Self {
            payload: Vec::new(),
        }
    }

    /// Build a response from captured bytes
    ///
    /// Returns `None` if `bytes` exceeds [`RESPONSE_CAPACITY`].
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        Vec::from_slice(bytes).ok().map(|payload| Self { payload })
    }

    /// Append a captured byte
    ///
    /// Returns the byte back if the response is full.
    pub fn push(&mut self, byte: u8) -> Result<(), u8> {
        self.payload.push(byte)
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.payload
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Response {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Response({=[u8]:x})", self.as_slice())
    }
}

/// State of the 32-line keyboard matrix
///
/// Bit `n` is set when matrix line `n` reads high.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardSnapshot(pub u32);

impl KeyboardSnapshot {
    /// Number of matrix lines
    pub const LINES: u8 = 32;

    /// Snapshot with the given lines set; lines above 31 are ignored
    pub fn from_lines(lines: &[u8]) -> Self {
        let mut snapshot = Self::default();
        for &line in lines {
            snapshot.set(line, true);
        }
        snapshot
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn set(&mut self, line: u8, active: bool) {
        if line >= Self::LINES {
            return;
        }
        if active {
            self.0 |= 1 << line;
        } else {
            self.0 &= !(1 << line);
        }
    }

    pub fn is_pressed(self, line: u8) -> bool {
        line < Self::LINES && self.0 & (1 << line) != 0
    }

    /// Active lines in ascending order
    pub fn pressed_lines(self) -> impl Iterator<Item = u8> {
        (0..Self::LINES).filter(move |&line| self.is_pressed(line))
    }

    /// Transmission order, most significant byte first
    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    pub fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }
}
