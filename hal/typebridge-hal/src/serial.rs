//! Serial byte stream abstractions
//!
//! Both ends of the bridge are byte streams: the UART towards the typewriter
//! and the TCP socket towards the client. The bridge polls them without
//! blocking, so a stream must also report whether a read would complete
//! immediately.

use embedded_io_async::{ErrorKind, Read, ReadReady, Write};

/// Async byte stream with readiness polling
///
/// Implemented for anything providing `embedded-io-async` reads and writes
/// plus `ReadReady`, which covers `embassy_rp::uart::BufferedUart` and
/// `embassy_net::tcp::TcpSocket`.
pub trait ByteStream: Read + Write + ReadReady {}

impl<T: Read + Write + ReadReady> ByteStream for T {}

/// Reduce a stream error to its portable kind
pub fn error_kind<E: embedded_io_async::Error>(err: E) -> ErrorKind {
    err.kind()
}

/// Serial line configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SerialConfig {
    /// Baud rate in bits per second
    pub baudrate: u32,
    /// Number of data bits
    pub data_bits: DataBits,
    /// Parity mode
    pub parity: Parity,
    /// Number of stop bits
    pub stop_bits: StopBits,
    /// Invert TX and RX logic levels
    ///
    /// The typewriter idles its data line low, so the UART pins run inverted.
    pub inverted: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baudrate: 4800,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            inverted: true,
        }
    }
}

/// Number of data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataBits {
    Seven,
    Eight,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    One,
    Two,
}
