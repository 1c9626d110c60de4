//! GPIO abstractions
//!
//! Single pins come straight from `embedded-hal`. This module adds the
//! logic-level type shared by the handshake code and the address bus used by
//! the keyboard matrix multiplexer.

use embedded_hal::digital::OutputPin;

/// Logic level of a digital line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    /// Logic 0
    Low,
    /// Logic 1
    High,
}

/// Parallel address bus
///
/// Drives `WIDTH` output lines to the binary representation of an address.
/// Bit 0 of the address maps to the first line.
pub trait AddressBus {
    /// Number of address lines
    const WIDTH: u32;

    /// Drive the bus to `address`
    ///
    /// Bits above `WIDTH` are ignored.
    fn select(&mut self, address: u8);

    /// Number of distinct addresses this bus can select
    fn span(&self) -> u32 {
        1 << Self::WIDTH
    }
}

// Any array of output pins is an address bus, one pin per bit.
impl<P: OutputPin, const N: usize> AddressBus for [P; N] {
    const WIDTH: u32 = N as u32;

    fn select(&mut self, address: u8) {
        for (bit, pin) in self.iter_mut().enumerate() {
            let high = (address as u32 >> bit) & 1 == 1;
            // GPIO writes on the supported chips are infallible
            let _ = pin.set_state(high.into());
        }
    }
}
