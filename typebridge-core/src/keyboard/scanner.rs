//! 32-line keyboard matrix behind a 5-bit multiplexer
//!
//! The matrix lines are selected one at a time through an address bus and
//! read back on a single sense line. A scan walks all 32 addresses and packs
//! the readings into a [`KeyboardSnapshot`], bit `n` for line `n`.

use embedded_hal::digital::InputPin;
use embedded_hal_async::delay::DelayNs;

use typebridge_hal::AddressBus;
use typebridge_protocol::KeyboardSnapshot;

use crate::traits::KeyScanner;

/// Scanner timing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScannerConfig {
    /// Delay between selecting an address and sampling; 0 samples at once
    pub settle_us: u32,
}

/// Keyboard matrix scanner
///
/// Stateless between scans: every scan drives the full address range.
pub struct MatrixScanner<A, I, D> {
    address: A,
    sense: I,
    delay: D,
    config: ScannerConfig,
}

impl<A, I, D> MatrixScanner<A, I, D>
where
    A: AddressBus,
    I: InputPin,
    D: DelayNs,
{
    pub fn new(address: A, sense: I, delay: D, config: ScannerConfig) -> Self {
        Self {
            address,
            sense,
            delay,
            config,
        }
    }

    /// Sample every matrix line
    ///
    /// A line whose sense read fails is reported inactive.
    pub async fn scan(&mut self) -> KeyboardSnapshot {
        let mut snapshot = KeyboardSnapshot::default();
        let lines = self.address.span().min(u32::from(KeyboardSnapshot::LINES)) as u8;
        for line in 0..lines {
            self.address.select(line);
            if self.config.settle_us > 0 {
                self.delay.delay_us(self.config.settle_us).await;
            }
            snapshot.set(line, self.sense.is_high().unwrap_or(false));
        }
        snapshot
    }
}

impl<A, I, D> KeyScanner for MatrixScanner<A, I, D>
where
    A: AddressBus,
    I: InputPin,
    D: DelayNs,
{
    async fn scan(&mut self) -> KeyboardSnapshot {
        MatrixScanner::scan(self).await
    }
}
