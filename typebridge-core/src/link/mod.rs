//! Half-duplex link to the typewriter
//!
//! A transaction sends two opcode bytes, each acknowledged by a low pulse on
//! the device's handshake line. Commands with a first opcode in
//! `0xA0..=0xAF` are answered: one byte, or, when that byte is the sentinel
//! `0xA4`, a burst that ends when the line stays silent for one continuation
//! window. The bridge then pulses its own reset line low.
//!
//! ```text
//!   serial   ──[first]──────────[second]─────────<answer...>─────
//!   from_dev ─────────┐ ┌────────────────┐ ┌──────────────────────
//!                     └─┘                └─┘
//!   to_dev   ───────────────────────────────────────────┐  ┌─────
//!                                                       └──┘ ~1ms
//! ```

mod config;
mod error;
mod handshake;

pub use config::{LinkConfig, ResetPolicy};
pub use error::{HandshakeStage, LinkError};

use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;

use typebridge_hal::serial::error_kind;
use typebridge_hal::{ByteStream, Level};
use typebridge_protocol::{Command, Response, RESPONSE_CAPACITY, RESPONSE_SENTINEL};

use crate::traits::DeviceChannel;
use handshake::{wait_for_level, WaitError};

/// Owner of the typewriter's serial port and control lines
pub struct DeviceLink<S, O, I, D> {
    serial: S,
    to_device: O,
    from_device: I,
    delay: D,
    config: LinkConfig,
}

impl<S, O, I, D> DeviceLink<S, O, I, D>
where
    S: ByteStream,
    O: OutputPin,
    I: Wait,
    D: DelayNs,
{
    /// Take ownership of the link and drive the reset line to idle
    pub fn new(
        serial: S,
        to_device: O,
        from_device: I,
        delay: D,
        config: LinkConfig,
    ) -> Result<Self, LinkError> {
        let mut link = Self {
            serial,
            to_device,
            from_device,
            delay,
            config,
        };
        link.release()?;
        Ok(link)
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Execute one command transaction
    ///
    /// The returned response holds every byte captured, in order; it is
    /// empty for commands the typewriter does not answer.
    pub async fn send_command(&mut self, command: Command) -> Result<Response, LinkError> {
        let mut response = Response::new();
        let result = self.exchange(command, &mut response).await;

        let pulse = match result {
            Ok(()) | Err(LinkError::ResponseTimeout) | Err(LinkError::ResponseOverflow { .. }) => {
                match self.config.reset_policy {
                    ResetPolicy::Always => true,
                    ResetPolicy::ResponseOnly => command.expects_response(),
                }
            }
            Err(_) => false,
        };

        if pulse {
            self.pulse_reset().await?;
        } else {
            self.release()?;
        }

        result.map(|()| response)
    }

    /// Take one byte the typewriter sent outside a transaction
    pub async fn poll_unsolicited(&mut self) -> Result<Option<u8>, LinkError> {
        self.try_read_byte().await
    }

    async fn exchange(
        &mut self,
        command: Command,
        response: &mut Response,
    ) -> Result<(), LinkError> {
        self.write_byte(command.first).await?;
        self.wait_pulse(HandshakeStage::FirstFall, HandshakeStage::FirstRise)
            .await?;
        self.write_byte(command.second).await?;
        self.wait_pulse(HandshakeStage::SecondFall, HandshakeStage::SecondRise)
            .await?;

        if !command.expects_response() {
            return Ok(());
        }

        let first = self.read_with_timeout().await?;
        // Empty response, cannot be full
        let _ = response.push(first);
        if first != RESPONSE_SENTINEL {
            return Ok(());
        }

        loop {
            self.delay
                .delay_us(self.config.continuation_window_us)
                .await;
            let Some(byte) = self.try_read_byte().await? else {
                return Ok(());
            };
            if response.push(byte).is_err() {
                self.drain().await?;
                return Err(LinkError::ResponseOverflow {
                    captured: response.len() as u8,
                });
            }
        }
    }

    /// Wait for one full low pulse on the handshake line
    async fn wait_pulse(
        &mut self,
        fall: HandshakeStage,
        rise: HandshakeStage,
    ) -> Result<(), LinkError> {
        self.wait_level(Level::Low, fall).await?;
        self.wait_level(Level::High, rise).await
    }

    async fn wait_level(&mut self, level: Level, stage: HandshakeStage) -> Result<(), LinkError> {
        wait_for_level(
            &mut self.from_device,
            level,
            self.config.handshake_timeout_us,
            self.config.poll_interval_us,
            &mut self.delay,
        )
        .await
        .map_err(|e| match e {
            WaitError::Timeout => LinkError::HandshakeTimeout { stage },
            WaitError::Pin => LinkError::Pin,
        })
    }

    async fn write_byte(&mut self, byte: u8) -> Result<(), LinkError> {
        self.serial.write_all(&[byte]).await.map_err(error_kind)?;
        self.serial.flush().await.map_err(error_kind)?;
        Ok(())
    }

    /// Read one byte if one is waiting
    async fn try_read_byte(&mut self) -> Result<Option<u8>, LinkError> {
        if !self.serial.read_ready().map_err(error_kind)? {
            return Ok(None);
        }
        let mut buf = [0u8; 1];
        let n = self.serial.read(&mut buf).await.map_err(error_kind)?;
        Ok((n == 1).then_some(buf[0]))
    }

    /// Read one byte, waiting at most `response_timeout_us`
    async fn read_with_timeout(&mut self) -> Result<u8, LinkError> {
        let step = self.config.poll_interval_us.max(1);
        let mut waited = 0u32;
        loop {
            if let Some(byte) = self.try_read_byte().await? {
                return Ok(byte);
            }
            if waited >= self.config.response_timeout_us {
                return Err(LinkError::ResponseTimeout);
            }
            self.delay.delay_us(step).await;
            waited = waited.saturating_add(step);
        }
    }

    /// Discard the rest of an oversized burst
    ///
    /// Bounded to one more buffer's worth of windows so a stuck line cannot
    /// hold the link forever.
    async fn drain(&mut self) -> Result<(), LinkError> {
        for _ in 0..RESPONSE_CAPACITY {
            self.delay
                .delay_us(self.config.continuation_window_us)
                .await;
            if self.try_read_byte().await?.is_none() {
                break;
            }
        }
        Ok(())
    }

    async fn pulse_reset(&mut self) -> Result<(), LinkError> {
        self.to_device.set_low().map_err(|_| LinkError::Pin)?;
        self.delay.delay_us(self.config.reset_pulse_us).await;
        self.release()
    }

    /// Return the reset line to idle
    fn release(&mut self) -> Result<(), LinkError> {
        self.to_device.set_high().map_err(|_| LinkError::Pin)
    }
}

impl<S, O, I, D> DeviceChannel for DeviceLink<S, O, I, D>
where
    S: ByteStream,
    O: OutputPin,
    I: Wait,
    D: DelayNs,
{
    async fn poll_unsolicited(&mut self) -> Result<Option<u8>, LinkError> {
        DeviceLink::poll_unsolicited(self).await
    }

    async fn transact(&mut self, command: Command) -> Result<Response, LinkError> {
        self.send_command(command).await
    }
}
