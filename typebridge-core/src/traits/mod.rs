//! Seams between the session loop and its collaborators
//!
//! The multiplexer only talks to these traits, so it can be driven by the
//! real link and scanner on the board and by simple doubles in tests.

use typebridge_protocol::{Command, KeyboardSnapshot, Response};

use crate::link::LinkError;

/// Half-duplex channel to the typewriter
#[allow(async_fn_in_trait)]
pub trait DeviceChannel {
    /// Take one byte the device sent outside any transaction
    ///
    /// Never waits; returns `Ok(None)` if nothing is pending.
    async fn poll_unsolicited(&mut self) -> Result<Option<u8>, LinkError>;

    /// Run one complete command transaction
    async fn transact(&mut self, command: Command) -> Result<Response, LinkError>;
}

/// Source of keyboard matrix snapshots
#[allow(async_fn_in_trait)]
pub trait KeyScanner {
    async fn scan(&mut self) -> KeyboardSnapshot;
}

/// Lifecycle indicator, typically an LED
#[allow(async_fn_in_trait)]
pub trait StatusIndicator {
    /// Emit one visible pulse
    async fn pulse(&mut self);
}

/// Indicator that shows nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndicator;

impl StatusIndicator for NoIndicator {
    async fn pulse(&mut self) {}
}

impl<T: DeviceChannel + ?Sized> DeviceChannel for &mut T {
    async fn poll_unsolicited(&mut self) -> Result<Option<u8>, LinkError> {
        (**self).poll_unsolicited().await
    }

    async fn transact(&mut self, command: Command) -> Result<Response, LinkError> {
        (**self).transact(command).await
    }
}

impl<T: KeyScanner + ?Sized> KeyScanner for &mut T {
    async fn scan(&mut self) -> KeyboardSnapshot {
        (**self).scan().await
    }
}
