//! Device link errors

use embedded_io_async::ErrorKind;

/// Point of the handshake at which the typewriter stopped responding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HandshakeStage {
    /// Waiting for the line to fall after the first opcode
    FirstFall,
    /// Waiting for the line to rise after the first opcode
    FirstRise,
    /// Waiting for the line to fall after the second opcode
    SecondFall,
    /// Waiting for the line to rise after the second opcode
    SecondRise,
}

/// Errors from a device transaction
///
/// Every variant leaves the reset line at its idle (high) level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Handshake line did not toggle in time
    HandshakeTimeout { stage: HandshakeStage },
    /// Qualifying command got no answer in time
    ResponseTimeout,
    /// Answer longer than the response buffer; the rest was discarded
    ResponseOverflow { captured: u8 },
    /// Serial port failure
    Serial(ErrorKind),
    /// GPIO failure
    Pin,
}

impl LinkError {
    /// Whether the typewriter is unresponsive rather than misbehaving
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            LinkError::HandshakeTimeout { .. } | LinkError::ResponseTimeout
        )
    }
}

impl From<ErrorKind> for LinkError {
    fn from(kind: ErrorKind) -> Self {
        LinkError::Serial(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_unresponsive_device() {
        assert!(LinkError::HandshakeTimeout {
            stage: HandshakeStage::SecondFall
        }
        .is_timeout());
        assert!(LinkError::ResponseTimeout.is_timeout());
        assert!(!LinkError::ResponseOverflow { captured: 127 }.is_timeout());
        assert!(!LinkError::Serial(ErrorKind::Other).is_timeout());
        assert!(!LinkError::Pin.is_timeout());
    }
}
