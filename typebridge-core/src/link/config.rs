//! Device link timing configuration

/// When the reset line is pulsed after a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetPolicy {
    /// After every completed transaction
    #[default]
    Always,
    /// Only after commands the typewriter answers
    ResponseOnly,
}

/// Device link timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// Bound on each half of a handshake pulse
    pub handshake_timeout_us: u32,
    /// Bound on the first response byte
    pub response_timeout_us: u32,
    /// Step in which handshake and response timeouts are counted
    ///
    /// Handshake edges are latched between steps; only the first response
    /// byte is polled at this rate.
    pub poll_interval_us: u32,
    /// Silence window ending a multi-byte response
    pub continuation_window_us: u32,
    /// Width of the low pulse on the reset line
    pub reset_pulse_us: u32,
    pub reset_policy: ResetPolicy,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_us: 500_000,
            response_timeout_us: 500_000,
            poll_interval_us: 10,
            continuation_window_us: 2300,
            reset_pulse_us: 1000,
            reset_policy: ResetPolicy::Always,
        }
    }
}
