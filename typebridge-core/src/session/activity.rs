//! What a session sweep did, for logging

use embedded_io_async::ErrorKind;

use typebridge_protocol::{Command, KeyboardSnapshot};

use crate::link::LinkError;

/// One unit of work done by a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Activity {
    /// Unsolicited device byte relayed to the client
    Relayed(u8),
    /// Periodic scan pushed to the client
    ScanPushed(KeyboardSnapshot),
    /// Scan requested by the client and answered
    ScanRequested(KeyboardSnapshot),
    /// Command executed and its response relayed
    Answered { command: Command, length: u8 },
    /// Command failed; an empty response was relayed
    CommandFailed { command: Command, error: LinkError },
    /// Unknown opcode dropped from the client stream
    Malformed(u8),
    /// Device link failed while polling for unsolicited bytes
    DeviceFault(LinkError),
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CloseReason {
    /// Client closed the connection
    ClientDisconnected,
    /// Reading from the client failed
    ReadFailed(ErrorKind),
    /// Writing to the client failed
    WriteFailed(ErrorKind),
}

/// Per-session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionStats {
    pub relayed: u32,
    pub scans_pushed: u32,
    pub scans_requested: u32,
    pub commands: u32,
    pub failed_commands: u32,
    pub malformed: u32,
    pub device_faults: u32,
}

impl SessionStats {
    pub fn record(&mut self, activity: &Activity) {
        let counter = match activity {
            Activity::Relayed(_) => &mut self.relayed,
            Activity::ScanPushed(_) => &mut self.scans_pushed,
            Activity::ScanRequested(_) => &mut self.scans_requested,
            Activity::Answered { .. } => &mut self.commands,
            Activity::CommandFailed { .. } => &mut self.failed_commands,
            Activity::Malformed(_) => &mut self.malformed,
            Activity::DeviceFault(_) => &mut self.device_faults,
        };
        *counter = counter.saturating_add(1);
    }
}
