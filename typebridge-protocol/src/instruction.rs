//! Inbound framing, client to bridge
//!
//! Two framings exist, selected by configuration:
//!
//! - [`InboundMode::Explicit`]: an opcode byte leads each instruction.
//!   `0x01 first second` issues a command, `0x02` requests a keyboard scan.
//! - [`InboundMode::Implicit`]: every two bytes form a command. Keyboard
//!   scans are pushed by the bridge on a timer.

use heapless::Vec;

use crate::command::Command;

/// Explicit-mode opcode issuing a command
pub const OP_COMMAND: u8 = 0x01;

/// Explicit-mode opcode requesting a keyboard scan
pub const OP_SCAN: u8 = 0x02;

/// Longest encoded instruction
pub const MAX_INSTRUCTION_SIZE: usize = 3;

/// How client bytes are framed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InboundMode {
    /// Opcode-prefixed instructions, scans on request
    #[default]
    Explicit,
    /// Bare command pairs, scans pushed periodically
    Implicit,
}

impl InboundMode {
    /// Whether the bridge pushes keyboard scans without being asked
    pub fn pushes_scans(self) -> bool {
        self == InboundMode::Implicit
    }
}

/// Errors from instruction encoding or decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InstructionError {
    /// Leading byte is not a known opcode (explicit mode)
    UnknownOpcode(u8),
    /// Scans cannot be requested in implicit mode
    ScanNotSupported,
}

/// A decoded client instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Instruction {
    /// Forward a command to the typewriter
    Command(Command),
    /// Scan the keyboard matrix
    Scan,
}

impl Instruction {
    /// Encode this instruction for the given framing
    pub fn encode(
        &self,
        mode: InboundMode,
    ) -> Result<Vec<u8, MAX_INSTRUCTION_SIZE>, InstructionError> {
        // Capacity covers every instruction, pushes cannot fail
        let mut out = Vec::new();
        match (mode, self) {
            (InboundMode::Explicit, Instruction::Command(cmd)) => {
                let _ = out.extend_from_slice(&[OP_COMMAND, cmd.first, cmd.second]);
            }
            (InboundMode::Explicit, Instruction::Scan) => {
                let _ = out.push(OP_SCAN);
            }
            (InboundMode::Implicit, Instruction::Command(cmd)) => {
                let _ = out.extend_from_slice(&cmd.to_bytes());
            }
            (InboundMode::Implicit, Instruction::Scan) => {
                return Err(InstructionError::ScanNotSupported);
            }
        }
        Ok(out)
    }
}

impl From<Command> for Instruction {
    fn from(cmd: Command) -> Self {
        Instruction::Command(cmd)
    }
}

/// State machine decoding the client-to-bridge stream
///
/// Partial instructions survive between calls, so an instruction split
/// across several reads is reassembled.
#[derive(Debug, Clone)]
pub struct InstructionDecoder {
    mode: InboundMode,
    state: DecodeState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Waiting for an opcode (explicit) or a first command byte (implicit)
    Idle,
    /// Got `0x01`, waiting for the first command byte
    First,
    /// Waiting for the second command byte
    Second(u8),
}

impl InstructionDecoder {
    pub fn new(mode: InboundMode) -> Self {
        Self {
            mode,
            state: DecodeState::Idle,
        }
    }

    pub fn mode(&self) -> InboundMode {
        self.mode
    }

    /// Reset the decoder state
    pub fn reset(&mut self) {
        self.state = DecodeState::Idle;
    }

    /// Whether the decoder is between instructions
    pub fn is_idle(&self) -> bool {
        self.state == DecodeState::Idle
    }

    /// Feed a single byte to the decoder
    ///
    /// Returns `Ok(Some(instruction))` when an instruction is complete,
    /// `Ok(None)` when more bytes are needed. An unknown opcode is reported
    /// and dropped; decoding resumes with the next byte.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Instruction>, InstructionError> {
        match (self.mode, self.state) {
            (InboundMode::Explicit, DecodeState::Idle) => match byte {
                OP_COMMAND => {
                    self.state = DecodeState::First;
                    Ok(None)
                }
                OP_SCAN => Ok(Some(Instruction::Scan)),
                other => Err(InstructionError::UnknownOpcode(other)),
            },
            (InboundMode::Implicit, DecodeState::Idle) | (_, DecodeState::First) => {
                self.state = DecodeState::Second(byte);
                Ok(None)
            }
            (_, DecodeState::Second(first)) => {
                self.state = DecodeState::Idle;
                Ok(Some(Instruction::Command(Command::new(first, byte))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(
        mode: InboundMode,
        bytes: &[u8],
    ) -> Vec<Result<Instruction, InstructionError>, 8> {
        let mut decoder = InstructionDecoder::new(mode);
        let mut out = Vec::new();
        for &byte in bytes {
            match decoder.feed(byte) {
                Ok(Some(instruction)) => out.push(Ok(instruction)).unwrap(),
                Ok(None) => {}
                Err(e) => out.push(Err(e)).unwrap(),
            }
        }
        out
    }

    #[test]
    fn test_explicit_command_and_scan() {
        let decoded = decode_all(InboundMode::Explicit, &[0x01, 0xA4, 0x00, 0x02]);
        assert_eq!(
            &decoded[..],
            &[
                Ok(Instruction::Command(Command::new(0xA4, 0x00))),
                Ok(Instruction::Scan)
            ]
        );
    }

    #[test]
    fn test_explicit_opcode_bytes_inside_command() {
        // 0x02 as a command operand is not a scan request
        let decoded = decode_all(InboundMode::Explicit, &[0x01, 0x02, 0x01]);
        assert_eq!(
            &decoded[..],
            &[Ok(Instruction::Command(Command::new(0x02, 0x01)))]
        );
    }

    #[test]
    fn test_explicit_unknown_opcode_dropped() {
        let decoded = decode_all(InboundMode::Explicit, &[0x7E, 0x01, 0x10, 0x20]);
        assert_eq!(
            &decoded[..],
            &[
                Err(InstructionError::UnknownOpcode(0x7E)),
                Ok(Instruction::Command(Command::new(0x10, 0x20)))
            ]
        );
    }

    #[test]
    fn test_implicit_pairs() {
        let decoded = decode_all(InboundMode::Implicit, &[0x01, 0x02, 0xA4, 0x00, 0x10]);
        assert_eq!(
            &decoded[..],
            &[
                Ok(Instruction::Command(Command::new(0x01, 0x02))),
                Ok(Instruction::Command(Command::new(0xA4, 0x00)))
            ]
        );
    }

    #[test]
    fn test_split_instruction_survives() {
        let mut decoder = InstructionDecoder::new(InboundMode::Explicit);
        assert_eq!(decoder.feed(0x01), Ok(None));
        assert!(!decoder.is_idle());
        assert_eq!(decoder.feed(0xC0), Ok(None));
        assert_eq!(
            decoder.feed(0x0C),
            Ok(Some(Instruction::Command(Command::new(0xC0, 0x0C))))
        );
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_encode() {
        let cmd = Instruction::Command(Command::new(0xA0, 0x00));
        assert_eq!(&cmd.encode(InboundMode::Explicit).unwrap()[..], &[0x01, 0xA0, 0x00]);
        assert_eq!(&cmd.encode(InboundMode::Implicit).unwrap()[..], &[0xA0, 0x00]);
        assert_eq!(&Instruction::Scan.encode(InboundMode::Explicit).unwrap()[..], &[0x02]);
        assert_eq!(
            Instruction::Scan.encode(InboundMode::Implicit),
            Err(InstructionError::ScanNotSupported)
        );
    }
}
