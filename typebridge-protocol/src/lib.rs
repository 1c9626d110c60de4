//! Typebridge Wire Protocol
//!
//! This crate defines the byte-level protocol between the bridge firmware and
//! its single network client, and the data model shared by both ends.
//!
//! # Protocol Overview
//!
//! Bridge to client, one tagged frame per event:
//! ```text
//! ┌──────────┬──────────────────────┐
//! │ 0x01     │ device byte (1B)     │  unsolicited device byte
//! ├──────────┼──────────────────────┤
//! │ 0x02     │ snapshot (4B, BE)    │  keyboard matrix scan
//! ├──────────┼──────────────────────┤
//! │ 0x80|len │ payload (0-127B)     │  response to a command
//! └──────────┴──────────────────────┘
//! ```
//!
//! Client to bridge, in explicit mode:
//! ```text
//! 0x01 first second   issue command
//! 0x02                request keyboard scan
//! ```
//!
//! In implicit mode every pair of bytes is a command and the bridge pushes
//! keyboard scans on its own schedule.

#![no_std]
#![deny(unsafe_code)]

pub mod command;
pub mod frame;
pub mod instruction;

pub use command::{Command, KeyboardSnapshot, Response, RESPONSE_CAPACITY, RESPONSE_SENTINEL};
pub use frame::{
    BridgeFrame, FrameDecoder, FrameError, MAX_FRAME_SIZE, RESPONSE_FLAG, TAG_DEVICE_BYTE,
    TAG_KEYBOARD,
};
pub use instruction::{
    InboundMode, Instruction, InstructionDecoder, InstructionError, OP_COMMAND, OP_SCAN,
};
