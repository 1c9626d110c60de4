//! Board-agnostic bridge logic
//!
//! This crate contains everything between the pins and the socket that does
//! not depend on a specific board:
//!
//! - Device link: the handshake-gated half-duplex exchange with the typewriter
//! - Keyboard matrix scanner
//! - Session multiplexer merging device bytes, scans and client commands
//! - Configuration types and the `bridge.toml` parser

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod keyboard;
pub mod link;
pub mod session;
pub mod traits;
