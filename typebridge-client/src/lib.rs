//! Host-side client for the Typebridge bridge
//!
//! Connects to the bridge over TCP, sends typewriter commands and receives
//! responses, device bytes and keyboard scans.
//!
//! ```no_run
//! use typebridge_client::{BridgeClient, InboundMode, Typewriter};
//!
//! let client = BridgeClient::connect("192.168.1.50:80", InboundMode::Explicit)?;
//! let mut typewriter = Typewriter::new(client)?;
//! typewriter.print_str("Hello\nWorld")?;
//! typewriter.finish()?;
//! # Ok::<(), typebridge_client::ClientError>(())
//! ```

pub mod client;
pub mod commands;
pub mod error;
pub mod image;
pub mod typewriter;

pub use client::{BridgeClient, Event};
pub use commands::{Control, Direction, Feed, TypewriterCommand};
pub use error::{ClientError, Result};
pub use image::DotImage;
pub use typewriter::Typewriter;
pub use typebridge_protocol::{Command, InboundMode, KeyboardSnapshot, Response};
