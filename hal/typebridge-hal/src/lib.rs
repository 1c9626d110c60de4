//! Typebridge Hardware Abstraction Layer
//!
//! This crate defines the small set of hardware seams the bridge needs on top
//! of `embedded-hal` and `embedded-io-async`. Chip-specific wiring lives in the
//! firmware crate; host tests use the doubles in [`mock`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  typebridge-core (link, scanner, mux)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  typebridge-hal (this crate - traits)   │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  typebridge-  │       │  hal::mock    │
//! │   firmware    │       │  (host tests) │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`gpio::AddressBus`] - Multi-line address selection
//! - [`serial::ByteStream`] - Async byte stream with readiness polling
//! - [`time::Clock`] - Monotonic millisecond clock

#![no_std]
#![deny(unsafe_code)]

#[cfg(any(test, feature = "mock"))]
extern crate std;

pub mod gpio;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod serial;
pub mod time;

// Re-export key traits at crate root for convenience
pub use gpio::{AddressBus, Level};
pub use serial::{ByteStream, SerialConfig};
pub use time::Clock;
