//! Client session handling
//!
//! - [`SessionState`]: lifecycle `Idle → AwaitingClient → Active → Closed`
//! - [`Multiplexer`]: owns the device side, hands out one [`Session`] at a time
//! - [`Activity`]: what each sweep did, for the firmware to log

mod activity;
mod multiplexer;
mod state;

pub use activity::{Activity, CloseReason, SessionStats};
pub use multiplexer::{Multiplexer, Session, SessionConfig, Sweep};
pub use state::{SessionEvent, SessionState};
