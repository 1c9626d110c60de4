//! Embassy async tasks

pub mod bridge;
pub mod network;

pub use bridge::{bridge_task, Bridge};
pub use network::{cyw43_task, net_task, RadioSpi};
