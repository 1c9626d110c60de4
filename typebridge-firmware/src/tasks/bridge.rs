//! Accept loop
//!
//! Serves one client at a time. While a session runs no other connection is
//! accepted; when it ends the socket is closed and the listener re-armed.

use cyw43::Control;
use defmt::*;
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_rp::gpio::{Input, Output};
use embassy_rp::uart::BufferedUart;
use embassy_time::Delay;

use typebridge_core::keyboard::MatrixScanner;
use typebridge_core::link::DeviceLink;
use typebridge_core::session::{Activity, Multiplexer, SessionStats};

use crate::clock::EmbassyClock;
use crate::status::WifiLed;

/// Socket buffer sizes
const RX_BUFFER_SIZE: usize = 1024;
const TX_BUFFER_SIZE: usize = 1024;

pub type Link = DeviceLink<BufferedUart, Output<'static>, Input<'static>, Delay>;
pub type Scanner = MatrixScanner<[Output<'static>; 5], Input<'static>, Delay>;
pub type Bridge = Multiplexer<Link, Scanner, EmbassyClock, Delay>;

#[embassy_executor::task]
pub async fn bridge_task(
    stack: Stack<'static>,
    mut control: Control<'static>,
    mut bridge: Bridge,
    port: u16,
) -> ! {
    info!("Bridge task started, mode {}", bridge.config().mode);

    let mut rx_buffer = [0u8; RX_BUFFER_SIZE];
    let mut tx_buffer = [0u8; TX_BUFFER_SIZE];

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(None);

        bridge.listen();
        info!("Listening on TCP:{}", port);
        if let Err(e) = socket.accept(port).await {
            warn!("Accept error: {:?}", e);
            bridge.reset();
            continue;
        }
        info!("Client connected from {:?}", socket.remote_endpoint());

        let mut led = WifiLed::new(&mut control);
        let session = bridge.attach(&mut socket, &mut led).await;
        let (reason, stats) = session.run(log_activity).await;

        info!("Client disconnected: {}", reason);
        log_stats(&stats);

        socket.close();
        let _ = socket.flush().await;
        socket.abort();
        bridge.reset();
    }
}

fn log_activity(activity: &Activity) {
    match activity {
        Activity::Relayed(byte) => trace!("Relayed device byte {=u8:#x}", byte),
        Activity::ScanPushed(snapshot) => trace!("Pushed scan {}", snapshot),
        Activity::ScanRequested(snapshot) => debug!("Scan requested: {}", snapshot),
        Activity::Answered { command, length } => {
            debug!("Command {} answered with {} bytes", command, length)
        }
        Activity::CommandFailed { command, error } if error.is_timeout() => {
            warn!("Typewriter not responding to {}: {}", command, error)
        }
        Activity::CommandFailed { command, error } => {
            warn!("Command {} failed: {}", command, error)
        }
        Activity::Malformed(byte) => warn!("Dropped malformed byte {=u8:#x}", byte),
        Activity::DeviceFault(error) => warn!("Device fault: {}", error),
    }
}

fn log_stats(stats: &SessionStats) {
    info!(
        "Session: {} commands ({} failed), {} relayed, {} scans pushed, {} requested, {} malformed",
        stats.commands,
        stats.failed_commands,
        stats.relayed,
        stats.scans_pushed,
        stats.scans_requested,
        stats.malformed
    );
    if stats.device_faults > 0 {
        warn!("Session saw {} device faults", stats.device_faults);
    }
}
