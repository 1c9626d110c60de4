//! Typebridge - Typewriter to TCP bridge firmware
//!
//! Runs on a Raspberry Pi Pico W wired to a legacy electronic typewriter:
//! its handshake-gated serial link and its keyboard matrix are relayed to a
//! single TCP client.
//!
//! Pin map:
//!
//! | GPIO   | Signal                                   |
//! |--------|------------------------------------------|
//! | 4, 5   | UART1 TX/RX to the typewriter (inverted) |
//! | 6      | Reset line to the typewriter, idles high |
//! | 7      | Handshake line from the typewriter       |
//! | 10..14 | Keyboard matrix address, bit 0 first     |
//! | 15     | Keyboard matrix sense                    |

#![no_std]
#![no_main]

use cyw43::JoinOptions;
use cyw43_pio::{PioSpi, DEFAULT_CLOCK_DIVIDER};
use defmt::*;
use embassy_executor::Spawner;
use embassy_net::StackResources;
use embassy_rp::bind_interrupts;
use embassy_rp::clocks::RoscRng;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::{PIO0, UART1};
use embassy_rp::pio::{InterruptHandler as PioInterruptHandler, Pio};
use embassy_rp::uart::{
    BufferedInterruptHandler, Config as UartConfig, DataBits, Parity, StopBits, Uart,
};
use embassy_time::{Delay, Timer};
use rand_core::RngCore;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use typebridge_core::keyboard::MatrixScanner;
use typebridge_core::link::DeviceLink;
use typebridge_core::session::Multiplexer;
use typebridge_hal::serial::{self, SerialConfig};

use crate::clock::EmbassyClock;
use crate::status::{BootStage, WifiLed};

mod clock;
mod config;
mod status;
mod tasks;

bind_interrupts!(struct Irqs {
    UART1_IRQ => BufferedInterruptHandler<UART1>;
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
});

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

static CYW43_STATE: StaticCell<cyw43::State> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();

/// Delay between failed join attempts
const JOIN_RETRY_MS: u64 = 2000;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Typebridge firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    let config = config::load();

    // Radio
    let fw = include_bytes!("../cyw43-firmware/43439A0.bin");
    let clm = include_bytes!("../cyw43-firmware/43439A0_clm.bin");

    let pwr = Output::new(p.PIN_23, Level::Low);
    let cs = Output::new(p.PIN_25, Level::High);
    let mut pio = Pio::new(p.PIO0, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        p.PIN_24,
        p.PIN_29,
        p.DMA_CH0,
    );

    let state = CYW43_STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw).await;
    spawner.spawn(unwrap!(tasks::cyw43_task(runner)));

    control.init(clm).await;
    control
        .set_power_management(cyw43::PowerManagementMode::PowerSave)
        .await;
    WifiLed::new(&mut control).stage(BootStage::RadioUp).await;
    info!("Radio initialized");

    // Typewriter link
    let serial_config = SerialConfig::default();
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = serial_config.baudrate;
    uart_config.data_bits = match serial_config.data_bits {
        serial::DataBits::Seven => DataBits::DataBits7,
        serial::DataBits::Eight => DataBits::DataBits8,
    };
    uart_config.parity = match serial_config.parity {
        serial::Parity::None => Parity::ParityNone,
        serial::Parity::Even => Parity::ParityEven,
        serial::Parity::Odd => Parity::ParityOdd,
    };
    uart_config.stop_bits = match serial_config.stop_bits {
        serial::StopBits::One => StopBits::STOP1,
        serial::StopBits::Two => StopBits::STOP2,
    };
    uart_config.invert_tx = serial_config.inverted;
    uart_config.invert_rx = serial_config.inverted;

    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);
    let uart = Uart::new_blocking(p.UART1, p.PIN_4, p.PIN_5, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);

    let to_device = Output::new(p.PIN_6, Level::High);
    let from_device = Input::new(p.PIN_7, Pull::None);

    let link = match DeviceLink::new(uart, to_device, from_device, Delay, config.link) {
        Ok(link) => link,
        Err(e) => defmt::panic!("Typewriter link setup failed: {}", e),
    };
    info!(
        "Typewriter link on UART1 at {} baud, reset policy {}",
        serial_config.baudrate, config.link.reset_policy
    );

    // Keyboard matrix
    let address = [
        Output::new(p.PIN_10, Level::Low),
        Output::new(p.PIN_11, Level::Low),
        Output::new(p.PIN_12, Level::Low),
        Output::new(p.PIN_13, Level::Low),
        Output::new(p.PIN_14, Level::Low),
    ];
    let sense = Input::new(p.PIN_15, Pull::None);
    let scanner = MatrixScanner::new(address, sense, Delay, config.keyboard);
    info!("Keyboard matrix initialized");

    let bridge = Multiplexer::new(link, scanner, EmbassyClock, Delay, config.session);

    // Network stack
    let net_config = embassy_net::Config::dhcpv4(Default::default());
    let seed = RoscRng.next_u64();
    let (stack, runner) = embassy_net::new(
        net_device,
        net_config,
        NET_RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.spawn(unwrap!(tasks::net_task(runner)));

    let network = &config.network;
    if !network.is_configured() {
        error!("No SSID in bridge.toml, not joining any network");
        loop {
            WifiLed::new(&mut control).blink(5).await;
            Timer::after_secs(5).await;
        }
    }

    loop {
        let options = if network.is_open() {
            JoinOptions::new_open()
        } else {
            JoinOptions::new(network.password.as_bytes())
        };
        match control.join(network.ssid.as_str(), options).await {
            Ok(()) => break,
            Err(e) => {
                warn!("Join of {} failed with status {}", network.ssid.as_str(), e.status);
                Timer::after_millis(JOIN_RETRY_MS).await;
            }
        }
    }
    info!("Joined {}", network.ssid.as_str());
    WifiLed::new(&mut control).stage(BootStage::Joined).await;

    info!("Waiting for DHCP...");
    stack.wait_config_up().await;
    if let Some(v4) = stack.config_v4() {
        info!("IP address {}", v4.address.address());
    }
    WifiLed::new(&mut control).stage(BootStage::Listening).await;

    spawner.spawn(unwrap!(tasks::bridge_task(
        stack,
        control,
        bridge,
        network.port
    )));

    info!("All tasks spawned, firmware running");
    loop {
        Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
