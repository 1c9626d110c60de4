//! On-board LED of the Pico W
//!
//! The LED hangs off the radio chip, so every change goes through
//! `cyw43::Control`.

use cyw43::Control;
use embassy_time::Timer;

use typebridge_core::traits::StatusIndicator;

/// Radio GPIO wired to the LED
const LED_GPIO: u8 = 0;

/// On and off time of one pulse
const PULSE_MS: u64 = 250;

/// Blink counts marking boot progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStage {
    RadioUp = 1,
    Joined = 2,
    Listening = 3,
}

pub struct WifiLed<'a> {
    control: &'a mut Control<'static>,
}

impl<'a> WifiLed<'a> {
    pub fn new(control: &'a mut Control<'static>) -> Self {
        Self { control }
    }

    pub async fn set(&mut self, on: bool) {
        self.control.gpio_set(LED_GPIO, on).await;
    }

    pub async fn blink(&mut self, times: u8) {
        for _ in 0..times {
            self.pulse().await;
        }
    }

    pub async fn stage(&mut self, stage: BootStage) {
        self.blink(stage as u8).await;
    }
}

impl StatusIndicator for WifiLed<'_> {
    async fn pulse(&mut self) {
        self.set(true).await;
        Timer::after_millis(PULSE_MS).await;
        self.set(false).await;
        Timer::after_millis(PULSE_MS).await;
    }
}
