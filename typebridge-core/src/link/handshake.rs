//! Bounded waits on the handshake line

use core::future::{ready, Future};
use core::pin::pin;

use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;

use typebridge_hal::Level;

/// Outcome of a failed wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitError {
    Timeout,
    Pin,
}

/// Wait until `pin` reaches `level`
///
/// One edge wait stays armed for the whole bound, so a pulse shorter than
/// `poll_interval_us` is still seen. The bound is the sum of the delay
/// steps, so the wait never exceeds `timeout_us` of delay regardless of
/// how the executor schedules us.
pub(crate) async fn wait_for_level<I: Wait, D: DelayNs>(
    pin: &mut I,
    level: Level,
    timeout_us: u32,
    poll_interval_us: u32,
    delay: &mut D,
) -> Result<(), WaitError> {
    match level {
        Level::Low => race(pin.wait_for_low(), timeout_us, poll_interval_us, delay).await,
        Level::High => race(pin.wait_for_high(), timeout_us, poll_interval_us, delay).await,
    }
}

async fn race<F, E, D>(
    wait: F,
    timeout_us: u32,
    poll_interval_us: u32,
    delay: &mut D,
) -> Result<(), WaitError>
where
    F: Future<Output = Result<(), E>>,
    D: DelayNs,
{
    let mut wait = pin!(wait);
    let step = poll_interval_us.max(1);
    let mut waited = 0u32;
    loop {
        if waited >= timeout_us {
            // A level reached during the last step still counts
            return match select(wait.as_mut(), ready(())).await {
                Either::First(result) => result.map_err(|_| WaitError::Pin),
                Either::Second(()) => Err(WaitError::Timeout),
            };
        }
        match select(wait.as_mut(), delay.delay_us(step)).await {
            Either::First(result) => return result.map_err(|_| WaitError::Pin),
            Either::Second(()) => waited = waited.saturating_add(step),
        }
    }
}
