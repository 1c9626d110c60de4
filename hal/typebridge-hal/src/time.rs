//! Monotonic time source

/// Monotonic clock
///
/// Used by the session loop to decide when a periodic keyboard scan is due.
/// Delays are expressed through `embedded_hal_async::delay::DelayNs`.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin
    fn now_ms(&self) -> u64;

    /// Milliseconds elapsed since `earlier`, saturating at zero
    fn elapsed_since(&self, earlier: u64) -> u64 {
        self.now_ms().saturating_sub(earlier)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
