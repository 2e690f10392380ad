/// Microsecond timestamp used across the control loop.
pub type Instant = fugit::Instant<u64, 1, 1_000_000>;

/// Microsecond duration matching [`Instant`].
pub type Duration = fugit::Duration<u64, 1, 1_000_000>;

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Seconds elapsed from `earlier` to `later`.
///
/// Negative when the clock went backwards, callers substitute their own
/// nominal dt in that case.
pub fn elapsed_secs(later: Instant, earlier: Instant) -> f32 {
    let micros = later.ticks() as i64 - earlier.ticks() as i64;
    micros as f32 * 1e-6
}
