//! Rotor position sensing.
//!
//! [`AngleSensor`] is the raw hardware contract, a magnetic encoder reporting
//! the shaft angle within one revolution. [`EncoderState`] turns those bounded
//! samples into an unbounded position and a velocity estimate.

mod as5600;
mod state;

pub use as5600::As5600;
pub use state::EncoderState;

/// Absolute shaft angle source.
pub trait AngleSensor {
    type Error: core::fmt::Debug;

    /// Mechanical angle in rad, within `[0, 2π)`
    ///
    /// Must be cheap enough to be called twice per control tick.
    fn bounded_angle(&mut self) -> Result<f32, Self::Error>;
}

impl<S: AngleSensor + ?Sized> AngleSensor for &mut S {
    type Error = S::Error;

    fn bounded_angle(&mut self) -> Result<f32, Self::Error> {
        (**self).bounded_angle()
    }
}
