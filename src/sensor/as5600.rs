use embedded_hal::i2c::I2c;

use super::AngleSensor;
use crate::util::math::TWO_PI;

/// AS5600 12-bit magnetic encoder on I2C.
#[derive(Debug)]
pub struct As5600<I> {
    inner: as5600::As5600<I>,
}

impl<I> As5600<I> {
    /// Counts per revolution
    pub const CPR: u16 = 4096;

    pub fn into_inner(self) -> as5600::As5600<I> {
        self.inner
    }
}

impl<I: I2c> As5600<I> {
    pub fn new(i2c: I) -> Self {
        Self {
            inner: as5600::As5600::new(i2c),
        }
    }
}

impl<I: I2c> AngleSensor for As5600<I> {
    type Error = as5600::error::Error<I::Error>;

    fn bounded_angle(&mut self) -> Result<f32, Self::Error> {
        let raw = self.inner.raw_angle()? % Self::CPR;
        Ok(raw as f32 * TWO_PI / Self::CPR as f32)
    }
}
