use super::Reading;
use crate::{
    motor::{ControlMode, MotorControl},
    util::math::TWO_PI,
};

/// 12 teeth per turn
const TOOTH: f32 = TWO_PI / 12.;

/// Turns one way only: the hold point advances a tooth at a time and never
/// comes back.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(super) struct Ratchet {
    last_angle: f32,
}

impl Ratchet {
    pub fn enable(&mut self, reading: Reading) {
        self.last_angle = reading.position;
    }

    pub fn tick(&mut self, reading: Reading, mc: &mut MotorControl) {
        mc.mode = ControlMode::Angle;
        mc.target = self.last_angle;

        if reading.position - self.last_angle > TOOTH {
            self.last_angle += TOOTH;
        }
    }
}
