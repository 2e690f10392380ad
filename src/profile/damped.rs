use super::Reading;
use crate::motor::{ControlMode, MotorControl};

/// Free between `min` and `max` with a little drag, hard stops outside.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(super) struct Damped {
    min: f32,
    max: f32,
}

impl Damped {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn set_range(&mut self, min: f32, max: f32) {
        self.min = min;
        self.max = max;
    }

    pub fn tick(&mut self, reading: Reading, mc: &mut MotorControl) {
        if self.min == self.max {
            return;
        }

        let p = reading.position;
        *mc = if p > self.max {
            MotorControl::new(ControlMode::Angle, self.max)
        } else if p < self.min {
            MotorControl::new(ControlMode::Angle, self.min)
        } else {
            MotorControl::new(ControlMode::Velocity, 0.)
        };
    }
}
