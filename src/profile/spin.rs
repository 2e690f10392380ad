use crate::motor::{ControlMode, MotorControl};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(super) struct Spin {
    velocity: f32,
}

impl Spin {
    pub fn new(velocity: f32) -> Self {
        Self { velocity }
    }

    pub fn tick(&mut self, mc: &mut MotorControl) {
        *mc = MotorControl::new(ControlMode::Velocity, self.velocity);
    }
}
