use super::{Pulse, Reading};
use crate::motor::{ControlMode, MotorControl};

/// Returns to `center`; pushing past the dead band either way reports a
/// single pulse.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(super) struct Spring {
    center: f32,
    up: f32,
    down: f32,
    value: i32,
    last_report: i32,
}

impl Spring {
    pub fn new(center: f32, minimal_movement: f32) -> Self {
        Self {
            center,
            up: center - minimal_movement,
            down: center + minimal_movement,
            value: 0,
            last_report: 0,
        }
    }

    pub fn enable(&mut self) {
        self.value = 0;
        self.last_report = 0;
    }

    pub fn tick(&mut self, reading: Reading, mc: &mut MotorControl) {
        let p = reading.position;
        self.value = if p < self.up {
            1
        } else if p > self.down {
            -1
        } else {
            0
        };

        mc.mode = ControlMode::Angle;
        mc.target = self.center;
    }

    /// Pulse on entering either side; returning to the dead band is silent.
    pub fn report(&mut self) -> Option<Pulse> {
        if self.value == self.last_report {
            return None;
        }
        self.last_report = self.value;
        Pulse::from_value(self.value)
    }
}
