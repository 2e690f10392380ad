use super::{Pulse, Reading};
use crate::motor::{ControlMode, MotorControl};

/// Two position toggle with a snap-assisted dead band around `center`.
///
/// Below `center - distance / 2` the knob snaps to `on`, above
/// `center + distance / 2` to `off`, in between the target is pushed away
/// from the center at twice the offset.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(super) struct Switch {
    center: f32,
    distance: f32,
    state: bool,
    last_report: bool,
}

impl Switch {
    pub fn new(center: f32, distance: f32) -> Self {
        Self {
            center,
            distance,
            state: false,
            last_report: false,
        }
    }

    pub fn enable(&mut self) {
        self.state = false;
        self.last_report = false;
    }

    #[cfg(test)]
    pub fn is_on(&self) -> bool {
        self.state
    }

    pub fn tick(&mut self, reading: Reading, mc: &mut MotorControl) {
        mc.mode = ControlMode::Angle;

        let p = reading.position;
        let on = self.center - self.distance;
        let off = self.center + self.distance;

        if p < self.center - self.distance / 2. {
            mc.target = on;
            self.state = true;
        } else if p < self.center + self.distance / 2. {
            mc.target = self.center + (p - self.center) * 2.;
        } else {
            mc.target = off;
            self.state = false;
        }
    }

    /// Decrement when switched on, increment when switched off.
    pub fn report(&mut self) -> Option<Pulse> {
        if self.state == self.last_report {
            return None;
        }
        self.last_report = self.state;
        Some(if self.state {
            Pulse::Decrement
        } else {
            Pulse::Increment
        })
    }
}
