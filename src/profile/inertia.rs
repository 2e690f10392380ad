use super::{Pulse, PulseCounter, Reading};
use crate::motor::{ControlMode, MotorControl};

/// Above this velocity jump the hand is pushing the wheel
const PUSH: f32 = 1.;
/// Below this velocity drop the hand is braking the wheel
const BRAKE: f32 = -2.;
/// Velocity lost per tick while coasting
const FRICTION: f32 = 0.001;
/// Coasting slower than this stops the wheel
const STOP: f32 = 1.;

/// Flywheel: keeps spinning at the speed it was flicked to, slowly losing
/// speed to friction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(super) struct Inertia {
    rpp: f32,
    counter: PulseCounter,
    last_velocity: f32,
    max_velocity: f32,
}

impl Inertia {
    pub fn new(rpp: f32) -> Self {
        Self {
            rpp,
            ..Default::default()
        }
    }

    pub fn enable(&mut self, reading: Reading) {
        self.counter = PulseCounter::new(reading.position);
        self.last_velocity = reading.velocity;
        self.max_velocity = 0.;
    }

    pub fn set_rpp(&mut self, rpp: f32) {
        self.rpp = rpp;
    }

    pub fn tick(&mut self, reading: Reading, mc: &mut MotorControl) {
        mc.mode = ControlMode::Velocity;

        self.counter.track(reading.position, self.rpp);

        let v = reading.velocity;
        let a = v - self.last_velocity;

        if v == 0. {
            mc.target = 0.;
            self.max_velocity = 0.;
        } else if v > 0. {
            if a > PUSH || v > self.max_velocity {
                mc.target = v;
                self.max_velocity = v;
            } else if a < BRAKE {
                mc.target += a;
                if mc.target < STOP {
                    mc.target = 0.;
                    self.max_velocity = 0.;
                }
            } else {
                mc.target -= FRICTION;
            }
        } else if a < -PUSH || v < self.max_velocity {
            mc.target = v;
            self.max_velocity = v;
        } else if a > -BRAKE {
            mc.target += a;
            if mc.target > -STOP {
                mc.target = 0.;
                self.max_velocity = 0.;
            }
        } else {
            mc.target += FRICTION;
        }

        self.last_velocity = mc.target;
    }

    pub fn report(&mut self) -> Option<Pulse> {
        self.counter.report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(position: f32, velocity: f32) -> Reading {
        Reading { position, velocity }
    }

    fn spun_up(mc: &mut MotorControl) -> Inertia {
        let mut inertia = Inertia::new(0.5);
        inertia.enable(reading(0., 0.));
        inertia.tick(reading(0., 10.), mc);
        inertia
    }

    #[test]
    fn flick_sets_target_and_peak() {
        let mut mc = MotorControl::default();
        let inertia = spun_up(&mut mc);

        assert_eq!(mc.mode, ControlMode::Velocity);
        assert_eq!(mc.target, 10.);
        assert_eq!(inertia.max_velocity, 10.);
    }

    #[test]
    fn coasting_loses_friction_per_tick() {
        let mut mc = MotorControl::default();
        let mut inertia = spun_up(&mut mc);

        inertia.tick(reading(0.1, 9.5), &mut mc);
        assert!((mc.target - (10. - FRICTION)).abs() < 1e-6);
    }

    #[test]
    fn braking_decays_by_deceleration_then_stops() {
        let mut mc = MotorControl::default();
        let mut inertia = spun_up(&mut mc);

        // a = 7 - 10 = -3
        inertia.tick(reading(0.1, 7.), &mut mc);
        assert!((mc.target - 7.).abs() < 1e-6);

        // a = 4 - 7 = -3, leaves 4
        inertia.tick(reading(0.2, 4.), &mut mc);
        assert!((mc.target - 4.).abs() < 1e-6);

        // a = 0.5 - 4 = -3.5, below the stop floor
        inertia.tick(reading(0.3, 0.5), &mut mc);
        assert_eq!(mc.target, 0.);
        assert_eq!(inertia.max_velocity, 0.);
    }

    #[test]
    fn mirrored_for_negative_spin() {
        let mut mc = MotorControl::default();
        let mut inertia = Inertia::new(0.5);
        inertia.enable(reading(0., 0.));

        inertia.tick(reading(0., -10.), &mut mc);
        assert_eq!(mc.target, -10.);

        inertia.tick(reading(0., -9.5), &mut mc);
        assert!((mc.target + 10. - FRICTION).abs() < 1e-6);

        inertia.tick(reading(0., -0.5), &mut mc);
        assert_eq!(mc.target, 0.);
    }

    #[test]
    fn standstill_zeroes_target() {
        let mut mc = MotorControl::default();
        let mut inertia = spun_up(&mut mc);

        inertia.tick(reading(0., 0.), &mut mc);
        assert_eq!(mc.target, 0.);
    }

    #[test]
    fn counts_detents_while_spinning() {
        let mut mc = MotorControl::default();
        let mut inertia = spun_up(&mut mc);

        inertia.tick(reading(0.3, 10.), &mut mc);
        assert_eq!(inertia.report(), Some(Pulse::Increment));
        inertia.tick(reading(0.4, 10.), &mut mc);
        assert_eq!(inertia.report(), None);
    }
}
