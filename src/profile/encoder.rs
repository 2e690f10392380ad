use super::{Pulse, PulseCounter, Reading};
use crate::motor::{ControlMode, MotorControl};

/// Detent feel: a soft spring around each detent that snaps over to the
/// next one past a quarter step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(super) struct Encoder {
    rpp: f32,
    counter: PulseCounter,
}

impl Encoder {
    pub fn new(rpp: f32) -> Self {
        Self {
            rpp,
            counter: PulseCounter::default(),
        }
    }

    pub fn enable(&mut self, reading: Reading) {
        self.counter = PulseCounter::new(reading.position);
    }

    pub fn set_rpp(&mut self, rpp: f32) {
        self.rpp = rpp;
    }

    #[cfg(test)]
    pub fn last_angle(&self) -> f32 {
        self.counter.last_angle()
    }

    pub fn tick(&mut self, reading: Reading, mc: &mut MotorControl) {
        mc.mode = ControlMode::Angle;

        let last = self.counter.last_angle();
        let dp = reading.position - last;
        let rpp_2 = self.rpp / 2.;
        let rpp_4 = self.rpp / 4.;

        mc.target = if dp == 0. {
            last
        } else if dp > 0. {
            if dp < rpp_4 {
                last - dp
            } else {
                last + rpp_2 - (rpp_2 - dp) * 3.
            }
        } else if dp > -rpp_4 {
            last - dp
        } else {
            last - rpp_2 + (rpp_2 + dp) * 3.
        };

        self.counter.commit(dp, self.rpp);
    }

    pub fn report(&mut self) -> Option<Pulse> {
        self.counter.report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::math::TWO_PI;

    fn at(position: f32) -> Reading {
        Reading {
            position,
            velocity: 0.,
        }
    }

    #[test]
    fn half_step_commits_one_detent() {
        let rpp = TWO_PI / 24.;
        let mut encoder = Encoder::new(rpp);
        encoder.enable(at(0.));
        let mut mc = MotorControl::default();

        encoder.tick(at(0.20), &mut mc);

        assert_eq!(mc.mode, ControlMode::Angle);
        assert!((encoder.last_angle() - 0.2618).abs() < 1e-4);
        assert_eq!(encoder.report(), Some(Pulse::Increment));
        assert_eq!(encoder.report(), None);
    }

    #[test]
    fn slow_ramp_over_one_detent_yields_one_pulse() {
        for sign in [1., -1.] {
            let rpp = TWO_PI / 24.;
            let mut encoder = Encoder::new(rpp);
            encoder.enable(at(0.));
            let mut mc = MotorControl::default();

            let mut pulses = 0;
            for k in 0..=200 {
                encoder.tick(at(sign * rpp * k as f32 / 200.), &mut mc);
                if let Some(p) = encoder.report() {
                    assert_eq!(p.value() as f32, sign);
                    pulses += 1;
                }
            }

            assert_eq!(pulses, 1);
            assert!((encoder.last_angle() - sign * rpp).abs() < 1e-5);
        }
    }

    #[test]
    fn target_shape_around_detent() {
        let rpp = 0.4;
        let mut encoder = Encoder::new(rpp);
        encoder.enable(at(1.));
        let mut mc = MotorControl::default();

        encoder.tick(at(1.), &mut mc);
        assert_eq!(mc.target, 1.);

        // inside a quarter step the target mirrors the offset
        encoder.tick(at(1.05), &mut mc);
        assert!((mc.target - 0.95).abs() < 1e-5);
        encoder.tick(at(0.95), &mut mc);
        assert!((mc.target - 1.05).abs() < 1e-5);

        // past a quarter step the target runs ahead 3:1
        encoder.tick(at(1.15), &mut mc);
        assert!((mc.target - (1. + 0.2 - 0.05 * 3.)).abs() < 1e-5);
        encoder.tick(at(0.85), &mut mc);
        assert!((mc.target - (1. - 0.2 + 0.05 * 3.)).abs() < 1e-5);

        assert_eq!(encoder.report(), None);
    }
}
