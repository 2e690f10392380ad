use super::Pulse;

/// Detent bookkeeping shared by the profiles that emulate an encoder.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(super) struct PulseCounter {
    last_angle: f32,
    pulses: i32,
    reported: i32,
}

impl PulseCounter {
    pub fn new(position: f32) -> Self {
        Self {
            last_angle: position,
            pulses: 0,
            reported: 0,
        }
    }

    /// Angle of the last committed detent
    pub fn last_angle(&self) -> f32 {
        self.last_angle
    }

    /// Commit one detent when `dp`, the offset from the last detent, reaches
    /// half a step.
    pub fn commit(&mut self, dp: f32, rpp: f32) {
        let rpp_2 = rpp / 2.;
        if dp >= rpp_2 {
            self.last_angle += rpp;
            self.pulses += 1;
        } else if dp <= -rpp_2 {
            self.last_angle -= rpp;
            self.pulses -= 1;
        }
    }

    pub fn track(&mut self, position: f32, rpp: f32) {
        self.commit(position - self.last_angle, rpp);
    }

    /// Direction of the detents committed since the previous call
    pub fn report(&mut self) -> Option<Pulse> {
        let pulse = match self.pulses.cmp(&self.reported) {
            core::cmp::Ordering::Equal => return None,
            core::cmp::Ordering::Greater => Pulse::Increment,
            core::cmp::Ordering::Less => Pulse::Decrement,
        };
        self.reported = self.pulses;
        Some(pulse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commits_at_half_step() {
        let mut c = PulseCounter::new(0.);
        c.track(0.49, 1.);
        assert_eq!(c.report(), None);

        c.track(0.5, 1.);
        assert_eq!(c.last_angle(), 1.);
        assert_eq!(c.report(), Some(Pulse::Increment));
        assert_eq!(c.report(), None);

        c.track(0.4, 1.);
        assert_eq!(c.last_angle(), 0.);
        assert_eq!(c.report(), Some(Pulse::Decrement));
    }

    #[test]
    fn report_collapses_to_net_direction() {
        let mut c = PulseCounter::new(0.);
        c.track(0.6, 1.);
        c.track(1.6, 1.);
        assert_eq!(c.report(), Some(Pulse::Increment));

        // there and back again between polls
        c.track(1.4, 1.);
        c.track(2.6, 1.);
        assert_eq!(c.report(), None);
    }
}
