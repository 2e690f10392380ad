use super::{Pulse, PulseCounter, Reading};

/// Motor released, the knob still reports detents as a plain encoder.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(super) struct Disable {
    rpp: f32,
    counter: PulseCounter,
}

impl Disable {
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

    pub fn tick(&mut self, reading: Reading) {
        self.counter.track(reading.position, self.rpp);
    }

    pub fn report(&mut self) -> Option<Pulse> {
        self.counter.report()
    }
}
