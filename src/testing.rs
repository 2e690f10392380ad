//! Host doubles for the hardware traits.

use core::cell::{Cell, RefCell};
use std::{collections::VecDeque, rc::Rc};

use embedded_hal::delay::DelayNs;

use crate::{
    motor::Inverter,
    sensor::AngleSensor,
    util::{math::normalize_angle, math::TWO_PI, Clock, Instant},
};

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: Cell<u64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn micros(&self) -> u64 {
        self.micros.get()
    }

    pub fn advance_us(&self, us: u64) {
        self.micros.set(self.micros.get() + us);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        Instant::from_ticks(self.micros.get())
    }
}

/// Delay that advances a [`ManualClock`] instead of sleeping
pub struct ManualDelay<'a> {
    clock: &'a ManualClock,
    nanos: u64,
}

impl<'a> ManualDelay<'a> {
    pub fn new(clock: &'a ManualClock) -> Self {
        Self { clock, nanos: 0 }
    }
}

impl DelayNs for ManualDelay<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.nanos += ns as u64;
        self.clock.advance_us(self.nanos / 1_000);
        self.nanos %= 1_000;
    }

    fn delay_us(&mut self, us: u32) {
        self.clock.advance_us(us as u64);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock.advance_us(ms as u64 * 1_000);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault;

/// Sensor replaying a fixed list of angles, then failing
pub struct ScriptedSensor {
    angles: VecDeque<f32>,
}

impl ScriptedSensor {
    pub fn new(angles: impl IntoIterator<Item = f32>) -> Self {
        Self {
            angles: angles.into_iter().collect(),
        }
    }
}

impl AngleSensor for ScriptedSensor {
    type Error = Fault;

    fn bounded_angle(&mut self) -> Result<f32, Self::Error> {
        self.angles.pop_front().ok_or(Fault)
    }
}

#[derive(Debug, Default)]
struct RigState {
    pole_pairs: f32,
    /// Mechanical angle at electrical zero
    offset: f32,
    reversed: bool,
    stuck: bool,

    mechanical: f32,
    powered: bool,
    writes: usize,
    sensor_fault: bool,
    inverter_fault: bool,
}

impl RigState {
    /// Snap the rotor to the field the phases produce
    fn follow(&mut self, a: f32, b: f32, c: f32) {
        let alpha = a - (b + c) / 2.;
        let beta = 3f32.sqrt() / 2. * (b - c);
        if alpha.hypot(beta) < 1e-4 {
            return;
        }

        let field = beta.atan2(alpha);
        let electrical = self.pole_pairs * (self.mechanical - self.offset);
        let diff = field - electrical;
        let diff = diff - TWO_PI * (diff / TWO_PI).round();

        self.mechanical += diff / self.pole_pairs;
    }
}

/// Motor, encoder and power stage sharing one simulated rotor.
///
/// The rotor has no inertia: whenever the powered stage produces a field it
/// aligns to it at once.
#[derive(Clone)]
pub struct Rig {
    state: Rc<RefCell<RigState>>,
}

impl Rig {
    pub fn new(pole_pairs: u8) -> Self {
        Self {
            state: Rc::new(RefCell::new(RigState {
                pole_pairs: pole_pairs as f32,
                ..Default::default()
            })),
        }
    }

    pub fn offset(self, offset: f32) -> Self {
        self.state.borrow_mut().offset = offset;
        self
    }

    /// Encoder mounted the other way round
    pub fn reversed(self, reversed: bool) -> Self {
        self.state.borrow_mut().reversed = reversed;
        self
    }

    /// Rotor ignores the field
    pub fn stuck(self, stuck: bool) -> Self {
        self.state.borrow_mut().stuck = stuck;
        self
    }

    pub fn set_mechanical(&self, angle: f32) {
        self.state.borrow_mut().mechanical = angle;
    }

    pub fn mechanical(&self) -> f32 {
        self.state.borrow().mechanical
    }

    pub fn fail_sensor(&self, fail: bool) {
        self.state.borrow_mut().sensor_fault = fail;
    }

    pub fn fail_inverter(&self, fail: bool) {
        self.state.borrow_mut().inverter_fault = fail;
    }

    pub fn powered(&self) -> bool {
        self.state.borrow().powered
    }

    /// Phase power writes so far
    pub fn writes(&self) -> usize {
        self.state.borrow().writes
    }

    pub fn sensor(&self) -> RigSensor {
        RigSensor(self.state.clone())
    }

    pub fn inverter(&self) -> RigInverter {
        RigInverter(self.state.clone())
    }
}

pub struct RigSensor(Rc<RefCell<RigState>>);

impl AngleSensor for RigSensor {
    type Error = Fault;

    fn bounded_angle(&mut self) -> Result<f32, Self::Error> {
        let state = self.0.borrow();
        if state.sensor_fault {
            return Err(Fault);
        }

        let angle = if state.reversed {
            -state.mechanical
        } else {
            state.mechanical
        };
        Ok(normalize_angle(angle))
    }
}

pub struct RigInverter(Rc<RefCell<RigState>>);

impl Inverter for RigInverter {
    type Error = Fault;

    fn start(&mut self) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        if state.inverter_fault {
            return Err(Fault);
        }
        state.powered = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        if state.inverter_fault {
            return Err(Fault);
        }
        state.powered = false;
        Ok(())
    }

    fn set_phase_powers(&mut self, a: f32, b: f32, c: f32) -> Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        if state.inverter_fault {
            return Err(Fault);
        }
        state.writes += 1;
        if state.powered && !state.stuck {
            state.follow(a, b, c);
        }
        Ok(())
    }
}
