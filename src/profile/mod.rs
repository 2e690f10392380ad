//! Knob feels.
//!
//! A [`Profile`] reads the motor's estimates every tick and writes back a
//! [`MotorControl`] directive. Each variant keeps its own state, which is
//! rebuilt whenever the profile is entered.

use crate::{
    motor::{Inverter, Motor, MotorControl},
    pid::PidGains,
    sensor::AngleSensor,
    util::{
        math::{deg_to_rad, TWO_PI},
        Clock,
    },
};

mod_use::mod_use![counter, damped, disable, encoder, inertia, ratchet, spin, spring, switch];

/// Knob modes, numbered as the host protocol numbers them
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KnobMode {
    Disable = 0,
    Inertia = 1,
    Encoder = 2,
    Spring = 3,
    Damped = 4,
    Spin = 5,
    Ratchet = 6,
    Switch = 7,
}

impl KnobMode {
    pub const ALL: [KnobMode; 8] = [
        KnobMode::Disable,
        KnobMode::Inertia,
        KnobMode::Encoder,
        KnobMode::Spring,
        KnobMode::Damped,
        KnobMode::Spin,
        KnobMode::Ratchet,
        KnobMode::Switch,
    ];

    pub const fn index(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for KnobMode {
    type Error = u8;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::ALL.get(index as usize).copied().ok_or(index)
    }
}

/// One emulated encoder step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pulse {
    Increment,
    Decrement,
}

impl Pulse {
    pub const fn value(self) -> i32 {
        match self {
            Pulse::Increment => 1,
            Pulse::Decrement => -1,
        }
    }

    /// `None` for zero
    pub const fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => None,
            v if v > 0 => Some(Pulse::Increment),
            _ => Some(Pulse::Decrement),
        }
    }
}

/// Knob wide parameters pushed into the active profile
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KnobParams {
    /// Pulses per revolution
    pub ppr: u32,
    pub position_min: f32,
    pub position_max: f32,
}

impl KnobParams {
    /// Radians per pulse
    pub fn rpp(&self) -> f32 {
        TWO_PI / self.ppr.max(1) as f32
    }
}

/// What a profile sees of the motor each tick
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Reading {
    /// Smoothed full angle, rad
    pub position: f32,
    /// Smoothed velocity, rad/s
    pub velocity: f32,
}

/// Motor settings applied on entering a profile
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProfileTuning {
    pub torque_limit: f32,
    pub velocity_pid: Option<PidGains>,
    pub angle_pid: Option<PidGains>,
}

impl ProfileTuning {
    pub const fn new(torque_limit: f32) -> Self {
        Self {
            torque_limit,
            velocity_pid: None,
            angle_pid: None,
        }
    }

    pub const fn velocity_pid(mut self, p: f32, i: f32, d: f32) -> Self {
        self.velocity_pid = Some(PidGains::new(p, i, d));
        self
    }

    pub const fn angle_pid(mut self, p: f32, i: f32, d: f32) -> Self {
        self.angle_pid = Some(PidGains::new(p, i, d));
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProfileConfig {
    /// Spring dead band either side of the center, degrees
    pub spring_minimal_movement_deg: f32,
    pub spring_center_deg: f32,
    /// Distance of the on and off positions from the center, degrees.
    /// `None` uses the fixed 40°.
    pub switch_on_off_distance_deg: Option<f32>,
    pub switch_center_deg: f32,
    /// Range of the damped profile while the knob has no position limit
    pub damped_range_deg: (f32, f32),
    pub spin_velocity: f32,

    pub inertia: ProfileTuning,
    pub encoder: ProfileTuning,
    pub spring: ProfileTuning,
    pub damped: ProfileTuning,
    pub spin: ProfileTuning,
    pub ratchet: ProfileTuning,
    pub switch: ProfileTuning,
}

impl ProfileConfig {
    pub const LEGACY_SWITCH_DISTANCE_DEG: f32 = 40.;

    pub const fn new() -> Self {
        Self {
            spring_minimal_movement_deg: 10.,
            spring_center_deg: 180.,
            switch_on_off_distance_deg: None,
            switch_center_deg: 180.,
            damped_range_deg: (190., 290.),
            spin_velocity: 20.,

            inertia: ProfileTuning::new(1.5)
                .velocity_pid(0.3, 0., 0.)
                .angle_pid(20., 0., 0.7),
            encoder: ProfileTuning::new(0.3)
                .velocity_pid(0.02, 0., 0.)
                .angle_pid(100., 0., 3.5),
            spring: ProfileTuning::new(1.5)
                .velocity_pid(0.05, 0., 0.)
                .angle_pid(100., 0., 3.5),
            damped: ProfileTuning::new(1.5)
                .velocity_pid(0.05, 0., 0.)
                .angle_pid(100., 0., 3.5),
            spin: ProfileTuning::new(1.5).velocity_pid(0.3, 0., 0.),
            ratchet: ProfileTuning::new(2.5)
                .velocity_pid(0.05, 0., 0.)
                .angle_pid(100., 0., 3.5),
            switch: ProfileTuning::new(1.5)
                .velocity_pid(0.05, 0., 0.)
                .angle_pid(100., 0., 3.5),
        }
    }

    /// Motor settings for `mode`, `None` when the mode leaves the motor off
    pub fn tuning(&self, mode: KnobMode) -> Option<ProfileTuning> {
        match mode {
            KnobMode::Disable => None,
            KnobMode::Inertia => Some(self.inertia),
            KnobMode::Encoder => Some(self.encoder),
            KnobMode::Spring => Some(self.spring),
            KnobMode::Damped => Some(self.damped),
            KnobMode::Spin => Some(self.spin),
            KnobMode::Ratchet => Some(self.ratchet),
            KnobMode::Switch => Some(self.switch),
        }
    }

    fn switch_distance(&self) -> f32 {
        deg_to_rad(
            self.switch_on_off_distance_deg
                .unwrap_or(Self::LEGACY_SWITCH_DISTANCE_DEG),
        )
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// The part of the motor a profile may touch.
pub trait Actuator {
    fn set_torque_limit(&mut self, limit: f32);
    fn set_velocity_pid(&mut self, gains: PidGains);
    fn set_angle_pid(&mut self, gains: PidGains);
    fn reading(&self) -> Reading;
}

impl<S, V, C, const POLE: u8> Actuator for Motor<S, V, C, POLE>
where
    S: AngleSensor,
    V: Inverter,
    C: Clock,
{
    fn set_torque_limit(&mut self, limit: f32) {
        Motor::set_torque_limit(self, limit);
    }

    fn set_velocity_pid(&mut self, gains: PidGains) {
        Motor::set_velocity_pid(self, gains);
    }

    fn set_angle_pid(&mut self, gains: PidGains) {
        Motor::set_angle_pid(self, gains);
    }

    fn reading(&self) -> Reading {
        Reading {
            position: self.estimate_angle(),
            velocity: self.estimate_velocity(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Behavior {
    Disable(Disable),
    Inertia(Inertia),
    Encoder(Encoder),
    Spring(Spring),
    Damped(Damped),
    Spin(Spin),
    Ratchet(Ratchet),
    Switch(Switch),
}

/// The active feel of the knob
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Profile {
    mode: KnobMode,
    tuning: Option<ProfileTuning>,
    damped_fallback: (f32, f32),
    behavior: Behavior,
}

impl Profile {
    pub fn new(mode: KnobMode, config: &ProfileConfig, params: &KnobParams) -> Self {
        let rpp = params.rpp();
        let (min, max) = config.damped_range_deg;
        let damped_fallback = (deg_to_rad(min), deg_to_rad(max));

        let behavior = match mode {
            KnobMode::Disable => Behavior::Disable(Disable::new(rpp)),
            KnobMode::Inertia => Behavior::Inertia(Inertia::new(rpp)),
            KnobMode::Encoder => Behavior::Encoder(Encoder::new(rpp)),
            KnobMode::Spring => Behavior::Spring(Spring::new(
                deg_to_rad(config.spring_center_deg),
                deg_to_rad(config.spring_minimal_movement_deg),
            )),
            KnobMode::Damped => Behavior::Damped(Damped::new(damped_fallback.0, damped_fallback.1)),
            KnobMode::Spin => Behavior::Spin(Spin::new(config.spin_velocity)),
            KnobMode::Ratchet => Behavior::Ratchet(Ratchet::default()),
            KnobMode::Switch => Behavior::Switch(Switch::new(
                deg_to_rad(config.switch_center_deg),
                config.switch_distance(),
            )),
        };

        let mut profile = Self {
            mode,
            tuning: config.tuning(mode),
            damped_fallback,
            behavior,
        };
        profile.update_params(params);
        profile
    }

    pub fn mode(&self) -> KnobMode {
        self.mode
    }

    /// Whether the motor should be powered while this profile is active
    pub fn drives_motor(&self) -> bool {
        self.tuning.is_some()
    }

    /// Enter the profile: tune the motor and restart from where it stands.
    pub fn enable<A: Actuator>(&mut self, motor: &mut A) {
        if let Some(tuning) = self.tuning {
            motor.set_torque_limit(tuning.torque_limit);
            if let Some(gains) = tuning.velocity_pid {
                motor.set_velocity_pid(gains);
            }
            if let Some(gains) = tuning.angle_pid {
                motor.set_angle_pid(gains);
            }
        }

        let reading = motor.reading();
        match &mut self.behavior {
            Behavior::Disable(p) => p.enable(reading),
            Behavior::Inertia(p) => p.enable(reading),
            Behavior::Encoder(p) => p.enable(reading),
            Behavior::Spring(p) => p.enable(),
            Behavior::Ratchet(p) => p.enable(reading),
            Behavior::Switch(p) => p.enable(),
            Behavior::Damped(_) | Behavior::Spin(_) => {}
        }
    }

    pub fn update_params(&mut self, params: &KnobParams) {
        let rpp = params.rpp();
        match &mut self.behavior {
            Behavior::Disable(p) => p.set_rpp(rpp),
            Behavior::Inertia(p) => p.set_rpp(rpp),
            Behavior::Encoder(p) => p.set_rpp(rpp),
            Behavior::Damped(p) => {
                let (min, max) = if params.position_min < params.position_max {
                    (params.position_min, params.position_max)
                } else {
                    self.damped_fallback
                };
                p.set_range(min, max);
            }
            Behavior::Spring(_)
            | Behavior::Spin(_)
            | Behavior::Ratchet(_)
            | Behavior::Switch(_) => {}
        }
    }

    pub fn tick(&mut self, reading: Reading, mc: &mut MotorControl) {
        match &mut self.behavior {
            Behavior::Disable(p) => p.tick(reading),
            Behavior::Inertia(p) => p.tick(reading, mc),
            Behavior::Encoder(p) => p.tick(reading, mc),
            Behavior::Spring(p) => p.tick(reading, mc),
            Behavior::Damped(p) => p.tick(reading, mc),
            Behavior::Spin(p) => p.tick(mc),
            Behavior::Ratchet(p) => p.tick(reading, mc),
            Behavior::Switch(p) => p.tick(reading, mc),
        }
    }

    /// Event since the previous call, if any
    pub fn report(&mut self) -> Option<Pulse> {
        match &mut self.behavior {
            Behavior::Disable(p) => p.report(),
            Behavior::Inertia(p) => p.report(),
            Behavior::Encoder(p) => p.report(),
            Behavior::Spring(p) => p.report(),
            Behavior::Switch(p) => p.report(),
            Behavior::Damped(_) | Behavior::Spin(_) | Behavior::Ratchet(_) => None,
        }
    }
}
