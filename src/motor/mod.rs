//! Field oriented control of a gimbal BLDC with a magnetic encoder.

use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use crate::{
    pid::{PIDController, PidGains},
    sensor::{AngleSensor, EncoderState},
    util::{math::normalize_angle, Clock, Instant, LowPassFilter},
    Error,
};

mod calibration;
mod inverter;
mod svpwm;

pub use inverter::{Inverter, NoEnable, PwmError, ThreePhasePwm};
pub use svpwm::phase_powers;

/// Rotor to encoder direction, found by calibration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    /// Encoder angle grows with the electrical angle
    Cw,
    /// Encoder angle shrinks as the electrical angle grows
    Ccw,
    /// Not calibrated
    #[default]
    Unknown,
}

impl Direction {
    pub const fn sign(self) -> f32 {
        match self {
            Direction::Cw => 1.,
            Direction::Ccw => -1.,
            Direction::Unknown => 0.,
        }
    }
}

/// What [`MotorControl::target`] means
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ControlMode {
    /// Target is the q-axis voltage
    #[default]
    Torque,
    /// Target is in rad/s
    Velocity,
    /// Target is a full (unbounded) angle in rad
    Angle,
}

/// Control directive, written by the active profile and consumed by the next
/// [`Motor::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotorControl {
    pub mode: ControlMode,
    pub target: f32,
}

impl MotorControl {
    pub const fn new(mode: ControlMode, target: f32) -> Self {
        Self { mode, target }
    }
}

/// Diagnostic snapshot of the control loop
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotorState {
    pub timestamp: Instant,
    pub control_mode: ControlMode,
    pub current_angle: f32,
    pub current_velocity: f32,
    pub target_angle: f32,
    pub target_velocity: f32,
    pub target_voltage: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
    /// Electrical angle at the encoder's mechanical zero, rad
    pub zero_offset: f32,
    pub direction: Direction,
}

impl Calibration {
    pub const UNKNOWN: Calibration = Calibration {
        zero_offset: 0.,
        direction: Direction::Unknown,
    };
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotorConfig {
    /// Nominal bus voltage, full modulation
    pub supply_voltage: f32,
    /// Initial voltage ceiling
    pub torque_limit: f32,
    /// Output limit of the angle loop, rad/s
    pub velocity_limit: f32,
    /// q-axis voltage applied while calibrating
    pub calibration_voltage: f32,
    /// Time constant of the angle estimate, s
    pub angle_lpf: f32,
    /// Time constant of the velocity estimate, s
    pub velocity_lpf: f32,
    pub velocity_pid: PidGains,
    /// Output ramp of the velocity loop, V/s
    pub velocity_ramp: f32,
    pub angle_pid: PidGains,
}

impl MotorConfig {
    pub const fn new() -> Self {
        Self {
            supply_voltage: 12.,
            torque_limit: 1.5,
            velocity_limit: 100.,
            calibration_voltage: 1.,
            angle_lpf: 0.03,
            velocity_lpf: 0.1,
            velocity_pid: PidGains::new(0.1, 0., 0.),
            velocity_ramp: 1000.,
            angle_pid: PidGains::new(80., 0., 0.7),
        }
    }

    pub const fn supply_voltage(mut self, volt: f32) -> Self {
        self.supply_voltage = volt;
        self
    }

    pub const fn torque_limit(mut self, volt: f32) -> Self {
        self.torque_limit = volt;
        self
    }

    pub const fn velocity_limit(mut self, rad_per_sec: f32) -> Self {
        self.velocity_limit = rad_per_sec;
        self
    }

    pub const fn calibration_voltage(mut self, volt: f32) -> Self {
        self.calibration_voltage = volt;
        self
    }

    pub const fn lpf(mut self, angle: f32, velocity: f32) -> Self {
        self.angle_lpf = angle;
        self.velocity_lpf = velocity;
        self
    }

    pub const fn velocity_pid(mut self, gains: PidGains, ramp: f32) -> Self {
        self.velocity_pid = gains;
        self.velocity_ramp = ramp;
        self
    }

    pub const fn angle_pid(mut self, gains: PidGains) -> Self {
        self.angle_pid = gains;
        self
    }
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Smoothed angle and velocity, refreshed once per tick
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Estimate {
    angle: f32,
    velocity: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct SetPoint {
    angle: f32,
    velocity: f32,
    voltage: f32,
}

/// FOC engine with `POLE` pole pairs.
///
/// Owns the sensor, the power stage and the clock. Every tick first runs the
/// cascaded loops on the smoothed estimates, then re-samples the encoder and
/// commutates.
pub struct Motor<S, V, C, const POLE: u8> {
    sensor: S,
    inverter: V,
    clock: C,
    config: MotorConfig,

    encoder: EncoderState,
    calibration: Calibration,
    enabled: bool,

    control: MotorControl,
    voltage_limit: f32,

    angle_lpf: LowPassFilter,
    velocity_lpf: LowPassFilter,
    velocity_pid: PIDController,
    angle_pid: PIDController,

    estimate: Estimate,
    set_point: SetPoint,

    sensor_ok: bool,
    faults: u32,
}

impl<S, V, C, const POLE: u8> Motor<S, V, C, POLE>
where
    S: AngleSensor,
    V: Inverter,
    C: Clock,
{
    /// Bring up the motor: power stage released, encoder seeded.
    ///
    /// The motor starts disabled and uncalibrated.
    pub fn new<D: DelayNs>(
        mut sensor: S,
        mut inverter: V,
        clock: C,
        delay: &mut D,
        config: MotorConfig,
    ) -> Result<Self, Error> {
        if let Err(e) = inverter.stop() {
            error!("Inverter is not ready: {e:?}");
            return Err(Error::InverterNotReady);
        }

        let encoder = EncoderState::init(&mut sensor, &clock, delay).map_err(|e| {
            error!("Encoder is not ready: {e:?}");
            Error::EncoderNotReady
        })?;

        let voltage_limit = config.torque_limit.min(config.supply_voltage).max(0.);
        let velocity_pid = PIDController::new()
            .gains(config.velocity_pid)
            .ramp(config.velocity_ramp)
            .limit(voltage_limit);
        let angle_pid = PIDController::new()
            .gains(config.angle_pid)
            .limit(config.velocity_limit);

        let mut motor = Self {
            sensor,
            inverter,
            clock,
            config,
            encoder,
            calibration: Calibration::UNKNOWN,
            enabled: false,
            control: MotorControl::default(),
            voltage_limit,
            angle_lpf: LowPassFilter::new(config.angle_lpf),
            velocity_lpf: LowPassFilter::new(config.velocity_lpf),
            velocity_pid,
            angle_pid,
            estimate: Estimate::default(),
            set_point: SetPoint::default(),
            sensor_ok: true,
            faults: 0,
        };
        motor.refresh_angle_estimate();

        info!("Motor ready, {POLE} pole pairs");

        Ok(motor)
    }

    pub fn config(&self) -> &MotorConfig {
        &self.config
    }

    /// Start or stop driving the phases.
    ///
    /// Refuses to start an uncalibrated motor. Disabling keeps calibration,
    /// loop state and the control directive.
    pub fn set_enable(&mut self, enable: bool) -> Result<(), Error> {
        if enable && !self.is_calibrated() {
            return Err(Error::NotCalibrated);
        }

        let res = if enable {
            self.inverter.start()
        } else {
            self.inverter.stop()
        };

        match res {
            Ok(()) => {
                self.enabled = enable;
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Inverter failed to {}: {e:?}",
                    if enable { "start" } else { "stop" }
                );
                self.faults = self.faults.wrapping_add(1);
                self.enabled = false;
                Err(Error::Inverter)
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Voltage ceiling of the torque output and the velocity loop, capped at
    /// the supply voltage.
    pub fn set_torque_limit(&mut self, limit: f32) {
        self.voltage_limit = limit.min(self.config.supply_voltage).max(0.);
        self.velocity_pid.set_limit(self.voltage_limit);
    }

    pub fn torque_limit(&self) -> f32 {
        self.voltage_limit
    }

    pub fn velocity_pid_limit(&self) -> f32 {
        self.velocity_pid.get_limit()
    }

    pub fn set_velocity_pid(&mut self, gains: PidGains) {
        self.velocity_pid.set_gains(gains);
    }

    pub fn set_angle_pid(&mut self, gains: PidGains) {
        self.angle_pid.set_gains(gains);
    }

    pub fn velocity_pid(&self) -> PidGains {
        self.velocity_pid.get_gains()
    }

    pub fn angle_pid(&self) -> PidGains {
        self.angle_pid.get_gains()
    }

    pub fn control(&self) -> &MotorControl {
        &self.control
    }

    pub fn control_mut(&mut self) -> &mut MotorControl {
        &mut self.control
    }

    /// Smoothed full angle as of the last tick, rad
    pub fn estimate_angle(&self) -> f32 {
        self.estimate.angle
    }

    /// Smoothed velocity as of the last tick, rad/s
    pub fn estimate_velocity(&self) -> f32 {
        self.estimate.velocity
    }

    pub fn encoder(&self) -> &EncoderState {
        &self.encoder
    }

    pub fn electrical_angle(&self) -> f32 {
        normalize_angle(
            self.calibration.direction.sign() * POLE as f32 * self.encoder.lap_angle()
                - self.calibration.zero_offset,
        )
    }

    /// Forget accumulated turns. The angle estimate jumps with it instead of
    /// sliding through the filter.
    pub fn reset_rotation_count(&mut self) {
        self.encoder.reset_rotation_count();
        self.refresh_angle_estimate();
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// Restore a previously found calibration.
    pub fn calibrate_set(&mut self, zero_offset: f32, direction: Direction) {
        self.calibration = Calibration {
            zero_offset,
            direction,
        };
        self.update_encoder();
        self.refresh_angle_estimate();
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.direction != Direction::Unknown
    }

    /// Inverter or sensor faults seen since boot
    pub fn fault_count(&self) -> u32 {
        self.faults
    }

    /// One control period: closed loop on the current estimates, then FOC
    /// output from a fresh encoder sample.
    pub fn tick(&mut self) {
        self.close_loop_control_tick();
        self.foc_output_tick();
    }

    pub fn inspect(&self) -> MotorState {
        MotorState {
            timestamp: self.clock.now(),
            control_mode: self.control.mode,
            current_angle: self.estimate.angle,
            current_velocity: self.estimate.velocity,
            target_angle: self.set_point.angle,
            target_velocity: self.set_point.velocity,
            target_voltage: self.set_point.voltage,
        }
    }

    fn close_loop_control_tick(&mut self) {
        let now = self.clock.now();
        self.estimate.angle = self.angle_lpf.apply(self.encoder.full_angle(), now);
        self.estimate.velocity = self
            .velocity_lpf
            .apply(self.encoder.velocity().as_secs(), now);

        if !self.enabled || !self.is_calibrated() {
            return;
        }

        let MotorControl { mode, target } = self.control;
        match mode {
            ControlMode::Torque => {
                self.set_point.voltage = target.clamp(-self.voltage_limit, self.voltage_limit);
            }
            ControlMode::Angle => {
                self.set_point.angle = target;
                self.set_point.velocity =
                    self.angle_pid.regulate(target - self.estimate.angle, now);
                self.set_point.voltage = self
                    .velocity_pid
                    .regulate(self.set_point.velocity - self.estimate.velocity, now);
            }
            ControlMode::Velocity => {
                self.set_point.velocity = target;
                self.set_point.voltage = self
                    .velocity_pid
                    .regulate(target - self.estimate.velocity, now);
            }
        }
    }

    fn foc_output_tick(&mut self) {
        self.update_encoder();

        if !self.enabled || !self.is_calibrated() {
            return;
        }

        // a reversed encoder also reverses the torque, so that positive
        // voltage always moves the measured angle forward
        let angle = self.electrical_angle();
        let v_q = self.set_point.voltage * self.calibration.direction.sign();
        self.set_phase_voltage(v_q, 0., angle);
    }

    fn update_encoder(&mut self) {
        let now = self.clock.now();
        match self.encoder.update(&mut self.sensor, now) {
            Ok(()) => self.sensor_ok = true,
            Err(e) => {
                // only the first of a run of failures is logged
                if self.sensor_ok {
                    warn!("Encoder read failed: {e:?}");
                }
                self.sensor_ok = false;
                self.faults = self.faults.wrapping_add(1);
            }
        }
    }

    fn refresh_angle_estimate(&mut self) {
        let now = self.clock.now();
        self.estimate.angle = self.angle_lpf.reset(self.encoder.full_angle(), now);
    }

    fn set_phase_voltage(&mut self, v_q: f32, v_d: f32, angle: f32) {
        let (a, b, c) = phase_powers(v_q, v_d, angle, self.config.supply_voltage);
        if let Err(e) = self.inverter.set_phase_powers(a, b, c) {
            if self.faults == 0 {
                warn!("Inverter write failed: {e:?}");
            }
            self.faults = self.faults.wrapping_add(1);
        }
    }
}
