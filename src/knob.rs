//! The knob: one motor, one active profile and the control loop driving
//! them.
//!
//! The [`Knob`] itself is owned by the control task. Other tasks (or the
//! other core) talk to it through a [`KnobShared`] block: requests are
//! last-write-wins and picked up at the start of the next step, status is
//! published at the end of every step. Pulses leave through a bounded
//! single-producer queue drained by [`dispatch_pulses`].

use core::cell::Cell;

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use heapless::spsc::{Consumer, Producer, Queue};
use log::{error, info, warn};
use num_traits::Float;

use crate::{
    motor::{Calibration, ControlMode, Inverter, Motor, MotorControl, MotorState},
    profile::{Actuator, KnobMode, KnobParams, Profile, ProfileConfig, Pulse},
    sensor::AngleSensor,
    util::{Clock, Duration},
    Error,
};

/// Slots in the pulse queue, one is always kept free
pub const PULSE_QUEUE_LEN: usize = 16;

pub type PulseQueue = Queue<Pulse, PULSE_QUEUE_LEN>;
pub type PulseProducer<'q> = Producer<'q, Pulse, PULSE_QUEUE_LEN>;
pub type PulseConsumer<'q> = Consumer<'q, Pulse, PULSE_QUEUE_LEN>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KnobConfig {
    /// Sleep between control steps
    pub tick_interval: Duration,
    /// Pulses per revolution until the host says otherwise
    pub ppr: u32,
    pub profiles: ProfileConfig,
}

impl KnobConfig {
    pub const fn new() -> Self {
        Self {
            tick_interval: Duration::micros(200),
            ppr: 24,
            profiles: ProfileConfig::new(),
        }
    }

    pub const fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub const fn ppr(mut self, ppr: u32) -> Self {
        self.ppr = ppr;
        self
    }

    pub const fn profiles(mut self, profiles: ProfileConfig) -> Self {
        self.profiles = profiles;
        self
    }
}

impl Default for KnobConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Published after every control step
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KnobStatus {
    /// `None` after an invalid mode index
    pub mode: Option<KnobMode>,
    pub enabled: bool,
    pub calibrated: bool,
    pub encoder_report: bool,
    pub ppr: u32,
    pub position_limit: (f32, f32),
    pub encoder_position: i32,
    pub dropped_pulses: u32,
    pub motor: MotorState,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Requests {
    mode: Option<u8>,
    ppr: Option<u32>,
    position_limit: Option<(f32, f32)>,
    enable: Option<bool>,
    encoder_report: Option<bool>,
    calibrate: bool,
}

impl Requests {
    const NONE: Requests = Requests {
        mode: None,
        ppr: None,
        position_limit: None,
        enable: None,
        encoder_report: None,
        calibrate: false,
    };
}

/// State shared between the control task and everyone else.
///
/// Meant to live in a `static`.
pub struct KnobShared {
    ready: Mutex<Cell<bool>>,
    requests: Mutex<Cell<Requests>>,
    status: Mutex<Cell<Option<KnobStatus>>>,
}

impl KnobShared {
    pub const fn new() -> Self {
        Self {
            ready: Mutex::new(Cell::new(false)),
            requests: Mutex::new(Cell::new(Requests::NONE)),
            status: Mutex::new(Cell::new(None)),
        }
    }

    pub fn handle(&self) -> KnobHandle<'_> {
        KnobHandle { shared: self }
    }

    pub fn is_ready(&self) -> bool {
        critical_section::with(|cs| self.ready.borrow(cs).get())
    }

    /// Set by the control task once the knob is up. Until then every handle
    /// call is ignored.
    pub fn set_ready(&self, ready: bool) {
        critical_section::with(|cs| self.ready.borrow(cs).set(ready));
    }

    fn request(&self, f: impl FnOnce(&mut Requests)) -> bool {
        critical_section::with(|cs| {
            if !self.ready.borrow(cs).get() {
                return false;
            }
            let cell = self.requests.borrow(cs);
            let mut requests = cell.get();
            f(&mut requests);
            cell.set(requests);
            true
        })
    }

    fn take_requests(&self) -> Requests {
        critical_section::with(|cs| self.requests.borrow(cs).replace(Requests::NONE))
    }

    fn publish(&self, status: KnobStatus) {
        critical_section::with(|cs| self.status.borrow(cs).set(Some(status)));
    }
}

impl Default for KnobShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Host side of the knob.
///
/// Setters return `false` when the knob is not running.
#[derive(Clone, Copy)]
pub struct KnobHandle<'a> {
    shared: &'a KnobShared,
}

impl KnobHandle<'_> {
    pub fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    pub fn set_mode(&self, mode: KnobMode) -> bool {
        self.set_mode_index(mode.index())
    }

    /// Raw mode index as sent by the host; out of range disables the motor.
    pub fn set_mode_index(&self, index: u8) -> bool {
        self.shared.request(|r| r.mode = Some(index))
    }

    pub fn set_ppr(&self, ppr: u32) -> bool {
        self.shared.request(|r| r.ppr = Some(ppr))
    }

    pub fn set_position_limit(&self, min: f32, max: f32) -> bool {
        self.shared.request(|r| r.position_limit = Some((min, max)))
    }

    pub fn set_enable(&self, enable: bool) -> bool {
        self.shared.request(|r| r.enable = Some(enable))
    }

    pub fn set_encoder_report(&self, report: bool) -> bool {
        self.shared.request(|r| r.encoder_report = Some(report))
    }

    /// Run auto calibration before the next step. The loop stalls for the
    /// duration.
    pub fn request_calibration(&self) -> bool {
        self.shared.request(|r| r.calibrate = true)
    }

    pub fn status(&self) -> Option<KnobStatus> {
        if !self.is_ready() {
            return None;
        }
        critical_section::with(|cs| self.shared.status.borrow(cs).get())
    }

    pub fn motor_state(&self) -> Option<MotorState> {
        self.status().map(|s| s.motor)
    }
}

/// Host facing receiver of encoder pulses
pub trait PulseSink {
    fn rotate(&mut self, pulse: Pulse);
}

impl<F: FnMut(Pulse)> PulseSink for F {
    fn rotate(&mut self, pulse: Pulse) {
        self(pulse)
    }
}

/// Forward every queued pulse to `sink`, returns how many were sent.
pub fn dispatch_pulses<S: PulseSink>(consumer: &mut PulseConsumer<'_>, sink: &mut S) -> usize {
    let mut sent = 0;
    while let Some(pulse) = consumer.dequeue() {
        sink.rotate(pulse);
        sent += 1;
    }
    sent
}

pub struct Knob<'q, S, V, C, const POLE: u8> {
    motor: Motor<S, V, C, POLE>,
    config: KnobConfig,

    mode: Option<KnobMode>,
    profile: Option<Profile>,
    params: KnobParams,

    enabled: bool,
    encoder_report: bool,

    pulses: PulseProducer<'q>,
    dropped: u32,
}

impl<'q, S, V, C, const POLE: u8> Knob<'q, S, V, C, POLE>
where
    S: AngleSensor,
    V: Inverter,
    C: Clock,
{
    /// Knob in [`KnobMode::Disable`], enabled, not reporting.
    pub fn new(motor: Motor<S, V, C, POLE>, config: KnobConfig, pulses: PulseProducer<'q>) -> Self {
        let mut knob = Self {
            motor,
            config,
            mode: None,
            profile: None,
            params: KnobParams {
                ppr: config.ppr.max(1),
                position_min: 0.,
                position_max: 0.,
            },
            enabled: true,
            encoder_report: false,
            pulses,
            dropped: 0,
        };
        knob.set_mode(KnobMode::Disable);
        knob
    }

    pub fn motor(&self) -> &Motor<S, V, C, POLE> {
        &self.motor
    }

    pub fn motor_mut(&mut self) -> &mut Motor<S, V, C, POLE> {
        &mut self.motor
    }

    pub fn config(&self) -> &KnobConfig {
        &self.config
    }

    pub fn set_mode(&mut self, mode: KnobMode) {
        self.motor.reset_rotation_count();
        *self.motor.control_mut() = MotorControl::default();

        let mut profile = Profile::new(mode, &self.config.profiles, &self.params);
        profile.enable(&mut self.motor);

        self.profile = Some(profile);
        self.mode = Some(mode);
        info!("Knob mode: {mode:?}");

        self.sync_motor();
    }

    pub fn set_mode_index(&mut self, index: u8) {
        match KnobMode::try_from(index) {
            Ok(mode) => self.set_mode(mode),
            Err(index) => {
                warn!("Invalid knob mode {index}, motor disabled");
                self.profile = None;
                self.mode = None;
                self.sync_motor();
            }
        }
    }

    /// `None` when no profile is active
    pub fn mode(&self) -> Option<KnobMode> {
        self.mode
    }

    /// Gate on driving the motor, independent of the mode
    pub fn set_enable(&mut self, enable: bool) {
        self.enabled = enable;
        self.sync_motor();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_encoder_report(&mut self, report: bool) {
        if report && !self.encoder_report {
            // start from here, not from whatever piled up while muted
            if let Some(profile) = &mut self.profile {
                profile.report();
            }
        }
        self.encoder_report = report;
    }

    pub fn encoder_report(&self) -> bool {
        self.encoder_report
    }

    pub fn set_ppr(&mut self, ppr: u32) {
        self.params.ppr = ppr.max(1);
        self.push_params();
    }

    pub fn ppr(&self) -> u32 {
        self.params.ppr
    }

    /// Hard stops at `min` and `max`; `min >= max` removes them.
    pub fn set_position_limit(&mut self, min: f32, max: f32) {
        self.params.position_min = min;
        self.params.position_max = max;
        self.push_params();
    }

    pub fn position_limit(&self) -> (f32, f32) {
        (self.params.position_min, self.params.position_max)
    }

    /// Smoothed full angle, rad
    pub fn position(&self) -> f32 {
        self.motor.estimate_angle()
    }

    /// Smoothed velocity, rad/s
    pub fn velocity(&self) -> f32 {
        self.motor.estimate_velocity()
    }

    /// Position in detents
    pub fn encoder_position(&self) -> i32 {
        Float::round(self.position() / self.params.rpp()) as i32
    }

    pub fn dropped_pulses(&self) -> u32 {
        self.dropped
    }

    /// Run auto calibration, then resume the current mode.
    ///
    /// The sweep leaves the rotor somewhere else, so on success the mode is
    /// entered again from the new position.
    pub fn calibrate<D: DelayNs>(&mut self, delay: &mut D) -> Result<Calibration, Error> {
        let res = self.motor.calibrate_auto(delay);
        match self.mode {
            Some(mode) if res.is_ok() => self.set_mode(mode),
            _ => self.sync_motor(),
        }
        res
    }

    /// One control period without the shared block.
    pub fn tick(&mut self) {
        let reading = self.motor.reading();

        if let Some(bound) = self.limit_override(reading.position) {
            *self.motor.control_mut() = MotorControl::new(ControlMode::Angle, bound);
        } else if let Some(profile) = &mut self.profile {
            profile.tick(reading, self.motor.control_mut());
        }

        self.motor.tick();

        if self.encoder_report {
            if let Some(pulse) = self.profile.as_mut().and_then(Profile::report) {
                self.push_pulse(pulse);
            }
        }
    }

    /// Apply pending requests, tick, publish.
    pub fn step<D: DelayNs>(&mut self, shared: &KnobShared, delay: &mut D) {
        self.apply(shared.take_requests(), delay);
        self.tick();
        shared.publish(self.status());
    }

    /// Control task body.
    pub fn run<D: DelayNs>(mut self, shared: &KnobShared, delay: &mut D) -> ! {
        shared.publish(self.status());
        shared.set_ready(true);
        let interval = self.config.tick_interval.to_micros() as u32;
        info!("Knob running every {interval}us");

        loop {
            self.step(shared, delay);
            delay.delay_us(interval);
        }
    }

    pub fn status(&self) -> KnobStatus {
        KnobStatus {
            mode: self.mode,
            enabled: self.enabled,
            calibrated: self.motor.is_calibrated(),
            encoder_report: self.encoder_report,
            ppr: self.params.ppr,
            position_limit: self.position_limit(),
            encoder_position: self.encoder_position(),
            dropped_pulses: self.dropped,
            motor: self.motor.inspect(),
        }
    }

    fn apply<D: DelayNs>(&mut self, requests: Requests, delay: &mut D) {
        if let Some((min, max)) = requests.position_limit {
            self.set_position_limit(min, max);
        }
        if let Some(ppr) = requests.ppr {
            self.set_ppr(ppr);
        }
        if let Some(enable) = requests.enable {
            self.set_enable(enable);
        }
        if let Some(report) = requests.encoder_report {
            self.set_encoder_report(report);
        }
        if requests.calibrate {
            if let Err(e) = self.calibrate(delay) {
                error!("Calibration failed: {e}");
            }
        }
        if let Some(index) = requests.mode {
            self.set_mode_index(index);
        }
    }

    /// Bound to hold when outside a non-degenerate position limit
    fn limit_override(&self, position: f32) -> Option<f32> {
        let KnobParams {
            position_min: min,
            position_max: max,
            ..
        } = self.params;

        if min >= max {
            None
        } else if position > max {
            Some(max)
        } else if position < min {
            Some(min)
        } else {
            None
        }
    }

    fn push_params(&mut self) {
        if let Some(profile) = &mut self.profile {
            profile.update_params(&self.params);
        }
    }

    fn push_pulse(&mut self, pulse: Pulse) {
        if let Err(pulse) = self.pulses.enqueue(pulse) {
            self.dropped = self.dropped.wrapping_add(1);
            warn!("Pulse queue full, dropped {pulse:?}");
        }
    }

    fn sync_motor(&mut self) {
        let drive = self.enabled
            && self.profile.as_ref().is_some_and(Profile::drives_motor)
            && self.motor.is_calibrated();

        if drive == self.motor.is_enabled() {
            return;
        }
        if let Err(e) = self.motor.set_enable(drive) {
            error!(
                "Failed to {} motor: {e}",
                if drive { "enable" } else { "disable" }
            );
        }
    }
}
