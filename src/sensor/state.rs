use embedded_hal::delay::DelayNs;
use num_traits::Float;

use super::AngleSensor;
use crate::util::{clock::elapsed_secs, math::TWO_PI, Clock, Instant, Velocity};

/// Difference between 2 samples above this is taken as a wrap, not motion
const WRAP_THRESHOLD: f32 = 0.8 * TWO_PI;

/// Velocity dt used when the clock did not advance
const FALLBACK_DT_SECS: f32 = 1e-3;

/// Unbounded position tracker fed by a bounded angle sensor.
///
/// `full_angle = rotation_count * 2π + lap_angle`. Samples must arrive often
/// enough that the shaft never turns more than 0.8 rev between two of them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EncoderState {
    angle: f32,
    angle_time: Instant,

    velocity_angle: f32,
    velocity_time: Instant,

    rotation_count: i32,
    rotation_count_last: i32,
}

impl EncoderState {
    /// Tracker sitting at `angle`, with no motion recorded yet.
    pub fn new(angle: f32, now: Instant) -> Self {
        Self {
            angle,
            angle_time: now,
            velocity_angle: angle,
            velocity_time: now,
            rotation_count: 0,
            rotation_count_last: 0,
        }
    }

    /// Seed both baselines from real samples a millisecond apart, so the
    /// first velocity does not see a jump from zero.
    pub fn init<S, C, D>(sensor: &mut S, clock: &C, delay: &mut D) -> Result<Self, S::Error>
    where
        S: AngleSensor,
        C: Clock,
        D: DelayNs,
    {
        sensor.bounded_angle()?;
        delay.delay_us(1);
        let velocity_angle = sensor.bounded_angle()?;
        let velocity_time = clock.now();

        delay.delay_ms(1);

        sensor.bounded_angle()?;
        delay.delay_us(1);
        let angle = sensor.bounded_angle()?;
        let angle_time = clock.now();

        Ok(Self {
            angle,
            angle_time,
            velocity_angle,
            velocity_time,
            rotation_count: 0,
            rotation_count_last: 0,
        })
    }

    /// Sample the sensor and record the reading.
    ///
    /// On error nothing is recorded, which looks like a shaft at rest.
    pub fn update<S: AngleSensor>(&mut self, sensor: &mut S, now: Instant) -> Result<(), S::Error> {
        let angle = sensor.bounded_angle()?;
        self.record(angle, now);
        Ok(())
    }

    pub fn record(&mut self, new_angle: f32, now: Instant) {
        let angle_delta = new_angle - self.angle;

        if Float::abs(angle_delta) > WRAP_THRESHOLD {
            self.rotation_count += if angle_delta > 0. { -1 } else { 1 };
        }

        self.angle = new_angle;
        self.angle_time = now;
    }

    /// Current angle in rad, within one revolution
    pub fn lap_angle(&self) -> f32 {
        self.angle
    }

    /// Total angle in rad
    pub fn full_angle(&self) -> f32 {
        self.rotation_count as f32 * TWO_PI + self.angle
    }

    /// Full rotations counter
    pub fn rotation_count(&self) -> i32 {
        self.rotation_count
    }

    /// Time of the last recorded sample
    pub fn last_sample(&self) -> Instant {
        self.angle_time
    }

    /// Velocity since the previous call.
    ///
    /// Moves the velocity baseline to the latest sample, call it once per
    /// control tick.
    pub fn velocity(&mut self) -> Velocity {
        let rotation_delta = self.rotation_count - self.rotation_count_last;
        let angle_delta = self.angle - self.velocity_angle;

        let mut dt = elapsed_secs(self.angle_time, self.velocity_time);
        if dt <= 0. {
            dt = FALLBACK_DT_SECS;
        }

        self.velocity_angle = self.angle;
        self.velocity_time = self.angle_time;
        self.rotation_count_last = self.rotation_count;

        Velocity::rad(rotation_delta as f32 * TWO_PI + angle_delta).per_sec(dt)
    }

    pub fn reset_rotation_count(&mut self) {
        self.rotation_count = 0;
        self.rotation_count_last = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ManualClock, ManualDelay, ScriptedSensor};

    fn at(micros: u64) -> Instant {
        Instant::from_ticks(micros)
    }

    #[test]
    fn forward_wrap_adds_a_turn() {
        let mut state = EncoderState::new(6.2, at(0));
        state.record(0.1, at(1_000));

        assert_eq!(state.rotation_count(), 1);
        assert!((state.full_angle() - (TWO_PI + 0.1)).abs() < 1e-5);
    }

    #[test]
    fn backward_wrap_removes_a_turn() {
        let mut state = EncoderState::new(0.1, at(0));
        let before = state.full_angle();
        state.record(6.2, at(1_000));

        assert_eq!(state.rotation_count(), -1);
        // jumped by the raw delta minus one turn
        let jump = state.full_angle() - before;
        assert!((jump - (6.1 - TWO_PI)).abs() < 1e-5);
    }

    #[test]
    fn large_but_legal_motion_is_not_a_wrap() {
        let mut state = EncoderState::new(0.5, at(0));
        state.record(0.5 + 0.79 * TWO_PI, at(1_000));

        assert_eq!(state.rotation_count(), 0);
    }

    #[test]
    fn velocity_across_wrap() {
        let mut state = EncoderState::new(6.2, at(0));
        state.record(0.1, at(10_000));

        let expected = (TWO_PI + 0.1 - 6.2) / 0.01;
        assert!((state.velocity().as_secs() - expected).abs() < 1e-2);
    }

    #[test]
    fn velocity_consumes_baseline() {
        let mut state = EncoderState::new(1.0, at(0));
        state.record(1.5, at(100_000));

        assert!((state.velocity().as_secs() - 5.).abs() < 1e-4);
        // no new sample since, so no motion
        assert_eq!(state.velocity().as_secs(), 0.);
    }

    #[test]
    fn stalled_clock_uses_nominal_dt() {
        let mut state = EncoderState::new(1.0, at(5_000));
        state.record(1.001, at(5_000));

        assert!((state.velocity().as_secs() - 1.).abs() < 1e-2);
    }

    #[test]
    fn init_seeds_from_sensor() {
        let clock = ManualClock::new();
        let mut delay = ManualDelay::new(&clock);
        let mut sensor = ScriptedSensor::new([1.0, 1.0, 1.2, 1.2]);

        let mut state = EncoderState::init(&mut sensor, &clock, &mut delay).unwrap();

        assert_eq!(state.lap_angle(), 1.2);
        assert_eq!(state.rotation_count(), 0);
        // 0.2 rad over the 1ms seeding delay (+1us settle)
        let v = state.velocity().as_secs();
        assert!((v - 0.2 / 0.001_001).abs() < 1.);
    }

    #[test]
    fn update_keeps_state_on_sensor_error() {
        let mut sensor = ScriptedSensor::new([]);
        let mut state = EncoderState::new(2.0, at(0));

        assert!(state.update(&mut sensor, at(1_000)).is_err());
        assert_eq!(state.lap_angle(), 2.0);
        assert_eq!(state.last_sample(), at(0));
    }
}
