use embedded_hal::delay::DelayNs;
use log::{debug, error, info};
use num_traits::Float;

use super::{Calibration, Direction, Inverter, Motor};
use crate::{
    sensor::AngleSensor,
    util::{
        math::{rad_to_deg, PI3_2, TWO_PI},
        Clock,
    },
    Error,
};

/// Steps per electrical revolution while sweeping
const SWEEP_STEPS: u32 = 500;
const SWEEP_STEP_MS: u32 = 2;
const ENERGIZE_SETTLE_MS: u32 = 100;
const ZERO_SETTLE_MS: u32 = 200;
const ALIGN_SETTLE_MS: u32 = 1000;

fn sweep_angle(step: u32) -> f32 {
    PI3_2 + TWO_PI * step as f32 / SWEEP_STEPS as f32
}

impl<S, V, C, const POLE: u8> Motor<S, V, C, POLE>
where
    S: AngleSensor,
    V: Inverter,
    C: Clock,
{
    /// Find the encoder direction and the electrical zero by dragging the
    /// rotor around with an open loop field.
    ///
    /// Blocks for about 3.3s and owns the motor for the whole time. The
    /// motor is left disabled. On failure the previous calibration is
    /// dropped.
    pub fn calibrate_auto<D: DelayNs>(&mut self, delay: &mut D) -> Result<Calibration, Error> {
        info!("Calibration start");

        self.enabled = false;
        self.calibration = Calibration::UNKNOWN;

        if let Err(e) = self.inverter.start() {
            error!("Inverter failed to start: {e:?}");
            self.faults = self.faults.wrapping_add(1);
            return Err(Error::Inverter);
        }
        delay.delay_ms(ENERGIZE_SETTLE_MS);

        debug!("Find natural direction");
        let volt = self.config.calibration_voltage;

        for step in 0..=SWEEP_STEPS {
            self.set_phase_voltage(volt, 0., sweep_angle(step));
            delay.delay_ms(SWEEP_STEP_MS);
        }

        self.update_encoder();
        let mid_angle = self.encoder.full_angle();
        debug!("Read angle 1: {mid_angle} ({} deg)", rad_to_deg(mid_angle));

        for step in (0..=SWEEP_STEPS).rev() {
            self.set_phase_voltage(volt, 0., sweep_angle(step));
            delay.delay_ms(SWEEP_STEP_MS);
        }

        self.update_encoder();
        let end_angle = self.encoder.full_angle();
        debug!("Read angle 2: {end_angle} ({} deg)", rad_to_deg(end_angle));

        self.set_phase_voltage(0., 0., 0.);
        delay.delay_ms(ZERO_SETTLE_MS);

        let angle_delta = Float::abs(mid_angle - end_angle);
        debug!(
            "Angle delta: {angle_delta} ({} deg)",
            rad_to_deg(angle_delta)
        );

        if angle_delta <= 0. {
            error!("No movement detected");
            self.release_inverter();
            return Err(Error::NoMovement);
        }

        let direction = if mid_angle < end_angle {
            Direction::Ccw
        } else {
            Direction::Cw
        };
        info!("Detected encoder direction: {direction:?}");

        self.set_phase_voltage(volt, 0., PI3_2);
        delay.delay_ms(ALIGN_SETTLE_MS);

        self.update_encoder();
        self.calibration = Calibration {
            zero_offset: 0.,
            direction,
        };
        self.calibration.zero_offset = self.electrical_angle();
        info!(
            "Zero offset: {} ({} deg)",
            self.calibration.zero_offset,
            rad_to_deg(self.calibration.zero_offset)
        );

        self.release_inverter();
        info!("Calibration finished");

        self.update_encoder();
        self.refresh_angle_estimate();

        Ok(self.calibration)
    }

    fn release_inverter(&mut self) {
        if let Err(e) = self.inverter.stop() {
            error!("Inverter failed to stop: {e:?}");
            self.faults = self.faults.wrapping_add(1);
        }
    }
}
