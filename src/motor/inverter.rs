use core::convert::Infallible;

use embedded_hal::{
    digital::{ErrorType, OutputPin},
    pwm::SetDutyCycle,
};
use log::debug;

/// Three phase power stage.
///
/// Powers are duty fractions; implementations clamp them to `[0, 1]`.
pub trait Inverter {
    type Error: core::fmt::Debug;

    fn start(&mut self) -> Result<(), Self::Error>;

    /// Zero all phases and release the bridge.
    fn stop(&mut self) -> Result<(), Self::Error>;

    fn set_phase_powers(&mut self, a: f32, b: f32, c: f32) -> Result<(), Self::Error>;
}

impl<V: Inverter + ?Sized> Inverter for &mut V {
    type Error = V::Error;

    fn start(&mut self) -> Result<(), Self::Error> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        (**self).stop()
    }

    fn set_phase_powers(&mut self, a: f32, b: f32, c: f32) -> Result<(), Self::Error> {
        (**self).set_phase_powers(a, b, c)
    }
}

/// Placeholder for drivers whose enable line is hard wired.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoEnable;

impl ErrorType for NoEnable {
    type Error = Infallible;
}

impl OutputPin for NoEnable {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PwmError<P, E> {
    Pwm(P),
    Enable(E),
}

/// Three independent PWM channels plus an optional driver enable line.
pub struct ThreePhasePwm<A, B, C, E = NoEnable> {
    pub a: A,
    pub b: B,
    pub c: C,
    pub enable: E,
}

impl<A, B, C> ThreePhasePwm<A, B, C, NoEnable> {
    pub fn new(a: A, b: B, c: C) -> Self {
        Self {
            a,
            b,
            c,
            enable: NoEnable,
        }
    }

    pub fn with_enable<E: OutputPin>(self, enable: E) -> ThreePhasePwm<A, B, C, E> {
        ThreePhasePwm {
            a: self.a,
            b: self.b,
            c: self.c,
            enable,
        }
    }
}

impl<A, B, C, E> ThreePhasePwm<A, B, C, E>
where
    A: SetDutyCycle,
    B: SetDutyCycle<Error = A::Error>,
    C: SetDutyCycle<Error = A::Error>,
    E: OutputPin,
{
    fn power_to_duty<P: SetDutyCycle>(pwm: &P, power: f32) -> u16 {
        let max = pwm.max_duty_cycle();
        (power.clamp(0., 1.) * max as f32) as u16
    }

    pub fn set_duty(&mut self, duty: (u16, u16, u16)) -> Result<(), A::Error> {
        self.a.set_duty_cycle(duty.0)?;
        self.b.set_duty_cycle(duty.1)?;
        self.c.set_duty_cycle(duty.2)?;

        Ok(())
    }
}

impl<A, B, C, E> Inverter for ThreePhasePwm<A, B, C, E>
where
    A: SetDutyCycle,
    B: SetDutyCycle<Error = A::Error>,
    C: SetDutyCycle<Error = A::Error>,
    E: OutputPin,
{
    type Error = PwmError<A::Error, E::Error>;

    fn start(&mut self) -> Result<(), Self::Error> {
        self.enable.set_high().map_err(PwmError::Enable)?;
        debug!("Inverter enabled");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        self.set_duty((0, 0, 0)).map_err(PwmError::Pwm)?;
        self.enable.set_low().map_err(PwmError::Enable)?;
        debug!("Inverter disabled");
        Ok(())
    }

    fn set_phase_powers(&mut self, a: f32, b: f32, c: f32) -> Result<(), Self::Error> {
        let duty = (
            Self::power_to_duty(&self.a, a),
            Self::power_to_duty(&self.b, b),
            Self::power_to_duty(&self.c, c),
        );
        self.set_duty(duty).map_err(PwmError::Pwm)
    }
}
