/// Failures surfaced at initialisation and calibration boundaries.
///
/// The control tick itself never returns one of these; faults inside a tick
/// are logged and the loop carries on with the last known state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("encoder is not ready")]
    EncoderNotReady,

    #[error("inverter is not ready")]
    InverterNotReady,

    /// The rotor did not move while sweeping the electrical angle, the
    /// encoder is most likely not coupled to the motor.
    #[error("no movement detected during calibration")]
    NoMovement,

    #[error("motor is not calibrated")]
    NotCalibrated,

    #[error("inverter rejected a command")]
    Inverter,
}
