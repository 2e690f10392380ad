#![cfg_attr(not(test), no_std)]

mod error;
pub mod knob;
pub mod motor;
pub mod pid;
pub mod profile;
pub mod sensor;
pub mod util;

#[cfg(test)]
mod testing;

pub use error::Error;
pub use knob::{Knob, KnobConfig, KnobHandle, KnobShared};
pub use motor::{ControlMode, Direction, Motor, MotorConfig, MotorControl, MotorState};
pub use profile::{KnobMode, Pulse};

use fixed::types::I16F16;

const SQRT3: I16F16 = f!("1.73205080757");

macro_rules! f {
    ($x:literal) => {
        ::fixed::types::I16F16::lit($x)
    };
    ($x:expr) => {
        ::fixed::types::I16F16::from_num($x)
    };
}

pub(crate) use f;
