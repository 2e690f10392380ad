pub mod clock;
pub mod lpf;
pub mod math;
pub mod velocity;

pub use clock::{Clock, Duration, Instant};
pub use lpf::LowPassFilter;
pub use velocity::Velocity;
