/// Angular velocity, rad/s
#[derive(Debug, Clone, Copy, Default, PartialOrd, PartialEq)]
pub struct Velocity(f32);

impl Velocity {
    /// Start from an angle travelled, finish with the time it took.
    pub const fn rad(radian: f32) -> Travel {
        Travel(radian)
    }

    pub const fn as_secs(self) -> f32 {
        self.0
    }
}

/// Angle travelled, waiting for its time span
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Travel(f32);

impl Travel {
    pub const fn per_sec(self, second: f32) -> Velocity {
        Velocity(self.0 / second)
    }
}
