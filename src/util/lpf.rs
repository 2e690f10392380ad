use super::{clock::elapsed_secs, Instant};

/// Gaps longer than this mean the filter was not fed (first call, stall),
/// the next sample is taken as-is.
const RESET_AFTER_SECS: f32 = 0.3;

/// Fallback dt when the clock ran backwards.
const FALLBACK_DT_SECS: f32 = 1e-3;

/// First order, time-aware exponential smoothing.
#[derive(Clone, Copy, Debug)]
pub struct LowPassFilter {
    time_constant: f32,
    output: f32,
    last: Option<Instant>,
}

impl LowPassFilter {
    pub const fn new(time_constant: f32) -> Self {
        Self {
            time_constant,
            output: 0.,
            last: None,
        }
    }

    pub fn time_constant(&self) -> f32 {
        self.time_constant
    }

    /// Last filtered value
    pub fn output(&self) -> f32 {
        self.output
    }

    pub fn apply(&mut self, input: f32, now: Instant) -> f32 {
        let mut dt = match self.last {
            Some(last) => elapsed_secs(now, last),
            None => f32::INFINITY,
        };

        if dt < 0. {
            dt = FALLBACK_DT_SECS;
        } else if dt > RESET_AFTER_SECS {
            return self.reset(input, now);
        }

        let span = self.time_constant + dt;
        let alpha = if span > 0. {
            self.time_constant / span
        } else {
            0.
        };
        self.output = alpha * self.output + (1. - alpha) * input;
        self.last = Some(now);

        self.output
    }

    /// Jump straight to `value`, as if the filter had settled there.
    pub fn reset(&mut self, value: f32, now: Instant) -> f32 {
        self.output = value;
        self.last = Some(now);
        value
    }
}
