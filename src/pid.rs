use crate::util::{clock::elapsed_secs, Instant};

/// dt used when the previous call is missing, too old or in the future
const FALLBACK_DT_SECS: f32 = 1e-3;
const MAX_DT_SECS: f32 = 0.5;

/// Proportional, integral and derivative gains.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PidGains {
    pub p: f32,
    pub i: f32,
    pub d: f32,
}

impl PidGains {
    pub const fn new(p: f32, i: f32, d: f32) -> Self {
        Self { p, i, d }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PIDController {
    gains: PidGains,

    /// Rate limit for output, per second
    output_ramp: Option<f32>,

    /// Limit of output and integral
    limit: f32,

    /// State
    state: PIDState,
}

#[derive(Clone, Copy, Debug)]
struct PIDState {
    /// Integral
    integral: f32,

    /// Previous error
    err: f32,

    /// Previous output
    output: f32,

    /// Time of the previous regulation
    timestamp: Option<Instant>,
}

impl PIDController {
    pub const fn new() -> Self {
        Self {
            gains: PidGains::new(0., 0., 0.),
            output_ramp: None,
            limit: f32::MAX,
            state: PIDState {
                integral: 0.0,
                err: 0.0,
                output: 0.0,
                timestamp: None,
            },
        }
    }

    pub const fn p(mut self, p: f32) -> Self {
        self.gains.p = p;
        self
    }

    pub const fn i(mut self, i: f32) -> Self {
        self.gains.i = i;
        self
    }

    pub const fn d(mut self, d: f32) -> Self {
        self.gains.d = d;
        self
    }

    pub const fn gains(mut self, gains: PidGains) -> Self {
        self.gains = gains;
        self
    }

    /// Non-positive ramps disable rate limiting.
    pub const fn ramp(mut self, ramp: f32) -> Self {
        self.output_ramp = if ramp > 0. { Some(ramp) } else { None };
        self
    }

    pub const fn limit(mut self, limit: f32) -> Self {
        self.limit = limit;
        self
    }

    /// Replace gains in place, running state is kept.
    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn set_limit(&mut self, limit: f32) {
        self.limit = limit;
    }

    pub fn get_gains(&self) -> PidGains {
        self.gains
    }

    pub fn get_limit(&self) -> f32 {
        self.limit
    }

    /// Last value returned by [`regulate`](Self::regulate)
    pub fn output(&self) -> f32 {
        self.state.output
    }

    pub fn regulate(&mut self, err: f32, now: Instant) -> f32 {
        let dt = match self.state.timestamp {
            Some(last) => elapsed_secs(now, last),
            None => 0.,
        };
        let dt = if dt <= 0. || dt > MAX_DT_SECS {
            FALLBACK_DT_SECS
        } else {
            dt
        };

        let PidGains { p, i, d } = self.gains;

        let p = p * err;
        let i = (self.state.integral + i * dt * 0.5 * (err + self.state.err))
            .clamp(-self.limit, self.limit);
        let d = d * (err - self.state.err) / dt;

        let mut output = (p + i + d).clamp(-self.limit, self.limit);

        if let Some(ramp) = self.output_ramp {
            let rate = (output - self.state.output) / dt;
            if rate > ramp {
                output = self.state.output + ramp * dt;
            } else if rate < -ramp {
                output = self.state.output - ramp * dt;
            }
            // the limit may have shrunk since the previous output
            output = output.clamp(-self.limit, self.limit);
        }

        self.state.integral = i;
        self.state.err = err;
        self.state.output = output;
        self.state.timestamp = Some(now);

        output
    }
}

impl Default for PIDController {
    fn default() -> Self {
        Self::new()
    }
}
