use core::f32::consts::{FRAC_PI_2, FRAC_PI_3, PI, TAU};

pub const PI_2: f32 = FRAC_PI_2;
pub const PI_3: f32 = FRAC_PI_3;
pub const PI3_2: f32 = 3. * FRAC_PI_2;
pub const TWO_PI: f32 = TAU;

/// Wrap an angle into `[0, 2π)`.
pub fn normalize_angle(angle: f32) -> f32 {
    let a = angle % TWO_PI;
    let a = if a < 0. { a + TWO_PI } else { a };
    // a tiny negative remainder rounds up to exactly 2π
    if a >= TWO_PI {
        0.
    } else {
        a
    }
}

pub fn deg_to_rad(deg: f32) -> f32 {
    deg / 180. * PI
}

pub fn rad_to_deg(rad: f32) -> f32 {
    rad / PI * 180.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_wraps_both_ways() {
        assert!((normalize_angle(TWO_PI + 0.5) - 0.5).abs() < 1e-5);
        assert!((normalize_angle(-0.5) - (TWO_PI - 0.5)).abs() < 1e-5);
    }

    #[test]
    fn degrees() {
        assert!((deg_to_rad(180.) - PI).abs() < 1e-6);
        assert!((rad_to_deg(PI_2) - 90.).abs() < 1e-4);
    }
}
