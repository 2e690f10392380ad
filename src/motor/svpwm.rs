use cordic::sin;
use fixed::types::I16F16;
use num_traits::Float;

use crate::{
    f,
    util::math::{normalize_angle, PI_2, PI_3},
    SQRT3,
};

/// Phase powers for a voltage vector `(v_q, v_d)` at electrical `angle`.
///
/// The modulation index is taken against the nominal `supply` voltage. With
/// `v_d == 0` the vector is `v_q` rotated by a quarter turn; `atan2` is only
/// used when there is a direct component.
pub fn phase_powers(v_q: f32, v_d: f32, angle: f32, supply: f32) -> (f32, f32, f32) {
    let (modulation, angle) = if v_d != 0. {
        (
            Float::sqrt(v_d * v_d + v_q * v_q),
            normalize_angle(angle + Float::atan2(v_q, v_d)),
        )
    } else {
        (v_q, normalize_angle(angle + PI_2))
    };

    let modulation = f!(modulation / supply);

    // 1..=6, rounding at the upper bound stays in the last sector
    let sector = (Float::floor(angle / PI_3) as u8 + 1).min(6);

    let t1 = SQRT3 * sin(f!(sector as f32 * PI_3 - angle)) * modulation;
    let t2 = SQRT3 * sin(f!(angle - (sector - 1) as f32 * PI_3)) * modulation;
    let t0 = I16F16::ONE - t1 - t2;
    let t0_2 = t0 / 2;

    let (a, b, c) = match sector {
        1 => (t1 + t2 + t0_2, t2 + t0_2, t0_2),
        2 => (t1 + t0_2, t1 + t2 + t0_2, t0_2),
        3 => (t0_2, t1 + t2 + t0_2, t2 + t0_2),
        4 => (t0_2, t1 + t0_2, t1 + t2 + t0_2),
        5 => (t2 + t0_2, t0_2, t1 + t2 + t0_2),
        _ => (t1 + t2 + t0_2, t0_2, t1 + t0_2),
    };

    (a.to_num(), b.to_num(), c.to_num())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::math::TWO_PI;

    /// Angle and amplitude of the vector the three phases produce
    fn vector((a, b, c): (f32, f32, f32)) -> (f32, f32) {
        let alpha = a - (b + c) / 2.;
        let beta = 3f32.sqrt() / 2. * (b - c);
        (normalize_angle(beta.atan2(alpha)), alpha.hypot(beta))
    }

    fn angle_diff(x: f32, y: f32) -> f32 {
        let d = normalize_angle(x - y);
        d.min(TWO_PI - d)
    }

    #[test]
    fn zero_voltage_centers_all_phases() {
        let (a, b, c) = phase_powers(0., 0., 1.2, 12.);
        for p in [a, b, c] {
            assert!((p - 0.5).abs() < 1e-3);
        }
    }

    #[test]
    fn quadrature_vector_leads_by_quarter_turn() {
        for k in 0..36 {
            let angle = k as f32 * TWO_PI / 36.;
            let (vec_angle, _) = vector(phase_powers(6., 0., angle, 12.));
            let expected = normalize_angle(angle + PI_2);
            assert!(
                angle_diff(vec_angle, expected) < 5e-3,
                "{angle}: {vec_angle} vs {expected}"
            );
        }
    }

    #[test]
    fn amplitude_is_constant_across_sectors() {
        let amplitudes = (0..60).map(|k| {
            let angle = k as f32 * TWO_PI / 60.;
            vector(phase_powers(3., 0., angle, 12.)).1
        });
        for amp in amplitudes {
            // 3V of 12V, scaled by the 3/2 of the Clarke projection
            assert!((amp - 0.375).abs() < 2e-3, "{amp}");
        }
    }

    #[test]
    fn direct_component_rotates_vector() {
        // pure v_d points along the electrical angle itself
        let (vec_angle, _) = vector(phase_powers(0., 4., 1., 12.));
        assert!(angle_diff(vec_angle, 1.) < 5e-3);

        // 45 degrees between d and q
        let (vec_angle, amp) = vector(phase_powers(4., 4., 0.3, 12.));
        assert!(angle_diff(vec_angle, 0.3 + PI_2 / 2.) < 5e-3);
        assert!((amp - 1.5 * 32f32.sqrt() / 12.).abs() < 2e-3);
    }

    #[test]
    fn powers_stay_in_range_below_full_modulation() {
        for k in 0..100 {
            let angle = k as f32 * TWO_PI / 100.;
            let (a, b, c) = phase_powers(6.9, 0., angle, 12.);
            for p in [a, b, c] {
                assert!((-1e-3..=1. + 1e-3).contains(&p));
            }
        }
    }

    #[test]
    fn negative_voltage_reverses_vector() {
        let (forward, _) = vector(phase_powers(2., 0., 0.4, 12.));
        let (backward, _) = vector(phase_powers(-2., 0., 0.4, 12.));
        assert!(angle_diff(forward, normalize_angle(backward + core::f32::consts::PI)) < 5e-3);
    }
}
