//! The lower real branch of the Lambert W function, `W₋₁`.
//!
//! `W₋₁(x)` is the unique solution `w <= -1` of `w·eʷ = x` for
//! `x ∈ [-1/e, 0)`. This is a pure mathematical helper with no dependency on
//! the rest of the engine; it exists because two beam profiles (§4.2's
//! top-hat-focus/LG01 radial and divergence sampling) invert a CDF that has
//! no closed form without it.
//!
//! Implemented as Halley's method (cubic convergence) seeded with the
//! asymptotic series expansion in Corless et al. (1996), "On the Lambert W
//! Function" — the same numerical contract the original engine delegated to
//! the GNU Scientific Library's `gsl_sf_lambert_Wm1`.

use std::f64::consts::E;

/// Evaluates `W₋₁(x)` for `x ∈ [-1/e, 0)`.
///
/// Panics in debug builds if `x` is outside the branch's domain; in release
/// builds the result is unspecified (but finite) for out-of-domain input,
/// since callers in this crate only ever pass `-u/e` for `u ∈ (0, 1]`.
pub fn lambert_wm1(x: f64) -> f64 {
    let neg_inv_e = -1.0 / E;
    debug_assert!(
        x >= neg_inv_e && x < 0.0,
        "lambert_wm1 domain is [-1/e, 0), got {x}"
    );
    if x <= neg_inv_e {
        return -1.0;
    }

    let l1 = (-x).ln();
    let l2 = (-l1).ln();
    let mut w = l1 - l2 + l2 / l1 + l2 * (l2 - 2.0) / (2.0 * l1 * l1);

    for _ in 0..50 {
        let ew = w.exp();
        let wew_minus_x = w * ew - x;
        let denom = ew * (w + 1.0) - (w + 2.0) * wew_minus_x / (2.0 * w + 2.0);
        if denom == 0.0 || !denom.is_finite() {
            break;
        }
        let dw = wew_minus_x / denom;
        w -= dw;
        if dw.abs() <= 1e-14 * w.abs().max(1.0) {
            break;
        }
    }
    w
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfies_w_exp_w_equals_x() {
        for &x in &[-0.36, -0.2, -0.1, -0.01, -1e-4, -1e-8] {
            let w = lambert_wm1(x);
            assert!(w <= -1.0, "W_-1({x}) = {w} should be <= -1");
            let reconstructed = w * w.exp();
            assert!(
                (reconstructed - x).abs() < 1e-8 * x.abs().max(1e-8),
                "W_-1({x}) = {w}, w*e^w = {reconstructed}"
            );
        }
    }

    #[test]
    fn boundary_value_is_minus_one() {
        let w = lambert_wm1(-1.0 / E);
        assert!((w - (-1.0)).abs() < 1e-9);
    }

    #[test]
    fn diverges_towards_minus_infinity_as_x_approaches_zero() {
        let w_far = lambert_wm1(-1e-20);
        assert!(w_far < -30.0);
    }
}
