//! Stable building blocks of the binary symmetric model (BSM) log-likelihood.
//!
//! Every BSM variant evaluates the same curve in terms of `θ = exp(r (t + b))`:
//!
//! - `lnl(θ) = c ln(1 + 1/θ) + m ln(1 - 1/θ) - (c + m) ln 2`
//!
//! Numerical notes:
//! - For large `θ` both logarithms approach zero and `ln(1 ± x)` loses precision,
//!   so we go through `ln_1p`.
//! - `θ = 1` gives `ln 0 = -∞` and `θ < 1` gives NaN. Callers rely on this: a
//!   non-finite value marks a parameter point outside the feasible region.

/// `ln(1 + 1/θ)`.
pub fn ln_one_plus_inv(theta: f64) -> f64 {
    theta.recip().ln_1p()
}

/// `ln(1 - 1/θ)`; `-∞` at `θ = 1`, NaN below.
pub fn ln_one_minus_inv(theta: f64) -> f64 {
    (-theta.recip()).ln_1p()
}

/// BSM log-likelihood as a function of `θ`.
pub fn bsm_lnl(c: f64, m: f64, theta: f64) -> f64 {
    c * ln_one_plus_inv(theta) + m * ln_one_minus_inv(theta) - (c + m) * std::f64::consts::LN_2
}

/// `θ · ∂lnl/∂θ = -c/(θ + 1) + m/(θ - 1)`.
///
/// Zero at the stationary point `θ* = (c + m)/(c - m)`. With `dθ/dt = r θ` this
/// is also `lnl'(t) / r`.
pub fn slope_factor(c: f64, m: f64, theta: f64) -> f64 {
    -c / (theta + 1.0) + m / (theta - 1.0)
}

/// `θ² · ∂²lnl/∂(ln θ)²` style curvature term: `c θ/(θ + 1)² - m θ/(θ - 1)²`.
///
/// `lnl''(t) = r² · curvature_factor(θ)`.
pub fn curvature_factor(c: f64, m: f64, theta: f64) -> f64 {
    c * theta / (theta + 1.0).powi(2) - m * theta / (theta - 1.0).powi(2)
}

/// Stationary point `θ* = (c + m)/(c - m)` of `lnl(θ)`.
pub fn stationary_theta(c: f64, m: f64) -> f64 {
    (c + m) / (c - m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_terms_match_naive_forms() {
        for &theta in &[1.5, 2.0, 10.0, 1e3] {
            assert!((ln_one_plus_inv(theta) - (1.0 + 1.0 / theta).ln()).abs() < 1e-12);
            assert!((ln_one_minus_inv(theta) - (1.0 - 1.0 / theta).ln()).abs() < 1e-12);
        }
    }

    #[test]
    fn lnl_is_non_finite_at_and_below_unit_theta() {
        assert_eq!(bsm_lnl(2.0, 1.0, 1.0), f64::NEG_INFINITY);
        assert!(bsm_lnl(2.0, 1.0, 0.5).is_nan());
    }

    #[test]
    fn slope_factor_vanishes_at_stationary_theta() {
        let (c, m) = (7.0, 3.0);
        let theta = stationary_theta(c, m);
        assert!(slope_factor(c, m, theta).abs() < 1e-12);
        // Maximum, not minimum.
        assert!(curvature_factor(c, m, theta) < 0.0);
    }

    #[test]
    fn lnl_tends_to_minus_total_ln2_for_large_theta() {
        let v = bsm_lnl(5.0, 2.0, 1e12);
        assert!((v + 7.0 * std::f64::consts::LN_2).abs() < 1e-9);
    }
}
