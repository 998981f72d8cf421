//! Two-parameter BSM form `{c, m; t0, d1, d2}`.
//!
//! The curve's maximum is pinned at `t0` with curvature `d2`:
//!
//! ```text
//! θ0   = (c + m) / (c - m)               stationary point of lnl(θ)
//! r    = 2 sqrt(-c m d2 / (c + m)) / (c - m)
//! θ(t) = θ0 exp(r (t - t0))
//! b    = ln(θ0) / r - t0                  must be ≥ 0
//! ```
//!
//! Only `c` and `m` are fitted. `d1` is carried along as a frozen coefficient
//! (the slope at an interior maximum is zero) and does not enter the curve.

use crate::error::FitError;
use crate::fit::constraints::DomainConstraint;
use crate::math::{bsm_lnl, ln_one_minus_inv, ln_one_plus_inv, slope_factor, stationary_theta};
use crate::models::bsm::Bsm4;
use crate::models::model::CurveModel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bsm2 {
    pub c: f64,
    pub m: f64,
    pub t0: f64,
    pub d1: f64,
    pub d2: f64,
}

impl Bsm2 {
    pub fn new(c: f64, m: f64, t0: f64, d1: f64, d2: f64) -> Self {
        Self { c, m, t0, d1, d2 }
    }

    pub fn theta_max(&self) -> f64 {
        stationary_theta(self.c, self.m)
    }

    pub fn r(&self) -> f64 {
        let (c, m) = (self.c, self.m);
        2.0 * (-c * m * self.d2 / (c + m)).sqrt() / (c - m)
    }

    pub fn b(&self) -> f64 {
        self.theta_max().ln() / self.r() - self.t0
    }

    pub fn theta(&self, t: f64) -> f64 {
        self.theta_max() * (self.r() * (t - self.t0)).exp()
    }

    /// Gradient of `norm_lnl(t)` with respect to `(c, m)`.
    ///
    /// `θ0` is stationary in `lnl(θ)`, so the anchor term only contributes its
    /// explicit `c`/`m` dependence.
    pub fn gradient(&self, t: f64, grad: &mut [f64]) {
        let (c, m) = (self.c, self.m);
        let r = self.r();
        let theta0 = self.theta_max();
        let theta = self.theta(t);
        let s = slope_factor(c, m, theta);
        let dt = t - self.t0;

        let den = c * c - m * m;
        let dln_theta0_dc = -2.0 * m / den;
        let dln_theta0_dm = 2.0 * c / den;
        let dln_r_dc = m / (2.0 * c * (c + m)) - 1.0 / (c - m);
        let dln_r_dm = c / (2.0 * m * (c + m)) + 1.0 / (c - m);

        grad[0] = ln_one_plus_inv(theta) - ln_one_plus_inv(theta0)
            + s * (dln_theta0_dc + dt * r * dln_r_dc);
        grad[1] = ln_one_minus_inv(theta) - ln_one_minus_inv(theta0)
            + s * (dln_theta0_dm + dt * r * dln_r_dm);
    }
}

impl CurveModel for Bsm2 {
    const NAME: &'static str = "bsm2";

    fn param_names(&self) -> &'static [&'static str] {
        &["c", "m"]
    }

    fn params(&self) -> Vec<f64> {
        vec![self.c, self.m]
    }

    fn set_params(&mut self, x: &[f64]) {
        self.c = x[0];
        self.m = x[1];
    }

    fn anchor(&self) -> f64 {
        self.t0
    }

    fn lnl(&self, t: f64) -> f64 {
        bsm_lnl(self.c, self.m, self.theta(t))
    }

    fn norm_gradient(&self, t: f64, grad: &mut [f64]) {
        self.gradient(t, grad);
    }

    fn constraints(&self) -> Vec<DomainConstraint> {
        vec![
            DomainConstraint::Ordering,
            DomainConstraint::RatePositivity {
                t0: self.t0,
                d2: self.d2,
            },
        ]
    }

    fn to_unconstrained(&self) -> Result<Bsm4, FitError> {
        let r = self.r();
        let b = self.b();
        log::debug!("bsm2 -> bsm4: r = {r}, b = {b}");
        Bsm4::validated(self.c, self.m, r, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn model() -> Bsm2 {
        Bsm2::new(10.0, 3.0, 0.1, 0.0, -20.0)
    }

    #[test]
    fn maximum_sits_at_t0_with_requested_curvature() {
        let m = model();
        let full = m.to_unconstrained().unwrap();
        assert_relative_eq!(full.ml_t(), m.t0, epsilon = 1e-12);
        assert_relative_eq!(full.d1(m.t0), 0.0, epsilon = 1e-10);
        assert_relative_eq!(full.d2(m.t0), m.d2, max_relative = 1e-10);
    }

    #[test]
    fn norm_lnl_is_zero_at_anchor() {
        let m = model();
        assert_eq!(m.norm_lnl(m.t0), 0.0);
        assert!(m.norm_lnl(0.5) < 0.0);
    }

    #[test]
    fn gradient_matches_central_differences() {
        let h = 1e-6;
        for base in [model(), Bsm2::new(1500.0, 30.0, 0.02, 0.0, -5000.0)] {
            for &t in &[0.0, base.t0 + 0.05, 0.4] {
                let mut grad = [0.0; 2];
                base.gradient(t, &mut grad);
                for k in 0..2 {
                    let mut x = base.params();
                    let step = h * x[k];
                    x[k] += step;
                    let up = base.with_params(&x).norm_lnl(t);
                    x[k] -= 2.0 * step;
                    let down = base.with_params(&x).norm_lnl(t);
                    let fd = (up - down) / (2.0 * step);
                    assert!(
                        (grad[k] - fd).abs() <= 1e-6 * (1.0 + fd.abs()),
                        "t = {t}, k = {k}: analytic {} vs fd {fd}",
                        grad[k]
                    );
                }
            }
        }
    }

    #[test]
    fn negative_offset_is_an_invalid_reparameterization() {
        // Large t0 pushes b = ln(θ0)/r - t0 below zero.
        let m = Bsm2::new(10.0, 3.0, 5.0, 0.0, -20.0);
        assert!(matches!(
            m.to_unconstrained(),
            Err(FitError::InvalidReparameterization { .. })
        ));
    }
}
