//! Unconstrained 4-parameter BSM curve `{c, m, r, b}`.
//!
//! `θ(t) = exp(r (t + b))`. Both reduced forms convert into this one after a
//! fit, and synthetic sample generation evaluates it directly.

use crate::error::FitError;
use crate::math::{bsm_lnl, curvature_factor, slope_factor, stationary_theta};
use crate::optim::FEASIBILITY_SLACK;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bsm4 {
    pub c: f64,
    pub m: f64,
    pub r: f64,
    pub b: f64,
}

impl Bsm4 {
    pub fn new(c: f64, m: f64, r: f64, b: f64) -> Self {
        Self { c, m, r, b }
    }

    /// Build from a reduced form's derived `r` and `b`, rejecting `r ≤ 0` or `b < 0`.
    ///
    /// A fit that ends on the `b ≥ 0` boundary may land a rounding error below
    /// it; offsets within the optimizer's feasibility slack snap to `0`.
    pub fn validated(c: f64, m: f64, r: f64, b: f64) -> Result<Self, FitError> {
        let b = if (-FEASIBILITY_SLACK..0.0).contains(&b) { 0.0 } else { b };
        if r > 0.0 && b >= 0.0 && r.is_finite() && b.is_finite() {
            Ok(Self { c, m, r, b })
        } else {
            Err(FitError::InvalidReparameterization { r, b })
        }
    }

    pub fn theta(&self, t: f64) -> f64 {
        (self.r * (t + self.b)).exp()
    }

    pub fn lnl(&self, t: f64) -> f64 {
        bsm_lnl(self.c, self.m, self.theta(t))
    }

    /// First derivative `d lnl / dt`.
    pub fn d1(&self, t: f64) -> f64 {
        self.r * slope_factor(self.c, self.m, self.theta(t))
    }

    /// Second derivative `d² lnl / dt²`.
    pub fn d2(&self, t: f64) -> f64 {
        self.r * self.r * curvature_factor(self.c, self.m, self.theta(t))
    }

    /// Location of the likelihood maximum (may be negative, i.e. outside `t ≥ 0`).
    pub fn ml_t(&self) -> f64 {
        stationary_theta(self.c, self.m).ln() / self.r - self.b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn derivatives_match_finite_differences() {
        let model = Bsm4::new(20.0, 2.0, 2.0, 0.5);
        let h = 1e-5;
        for &t in &[0.0, 0.3, 1.0] {
            let fd1 = (model.lnl(t + h) - model.lnl(t - h)) / (2.0 * h);
            let fd2 = (model.d1(t + h) - model.d1(t - h)) / (2.0 * h);
            assert_relative_eq!(model.d1(t), fd1, max_relative = 1e-6);
            assert_relative_eq!(model.d2(t), fd2, max_relative = 1e-6);
        }
    }

    #[test]
    fn ml_t_is_a_stationary_point() {
        let model = Bsm4::new(10.0, 3.0, 1.5, 1.0);
        let t = model.ml_t();
        assert!(model.d1(t).abs() < 1e-10);
        assert!(model.d2(t) < 0.0);
    }

    #[test]
    fn validated_rejects_negative_offset() {
        assert!(Bsm4::validated(2.0, 1.0, 1.0, 0.0).is_ok());
        assert_eq!(
            Bsm4::validated(2.0, 1.0, 1.0, -0.1),
            Err(FitError::InvalidReparameterization { r: 1.0, b: -0.1 })
        );
        assert!(Bsm4::validated(2.0, 1.0, -1.0, 0.5).is_err());
    }

    #[test]
    fn validated_snaps_boundary_rounding_to_zero() {
        let m = Bsm4::validated(10.0, 3.0, 0.4375, -2.220446049250313e-16).unwrap();
        assert_eq!(m.b, 0.0);
        assert!(Bsm4::validated(10.0, 3.0, 0.4375, -1e-6).is_err());
    }
}
