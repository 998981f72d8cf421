//! Three-parameter BSM form `{c, m, θb; d1}`, anchored at `t = 0`.
//!
//! `θb = θ(0)` replaces the offset `b`, and the rate is solved from the slope
//! `d1` observed at `t = 0`:
//!
//! ```text
//! q    = (c - m) θb - c - m
//! r    = d1 (θb² - 1) / ((m - c) θb + m + c)  = -d1 (θb² - 1) / q
//! b    = ln(θb) / r
//! θ(t) = θb exp(r t)
//! ```
//!
//! `r`, `q` and `b` are always derived on demand, never stored.

use crate::error::FitError;
use crate::fit::constraints::DomainConstraint;
use crate::math::{bsm_lnl, ln_one_minus_inv, ln_one_plus_inv, slope_factor};
use crate::models::bsm::Bsm4;
use crate::models::model::CurveModel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bsm3 {
    pub c: f64,
    pub m: f64,
    pub theta_b: f64,
    pub d1: f64,
}

impl Bsm3 {
    pub fn new(c: f64, m: f64, theta_b: f64, d1: f64) -> Self {
        Self { c, m, theta_b, d1 }
    }

    pub fn var_r(&self) -> f64 {
        let (c, m, tb) = (self.c, self.m, self.theta_b);
        self.d1 * (tb * tb - 1.0) / ((m - c) * tb + m + c)
    }

    pub fn var_q(&self) -> f64 {
        (self.c - self.m) * self.theta_b - self.c - self.m
    }

    pub fn var_b(&self) -> f64 {
        self.theta_b.ln() / self.var_r()
    }

    pub fn var_theta(&self, t: f64) -> f64 {
        self.theta_b * (self.var_r() * t).exp()
    }

    /// Gradient of `norm_lnl(t) = lnl(t) - lnl(0)` with respect to `(c, m, θb)`.
    pub fn gradient(&self, t: f64, grad: &mut [f64]) {
        let (c, m, tb, d1) = (self.c, self.m, self.theta_b, self.d1);
        let r = self.var_r();
        let q = self.var_q();
        let theta = self.var_theta(t);
        let s = slope_factor(c, m, theta);

        let dr_dc = -r * (tb - 1.0) / q;
        let dr_dm = r * (tb + 1.0) / q;
        let dr_dtb = -2.0 * d1 * tb / q - r * (c - m) / q;

        grad[0] = ln_one_plus_inv(theta) - ln_one_plus_inv(tb) + s * t * dr_dc;
        grad[1] = ln_one_minus_inv(theta) - ln_one_minus_inv(tb) + s * t * dr_dm;
        grad[2] = s * (1.0 / tb + t * dr_dtb) + c / (tb * (tb + 1.0)) - m / (tb * (tb - 1.0));
    }
}

impl CurveModel for Bsm3 {
    const NAME: &'static str = "bsm3";

    fn param_names(&self) -> &'static [&'static str] {
        &["c", "m", "theta_b"]
    }

    fn params(&self) -> Vec<f64> {
        vec![self.c, self.m, self.theta_b]
    }

    fn set_params(&mut self, x: &[f64]) {
        self.c = x[0];
        self.m = x[1];
        self.theta_b = x[2];
    }

    fn anchor(&self) -> f64 {
        0.0
    }

    fn lnl(&self, t: f64) -> f64 {
        bsm_lnl(self.c, self.m, self.var_theta(t))
    }

    fn norm_gradient(&self, t: f64, grad: &mut [f64]) {
        self.gradient(t, grad);
    }

    fn constraints(&self) -> Vec<DomainConstraint> {
        vec![
            DomainConstraint::Ordering,
            DomainConstraint::RateSign { d1: self.d1 },
        ]
    }

    fn to_unconstrained(&self) -> Result<Bsm4, FitError> {
        let r = self.var_r();
        let b = self.var_b();
        log::debug!("bsm3 -> bsm4: r = {r}, b = {b}");
        Bsm4::validated(self.c, self.m, r, b)
    }
}
