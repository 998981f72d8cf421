//! The seam between concrete BSM parameterizations and the generic fit engine.
//!
//! The fitter only needs a handful of primitive operations:
//! - read / write the free-parameter vector
//! - evaluate the normalized log-likelihood and its gradient at `t`
//! - describe the feasible region (box bounds + inequality constraints)
//!
//! Fixed coefficients (`t0`, `d1`, `d2`) live inside the implementing type and
//! are never touched by `set_params`.

use crate::error::FitError;
use crate::fit::constraints::DomainConstraint;
use crate::models::bsm::Bsm4;

/// Largest number of free parameters of any model form.
pub const MAX_PARAMS: usize = 3;

pub trait CurveModel: Clone {
    /// Short label for logs and reports.
    const NAME: &'static str;

    /// Names of the free parameters, in `params()` order.
    fn param_names(&self) -> &'static [&'static str];

    /// Current free-parameter vector.
    fn params(&self) -> Vec<f64>;

    /// Overwrite the free parameters from `x` (same order as `params()`).
    fn set_params(&mut self, x: &[f64]);

    /// Copy of `self` with the free parameters replaced by `x`.
    fn with_params(&self, x: &[f64]) -> Self {
        let mut model = self.clone();
        model.set_params(x);
        model
    }

    /// Point at which `norm_lnl` is pinned to zero.
    fn anchor(&self) -> f64;

    fn lnl(&self, t: f64) -> f64;

    /// `lnl(t) - lnl(anchor)`; exactly zero at the anchor whenever it is finite.
    fn norm_lnl(&self, t: f64) -> f64 {
        self.lnl(t) - self.lnl(self.anchor())
    }

    /// Gradient of `norm_lnl(t)` with respect to the free parameters.
    fn norm_gradient(&self, t: f64, grad: &mut [f64]);

    /// Box lower bounds for the free parameters.
    fn lower_bounds(&self) -> Vec<f64> {
        vec![1.0; self.params().len()]
    }

    /// Inequality constraints `g(x) ≤ 0` that keep the model defined.
    fn constraints(&self) -> Vec<DomainConstraint>;

    /// Equivalent unconstrained `{c, m, r, b}` curve.
    fn to_unconstrained(&self) -> Result<Bsm4, FitError>;
}
