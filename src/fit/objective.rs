//! Weighted sum-of-squared-errors objective.
//!
//! ```text
//! error_i   = lnl_i - norm_lnl(t_i)
//! objective = Σ w_i error_i²
//! ∂/∂x_k    = -2 Σ w_i error_i ∂norm_lnl(t_i)/∂x_k
//! ```
//!
//! Value and gradient are accumulated in one pass over the samples. The
//! objective borrows the sample set and the model template (which carries the
//! frozen coefficients) for the lifetime of one fit.

use crate::diagnostics::DiagnosticsSink;
use crate::domain::SampleSet;
use crate::models::{CurveModel, MAX_PARAMS};

pub struct WeightedSse<'a, M: CurveModel> {
    samples: &'a SampleSet,
    template: &'a M,
    sink: Option<&'a dyn DiagnosticsSink>,
}

impl<'a, M: CurveModel> WeightedSse<'a, M> {
    pub fn new(samples: &'a SampleSet, template: &'a M) -> Self {
        Self {
            samples,
            template,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Option<&'a dyn DiagnosticsSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Objective at `x`; fills `grad` when given.
    pub fn eval(&self, x: &[f64], mut grad: Option<&mut [f64]>) -> f64 {
        let model = self.template.with_params(x);
        let p = x.len().min(MAX_PARAMS);

        let mut point_grad = [0.0; MAX_PARAMS];
        if let Some(g) = grad.as_deref_mut() {
            g.fill(0.0);
        }

        let mut sum = 0.0;
        for (t, lnl, w) in self.samples.iter() {
            let err = lnl - model.norm_lnl(t);
            sum += w * err * err;

            if let Some(g) = grad.as_deref_mut() {
                model.norm_gradient(t, &mut point_grad[..p]);
                for k in 0..p {
                    g[k] -= 2.0 * w * err * point_grad[k];
                }
            }
        }

        if let Some(sink) = self.sink {
            sink.iterate(M::NAME, self.template.param_names(), x, sum, grad.as_deref());
        }

        sum
    }

    /// Per-sample `lnl_i - norm_lnl(t_i)` at `x`.
    pub fn residuals(&self, x: &[f64]) -> Vec<f64> {
        let model = self.template.with_params(x);
        self.samples
            .iter()
            .map(|(t, lnl, _)| lnl - model.norm_lnl(t))
            .collect()
    }
}
