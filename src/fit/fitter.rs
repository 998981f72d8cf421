//! Fit driver: weighted constrained least squares for any `CurveModel`.
//!
//! Given:
//! - samples `(t_i, lnl_i, w_i)`, with `lnl` already normalized to the anchor
//! - a model whose free parameters are the starting point
//!
//! we minimize the weighted SSE subject to the model's box bounds and domain
//! constraints, then write the optimizer's last iterate back into the model.
//!
//! The model is overwritten on every non-error path (best effort), so callers
//! must inspect `FitReport::status` (or call `ensure_converged`) rather than
//! assume convergence.

use log::{debug, info, warn};

use crate::diagnostics::DiagnosticsSink;
use crate::domain::SampleSet;
use crate::error::FitError;
use crate::fit::objective::WeightedSse;
use crate::models::CurveModel;
use crate::optim::{OptStatus, Sqp};

/// Optimizer knobs shared by every fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    /// Budget on objective evaluations.
    pub max_eval: usize,
    /// Relative tolerance on the parameter vector.
    pub xtol_rel: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_eval: 1000,
            xtol_rel: f64::EPSILON.sqrt(),
        }
    }
}

/// Outcome of one fit; the fitted parameters live in the model itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    pub status: OptStatus,
    /// Weighted SSE at the returned parameters.
    pub sum_sq_err: f64,
    pub evaluations: usize,
}

impl FitReport {
    pub fn converged(&self) -> bool {
        self.status.is_converged()
    }

    /// Optimizer status code: positive is success, negative is failure.
    pub fn code(&self) -> i32 {
        self.status.code()
    }

    pub fn ensure_converged(&self) -> Result<(), FitError> {
        if self.converged() {
            Ok(())
        } else {
            Err(FitError::NotConverged {
                status: self.status,
                evaluations: self.evaluations,
            })
        }
    }
}

/// Fit with unit weights.
pub fn fit<M: CurveModel>(
    model: &mut M,
    t: &[f64],
    lnl: &[f64],
    options: &FitOptions,
    sink: Option<&dyn DiagnosticsSink>,
) -> Result<FitReport, FitError> {
    let samples = SampleSet::unweighted(t.to_vec(), lnl.to_vec())?;
    fit_weighted(model, &samples, options, sink)
}

/// Weighted constrained fit starting from the model's current parameters.
///
/// Errors:
/// - `InvalidInput` for bad options
/// - `Domain` when the starting point is outside the model's defined region
///
/// Non-convergence is not an error here; see `FitReport`.
pub fn fit_weighted<M: CurveModel>(
    model: &mut M,
    samples: &SampleSet,
    options: &FitOptions,
    sink: Option<&dyn DiagnosticsSink>,
) -> Result<FitReport, FitError> {
    if options.max_eval == 0 {
        return Err(FitError::InvalidInput("max_eval must be positive".into()));
    }
    if !(options.xtol_rel.is_finite() && options.xtol_rel >= 0.0) {
        return Err(FitError::InvalidInput(format!(
            "xtol_rel must be a non-negative number, got {}",
            options.xtol_rel
        )));
    }

    let start = model.params();
    let template = model.clone();

    // The start check stays off the sink; only optimizer evaluations are traced.
    let f0 = WeightedSse::new(samples, &template).eval(&start, None);
    if !f0.is_finite() {
        return Err(FitError::Domain(format!(
            "{}: starting point {:?} gives a non-finite objective",
            M::NAME,
            start
        )));
    }

    if let Some(sink) = sink {
        sink.samples(M::NAME, samples);
    }
    debug!(
        "{}: fitting {} samples from {:?} (objective {f0:.6e})",
        M::NAME,
        samples.len(),
        start
    );

    let objective = WeightedSse::new(samples, &template).with_sink(sink);
    let constraints = template.constraints();
    let mut opt = Sqp::new(start.len());
    opt.set_min_objective(|x, grad| objective.eval(x, grad));
    opt.set_lower_bounds(&template.lower_bounds());
    for constraint in constraints {
        opt.add_inequality_constraint(move |x, grad| constraint.eval(x, grad), 0.0);
    }
    opt.set_xtol_rel(options.xtol_rel);
    opt.set_max_eval(options.max_eval);

    let mut x = start;
    let outcome = opt.optimize(&mut x);
    if outcome.status == OptStatus::InvalidArgs {
        return Err(FitError::InvalidInput(format!(
            "{}: optimizer rejected the problem setup",
            M::NAME
        )));
    }

    model.set_params(&x);

    let report = FitReport {
        status: outcome.status,
        sum_sq_err: outcome.value,
        evaluations: outcome.evaluations,
    };

    if report.converged() {
        info!(
            "{}: converged ({}) after {} evaluations, sse = {:.6e}",
            M::NAME,
            report.status,
            report.evaluations,
            report.sum_sq_err
        );
    } else {
        warn!(
            "{}: stopped without convergence ({}) after {} evaluations, sse = {:.6e}",
            M::NAME,
            report.status,
            report.evaluations,
            report.sum_sq_err
        );
    }
    if let Some(sink) = sink {
        sink.finished(M::NAME, &x, &report);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bsm2, Bsm3};

    #[test]
    fn recovers_bsm2_from_exact_samples() {
        let truth = Bsm2::new(10.0, 3.0, 0.0, 0.0, -20.0);
        let ts = [0.0, 0.05, 0.1, 0.3, 0.6];
        let lnl: Vec<f64> = ts.iter().map(|&t| truth.norm_lnl(t)).collect();

        let mut model = Bsm2::new(20.0, 5.0, 0.0, 0.0, -20.0);
        let report = fit(&mut model, &ts, &lnl, &FitOptions::default(), None).unwrap();

        assert!(report.converged(), "status = {}", report.status);
        assert!((model.c - 10.0).abs() < 1e-4, "c = {}", model.c);
        assert!((model.m - 3.0).abs() < 1e-4, "m = {}", model.m);
        assert_eq!(model.t0, 0.0);
        assert_eq!(model.d2, -20.0);
    }

    #[test]
    fn recovers_bsm3_from_exact_samples() {
        let truth = Bsm3::new(2.0, 1.0, 1.5, 1.2);
        let ts = [0.0, 0.25, 0.5, 1.0, 2.0];
        let lnl: Vec<f64> = ts.iter().map(|&t| truth.norm_lnl(t)).collect();
        let samples = SampleSet::unweighted(ts.to_vec(), lnl).unwrap();

        let mut model = Bsm3::new(3.0, 1.5, 1.2, 1.2);
        let report = fit_weighted(&mut model, &samples, &FitOptions::default(), None).unwrap();

        assert!(report.converged(), "status = {}", report.status);
        assert!((model.c - 2.0).abs() < 1e-4, "c = {}", model.c);
        assert!((model.m - 1.0).abs() < 1e-4, "m = {}", model.m);
        assert!((model.theta_b - 1.5).abs() < 1e-4, "theta_b = {}", model.theta_b);
    }

    #[test]
    fn infeasible_start_is_a_domain_error() {
        // d2 > 0 has no real rate.
        let mut model = Bsm2::new(10.0, 3.0, 0.0, 0.0, 5.0);
        let err = fit(&mut model, &[0.0, 1.0], &[0.0, -1.0], &FitOptions::default(), None).unwrap_err();
        assert!(matches!(err, FitError::Domain(_)));
    }

    #[test]
    fn tiny_budget_reports_non_convergence_and_keeps_last_iterate() {
        let truth = Bsm3::new(2.0, 1.0, 1.5, 1.2);
        let ts = [0.0, 0.25, 0.5, 1.0, 2.0];
        let lnl: Vec<f64> = ts.iter().map(|&t| truth.norm_lnl(t)).collect();

        let mut model = Bsm3::new(5.0, 2.0, 2.0, 1.2);
        let options = FitOptions {
            max_eval: 2,
            ..FitOptions::default()
        };
        let report = fit(&mut model, &ts, &lnl, &options, None).unwrap();

        assert_eq!(report.status, OptStatus::MaxEvalReached);
        assert!(report.code() > 0);
        assert!(matches!(
            report.ensure_converged(),
            Err(FitError::NotConverged { evaluations: 2, .. })
        ));
        assert!(model.c.is_finite() && model.m.is_finite() && model.theta_b.is_finite());
    }

    #[derive(Default)]
    struct Recorder {
        events: std::cell::RefCell<Vec<&'static str>>,
    }

    impl DiagnosticsSink for Recorder {
        fn samples(&self, _model: &str, _samples: &SampleSet) {
            self.events.borrow_mut().push("samples");
        }

        fn iterate(&self, _model: &str, _names: &[&str], _params: &[f64], _rsse: f64, _grad: Option<&[f64]>) {
            self.events.borrow_mut().push("iterate");
        }

        fn finished(&self, _model: &str, _params: &[f64], _report: &FitReport) {
            self.events.borrow_mut().push("finished");
        }
    }

    #[test]
    fn sink_sees_samples_then_one_iterate_per_evaluation() {
        let truth = Bsm3::new(2.0, 1.0, 1.5, 1.2);
        let ts = [0.0, 0.25, 0.5, 1.0, 2.0];
        let lnl: Vec<f64> = ts.iter().map(|&t| truth.norm_lnl(t)).collect();
        let samples = SampleSet::unweighted(ts.to_vec(), lnl).unwrap();

        let sink = Recorder::default();
        let mut model = Bsm3::new(3.0, 1.5, 1.2, 1.2);
        let report = fit_weighted(&mut model, &samples, &FitOptions::default(), Some(&sink)).unwrap();

        let events = sink.events.into_inner();
        assert_eq!(events.first(), Some(&"samples"));
        assert_eq!(events.last(), Some(&"finished"));
        let iterates = events.iter().filter(|&&e| e == "iterate").count();
        assert_eq!(iterates, report.evaluations);
        assert_eq!(events.len(), report.evaluations + 2);
    }
}
