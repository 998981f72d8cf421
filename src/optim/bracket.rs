//! One-dimensional bracketed minimization and root finding (Brent's method via argmin).

use argmin::core::{CostFunction, Error as ArgminError, Executor, State};
use argmin::solver::brent::{BrentOpt, BrentRoot};
use log::debug;

use crate::error::FitError;

struct ScalarFn<F>(F);

impl<F> CostFunction for ScalarFn<F>
where
    F: Fn(f64) -> f64,
{
    type Param = f64;
    type Output = f64;

    fn cost(&self, x: &f64) -> Result<f64, ArgminError> {
        Ok((self.0)(*x))
    }
}

/// Minimize `f` on `[lower, upper]`, stopping once the bracket is narrower than `tolerance`.
///
/// `guess` must lie strictly inside the interval. Brent's method picks its own
/// interior start; the guess is only checked so that callers with a bad
/// bracket fail loudly instead of silently converging to an endpoint.
pub fn minimize<F>(
    f: F,
    guess: f64,
    lower: f64,
    upper: f64,
    max_iter: u64,
    tolerance: f64,
) -> Result<f64, FitError>
where
    F: Fn(f64) -> f64,
{
    check_interval(lower, upper, tolerance)?;
    if !(guess > lower && guess < upper) {
        return Err(FitError::Domain(format!(
            "initial guess {guess} is not inside ({lower}, {upper})"
        )));
    }

    // Brent stops when |x - midpoint| <= 2 (eps |x| + t) - half width.
    let solver = BrentOpt::new(lower, upper).set_tolerance(f64::EPSILON.sqrt(), tolerance / 4.0);
    let result = Executor::new(ScalarFn(f), solver)
        .configure(|state| state.max_iters(max_iter))
        .run()
        .map_err(|e| FitError::Numerical(format!("bracket minimization failed: {e}")))?;

    let state = result.state();
    debug!(
        "bracket minimize on [{lower}, {upper}]: {} iterations",
        state.get_iter()
    );
    state
        .get_best_param()
        .copied()
        .ok_or_else(|| FitError::Numerical("bracket minimization produced no iterate".into()))
}

/// Find a root of `f` in `[lower, upper]`; `f(lower)` and `f(upper)` must differ in sign.
pub fn find_root<F>(
    f: F,
    lower: f64,
    upper: f64,
    max_iter: u64,
    tolerance: f64,
) -> Result<f64, FitError>
where
    F: Fn(f64) -> f64,
{
    check_interval(lower, upper, tolerance)?;

    let f_lower = f(lower);
    let f_upper = f(upper);
    if !f_lower.is_finite() || !f_upper.is_finite() {
        return Err(FitError::Domain(format!(
            "function is not finite at the bracket ends ({f_lower}, {f_upper})"
        )));
    }
    if f_lower == 0.0 {
        return Ok(lower);
    }
    if f_upper == 0.0 {
        return Ok(upper);
    }
    if f_lower.signum() == f_upper.signum() {
        return Err(FitError::Domain(format!(
            "root is not bracketed by [{lower}, {upper}]: f = ({f_lower}, {f_upper})"
        )));
    }

    let solver = BrentRoot::new(lower, upper, tolerance);
    let result = Executor::new(ScalarFn(f), solver)
        .configure(|state| state.max_iters(max_iter))
        .run()
        .map_err(|e| FitError::Numerical(format!("root finding failed: {e}")))?;

    let state = result.state();
    debug!(
        "bracket root on [{lower}, {upper}]: {} iterations",
        state.get_iter()
    );
    state
        .get_best_param()
        .copied()
        .ok_or_else(|| FitError::Numerical("root finding produced no iterate".into()))
}

fn check_interval(lower: f64, upper: f64, tolerance: f64) -> Result<(), FitError> {
    if !lower.is_finite() || !upper.is_finite() || lower >= upper {
        return Err(FitError::InvalidInput(format!(
            "bracket [{lower}, {upper}] is not a finite interval"
        )));
    }
    if !(tolerance > 0.0) {
        return Err(FitError::InvalidInput(format!(
            "bracket tolerance must be positive, got {tolerance}"
        )));
    }
    Ok(())
}
