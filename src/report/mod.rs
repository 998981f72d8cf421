//! Reporting utilities: residuals, curve landmarks, and formatted terminal output.

pub mod format;

pub use format::*;

use log::debug;
use serde::Serialize;

use crate::domain::SampleSet;
use crate::error::FitError;
use crate::models::CurveModel;
use crate::optim::{find_root, minimize};

/// Drop in normalized log-likelihood that delimits the support interval.
pub const SUPPORT_DROP: f64 = 2.0;

const BRACKET_MAX_ITER: u64 = 100;
const BRACKET_TOL: f64 = 1e-8;

/// Observed vs fitted value for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Residual {
    pub t: f64,
    pub lnl_obs: f64,
    pub lnl_fit: f64,
    pub residual: f64,
    pub w: f64,
}

/// Shape summary of a fitted curve over a range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Landmarks {
    /// Location of the largest `norm_lnl` in the range.
    pub ml_t: f64,
    pub ml_norm_lnl: f64,
    /// Where `norm_lnl` falls `SUPPORT_DROP` below the maximum, if inside the range.
    pub support_lower: Option<f64>,
    pub support_upper: Option<f64>,
}

pub fn compute_residuals<M: CurveModel>(samples: &SampleSet, model: &M) -> Vec<Residual> {
    samples
        .iter()
        .map(|(t, lnl, w)| {
            let fit = model.norm_lnl(t);
            Residual {
                t,
                lnl_obs: lnl,
                lnl_fit: fit,
                residual: lnl - fit,
                w,
            }
        })
        .collect()
}

/// Weighted SSE and unweighted max |residual|.
pub fn residual_stats(residuals: &[Residual]) -> (f64, f64) {
    residuals.iter().fold((0.0, 0.0_f64), |(sse, max_abs), r| {
        (sse + r.w * r.residual * r.residual, max_abs.max(r.residual.abs()))
    })
}

/// Locate the maximum and the support interval of `model` on `[t_min, t_max]`.
pub fn curve_landmarks<M: CurveModel>(model: &M, t_min: f64, t_max: f64) -> Result<Landmarks, FitError> {
    let neg = |t: f64| {
        let v = -model.norm_lnl(t);
        if v.is_finite() { v } else { f64::MAX }
    };

    let guess = 0.5 * (t_min + t_max);
    let ml_t = minimize(neg, guess, t_min, t_max, BRACKET_MAX_ITER, BRACKET_TOL)?;
    let ml_norm_lnl = model.norm_lnl(ml_t);
    if !ml_norm_lnl.is_finite() {
        return Err(FitError::Numerical(format!(
            "fitted curve is undefined at its maximum t = {ml_t}"
        )));
    }

    let level = ml_norm_lnl - SUPPORT_DROP;
    let shifted = |t: f64| model.norm_lnl(t) - level;
    let support_lower = support_bound(&shifted, t_min, ml_t);
    let support_upper = support_bound(&shifted, ml_t, t_max);

    debug!(
        "landmarks on [{t_min}, {t_max}]: ml_t = {ml_t}, support = ({support_lower:?}, {support_upper:?})"
    );

    Ok(Landmarks {
        ml_t,
        ml_norm_lnl,
        support_lower,
        support_upper,
    })
}

/// Root of `f` on `[lower, upper]`, or `None` when the interval does not bracket one.
fn support_bound<F: Fn(f64) -> f64>(f: &F, lower: f64, upper: f64) -> Option<f64> {
    if !(upper > lower) {
        return None;
    }
    find_root(f, lower, upper, BRACKET_MAX_ITER, BRACKET_TOL).ok()
}
