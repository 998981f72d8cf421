//! Automatic sample placement and likelihood tilting.
//!
//! When the caller only has an expensive likelihood callback and a range
//! `[min_t, max_t]`, we:
//! 1. choose four points (`four_points`)
//! 2. evaluate the callback once per point
//! 3. normalize by the value at `min_t`
//! 4. weight by `exp(lnl_i - max_lnl)^alpha`
//! 5. run the weighted 3-parameter fit

use log::{debug, warn};

use crate::diagnostics::DiagnosticsSink;
use crate::domain::SampleSet;
use crate::error::FitError;
use crate::fit::fitter::{fit_weighted, FitOptions, FitReport};
use crate::models::Bsm3;

pub const N_POINTS: usize = 4;

/// `[min_t, mid, t_half, max_t]`, where `t_half = ln 2 / sqrt(-d1)` is where an
/// exponential with slope `d1` at `t = 0` has lost half of its log-derivative.
///
/// `t_half` must fall strictly inside `(min_t, max_t)`; otherwise the
/// heuristic does not apply and a `Domain` error is returned.
pub fn four_points(min_t: f64, max_t: f64, d1: f64) -> Result<[f64; N_POINTS], FitError> {
    if !(min_t.is_finite() && max_t.is_finite() && min_t < max_t) {
        return Err(FitError::InvalidInput(format!(
            "invalid range [{min_t}, {max_t}]"
        )));
    }
    if !(d1 < 0.0) {
        return Err(FitError::Domain(format!(
            "point selection needs a negative slope at the anchor, got d1 = {d1}"
        )));
    }

    let t_half = std::f64::consts::LN_2 / (-d1).sqrt();
    if !(t_half > min_t && t_half < max_t) {
        return Err(FitError::Domain(format!(
            "half-derivative point {t_half} is outside ({min_t}, {max_t})"
        )));
    }

    Ok([min_t, 0.5 * (min_t + t_half), t_half, max_t])
}

/// Evaluate `lnl_fn` once at each point.
pub fn evaluate<F>(mut lnl_fn: F, t: &[f64]) -> Result<Vec<f64>, FitError>
where
    F: FnMut(f64) -> f64,
{
    let lnl: Vec<f64> = t.iter().map(|&ti| lnl_fn(ti)).collect();
    if let Some(i) = lnl.iter().position(|v| !v.is_finite()) {
        return Err(FitError::InvalidInput(format!(
            "likelihood callback returned {} at t = {}",
            lnl[i], t[i]
        )));
    }
    Ok(lnl)
}

/// Subtract `reference` from every value.
pub fn normalize(reference: f64, lnl: &mut [f64]) {
    for v in lnl.iter_mut() {
        *v -= reference;
    }
}

/// `w_i = exp(lnl_i - max_lnl)^alpha`; returns `max_lnl`.
pub fn compute_weights(lnl: &[f64], alpha: f64) -> (Vec<f64>, f64) {
    let max_lnl = lnl.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let w = lnl
        .iter()
        .map(|&v| (alpha * (v - max_lnl)).exp())
        .collect();
    (w, max_lnl)
}

/// Choose points, evaluate, normalize, weight and fit `model` (3-parameter form).
///
/// `model.d1` supplies the slope used for point placement and is held fixed
/// during the fit. The callback is invoked exactly `N_POINTS` times.
pub fn fit_auto<F>(
    lnl_fn: F,
    model: &mut Bsm3,
    min_t: f64,
    max_t: f64,
    alpha: f64,
    options: &FitOptions,
    sink: Option<&dyn DiagnosticsSink>,
) -> Result<FitReport, FitError>
where
    F: FnMut(f64) -> f64,
{
    if !(alpha.is_finite() && alpha >= 0.0) {
        return Err(FitError::InvalidInput(format!(
            "alpha must be a non-negative number, got {alpha}"
        )));
    }
    if min_t != 0.0 {
        warn!("auto fit: model is anchored at t = 0 but min_t = {min_t}");
    }

    let t = four_points(min_t, max_t, model.d1)?;
    let mut lnl = evaluate(lnl_fn, &t)?;

    // t[0] = min_t is taken to be the likelihood maximum.
    let reference = lnl[0];
    normalize(reference, &mut lnl);
    let (w, max_lnl) = compute_weights(&lnl, alpha);
    if max_lnl > 0.0 {
        debug!("auto fit: sample above the min_t value by {max_lnl}");
    }

    debug!("auto fit: t = {t:?}");
    debug!("auto fit: w = {w:?}");

    let samples = SampleSet::new(t.to_vec(), lnl, w)?;
    fit_weighted(model, &samples, options, sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_derivative_point_for_unit_slope() {
        let t = four_points(0.0, 10.0, -1.0).unwrap();
        let ln2 = std::f64::consts::LN_2;
        assert_eq!(t, [0.0, 0.5 * ln2, ln2, 10.0]);
        assert!(t[2] > 0.0 && t[2] < 10.0);
    }

    #[test]
    fn shallow_slope_is_a_domain_failure() {
        // ln 2 / sqrt(0.001) ≈ 21.9 > 10.
        let err = four_points(0.0, 10.0, -0.001).unwrap_err();
        assert!(matches!(err, FitError::Domain(_)));

        // Not clamped either when the point lands below min_t.
        let err = four_points(1.0, 10.0, -4.0).unwrap_err();
        assert!(matches!(err, FitError::Domain(_)));
    }

    #[test]
    fn non_negative_slope_is_a_domain_failure() {
        assert!(matches!(four_points(0.0, 10.0, 0.0), Err(FitError::Domain(_))));
        assert!(matches!(four_points(0.0, 10.0, 2.0), Err(FitError::Domain(_))));
    }

    #[test]
    fn weights_tilt_toward_the_maximum() {
        let lnl = [0.0, -0.5, -2.0, -10.0];

        let (flat, max_lnl) = compute_weights(&lnl, 0.0);
        assert_eq!(max_lnl, 0.0);
        assert_eq!(flat, vec![1.0; 4]);

        let (tilted, _) = compute_weights(&lnl, 1.0);
        assert_eq!(tilted[0], 1.0);
        assert!((tilted[1] - (-0.5_f64).exp()).abs() < 1e-15);
        assert!(tilted.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn normalize_shifts_every_sample() {
        let mut lnl = vec![-100.0, -100.5, -103.0];
        normalize(-100.0, &mut lnl);
        assert_eq!(lnl, vec![0.0, -0.5, -3.0]);
    }

    #[test]
    fn callback_is_called_once_per_point() {
        let mut calls = 0;
        let lnl = evaluate(
            |t| {
                calls += 1;
                -t
            },
            &[0.0, 1.0, 2.0, 3.0],
        )
        .unwrap();
        assert_eq!(calls, 4);
        assert_eq!(lnl, vec![0.0, -1.0, -2.0, -3.0]);
    }

    #[test]
    fn non_finite_likelihood_is_rejected() {
        let err = evaluate(|t| if t > 1.0 { f64::NAN } else { 0.0 }, &[0.0, 2.0]).unwrap_err();
        assert!(matches!(err, FitError::InvalidInput(_)));
    }
}
