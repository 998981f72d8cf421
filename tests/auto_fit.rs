//! Callback-driven fits: point selection, tilting, and the 3-parameter form.

use std::cell::Cell;

use lnl_curves::error::{AppError, FitError};
use lnl_curves::fit::{compute_weights, fit_auto, four_points, FitOptions, N_POINTS};
use lnl_curves::models::{Bsm3, Bsm4, CurveModel};

fn truth() -> Bsm4 {
    // θ(0) = e, slope at 0 ≈ -8.43.
    Bsm4::new(20.0, 2.0, 2.0, 0.5)
}

#[test]
fn recovers_a_known_curve_for_any_tilt() {
    let truth = truth();
    let d1 = truth.d1(0.0);
    assert!((d1 + 8.42975).abs() < 1e-4, "d1 = {d1}");

    for alpha in [0.0, 0.5, 1.0] {
        let calls = Cell::new(0usize);
        let lnl = |t: f64| {
            calls.set(calls.get() + 1);
            truth.lnl(t)
        };

        let mut model = Bsm3::new(10.0, 2.0, 3.0, d1);
        let report = fit_auto(lnl, &mut model, 0.0, 2.0, alpha, &FitOptions::default(), None).unwrap();

        assert!(report.converged(), "alpha = {alpha}: {}", report.status);
        assert_eq!(calls.get(), N_POINTS);
        assert!(report.sum_sq_err < 1e-8, "alpha = {alpha}: sse = {}", report.sum_sq_err);

        let reference = truth.lnl(0.0);
        for t in four_points(0.0, 2.0, d1).unwrap() {
            let expected = truth.lnl(t) - reference;
            let got = model.norm_lnl(t);
            assert!((got - expected).abs() < 1e-4, "alpha = {alpha}, t = {t}: {got} vs {expected}");
        }

        let curve = model.to_unconstrained().unwrap();
        assert!(curve.r > 0.0 && curve.b >= 0.0);
    }
}

#[test]
fn shallow_slope_fails_before_calling_the_likelihood() {
    let calls = Cell::new(0usize);
    let lnl = |t: f64| {
        calls.set(calls.get() + 1);
        -t
    };

    // ln 2 / sqrt(0.001) ≈ 21.9, outside (0, 10).
    let mut model = Bsm3::new(10.0, 2.0, 3.0, -0.001);
    let err = fit_auto(lnl, &mut model, 0.0, 10.0, 0.0, &FitOptions::default(), None).unwrap_err();

    assert!(matches!(err, FitError::Domain(_)));
    assert_eq!(calls.get(), 0);
    assert_eq!(AppError::from(err).exit_code(), 3);
}

#[test]
fn unit_slope_places_the_half_derivative_point_at_ln2() {
    let t = four_points(0.0, 10.0, -1.0).unwrap();
    assert_eq!(t[0], 0.0);
    assert!((t[2] - std::f64::consts::LN_2).abs() < 1e-15);
    assert_eq!(t[3], 10.0);
}

#[test]
fn non_finite_likelihood_is_rejected() {
    let mut model = Bsm3::new(10.0, 2.0, 3.0, -1.0);
    let err = fit_auto(|t| if t > 1.0 { f64::NAN } else { -t }, &mut model, 0.0, 2.0, 0.0, &FitOptions::default(), None)
        .unwrap_err();
    assert!(matches!(err, FitError::InvalidInput(_)));
}

#[test]
fn weights_favor_points_near_the_maximum() {
    let (w, max) = compute_weights(&[0.0, -1.0, -3.0], 1.0);
    assert_eq!(max, 0.0);
    assert_eq!(w[0], 1.0);
    assert!(w[0] > w[1] && w[1] > w[2]);
    assert!((w[2] - (-3.0f64).exp()).abs() < 1e-15);

    let (unit, _) = compute_weights(&[0.0, -1.0, -3.0], 0.0);
    assert!(unit.iter().all(|&x| x == 1.0));
}
