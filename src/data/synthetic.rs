//! Synthetic likelihood samples from a known 4-parameter curve.
//!
//! Used by the `simulate` command and by tests that need a ground truth.
//! Noise is Gaussian and fully determined by the seed.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::SampleSet;
use crate::error::FitError;
use crate::fit::compute_weights;
use crate::models::Bsm4;

/// What to generate.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticPlan {
    pub curve: Bsm4,
    /// Evaluation points.
    pub t: Vec<f64>,
    /// Samples are reported as `lnl(t) - lnl(anchor)`.
    pub anchor: f64,
    /// Standard deviation of additive noise (0 for exact samples).
    pub noise_sd: f64,
    pub seed: u64,
    /// Tilt exponent for weights (0 gives unit weights).
    pub alpha: f64,
}

/// `n` evenly spaced points on `[min, max]` (both ends included).
pub fn linspace(min: f64, max: f64, n: usize) -> Result<Vec<f64>, FitError> {
    if n < 2 {
        return Err(FitError::InvalidInput(format!("need at least 2 points, got {n}")));
    }
    if !(min.is_finite() && max.is_finite() && min < max) {
        return Err(FitError::InvalidInput(format!("invalid range [{min}, {max}]")));
    }
    let step = (max - min) / (n - 1) as f64;
    Ok((0..n)
        .map(|i| if i + 1 == n { max } else { min + step * i as f64 })
        .collect())
}

pub fn generate_samples(plan: &SyntheticPlan) -> Result<SampleSet, FitError> {
    if !(plan.noise_sd.is_finite() && plan.noise_sd >= 0.0) {
        return Err(FitError::InvalidInput(format!(
            "noise standard deviation must be >= 0, got {}",
            plan.noise_sd
        )));
    }
    if !(plan.alpha.is_finite() && plan.alpha >= 0.0) {
        return Err(FitError::InvalidInput(format!(
            "alpha must be a non-negative number, got {}",
            plan.alpha
        )));
    }

    let reference = plan.curve.lnl(plan.anchor);
    if !reference.is_finite() {
        return Err(FitError::Domain(format!(
            "curve is undefined at the anchor t = {}",
            plan.anchor
        )));
    }

    let mut rng = StdRng::seed_from_u64(plan.seed);
    let normal = Normal::new(0.0, plan.noise_sd)
        .map_err(|e| FitError::InvalidInput(format!("noise distribution error: {e}")))?;

    let mut lnl = Vec::with_capacity(plan.t.len());
    for &t in &plan.t {
        let exact = plan.curve.lnl(t) - reference;
        if !exact.is_finite() {
            return Err(FitError::Domain(format!("curve is undefined at t = {t}")));
        }
        let noise = if plan.noise_sd > 0.0 {
            normal.sample(&mut rng)
        } else {
            0.0
        };
        lnl.push(exact + noise);
    }

    let (w, _) = compute_weights(&lnl, plan.alpha);
    SampleSet::new(plan.t.clone(), lnl, w)
}
