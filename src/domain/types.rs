//! Shared domain types.
//!
//! - `SampleSet`: validated `(t, lnl, w)` observations for one fit
//! - `ModelForm`: which reduced BSM parameterization to fit
//! - `FitConfig`: a full run's configuration as understood by the pipeline
//! - `AutoConfig`: the same for a callback-driven (four-point) fit

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::FitError;
use crate::fit::FitOptions;

/// Observations `(t_i, lnl_i, w_i)` in input order.
///
/// Invariants (checked by the constructors):
/// - all three columns have the same, non-zero length
/// - every `t` and `lnl` is finite
/// - every weight is finite and non-negative, and at least one is positive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    t: Vec<f64>,
    lnl: Vec<f64>,
    w: Vec<f64>,
}

impl SampleSet {
    pub fn new(t: Vec<f64>, lnl: Vec<f64>, w: Vec<f64>) -> Result<Self, FitError> {
        if t.is_empty() {
            return Err(FitError::InvalidInput("sample set is empty".into()));
        }
        if t.len() != lnl.len() || t.len() != w.len() {
            return Err(FitError::InvalidInput(format!(
                "sample columns differ in length: t = {}, lnl = {}, w = {}",
                t.len(),
                lnl.len(),
                w.len()
            )));
        }
        if let Some(i) = t.iter().zip(lnl.iter()).position(|(t, l)| !t.is_finite() || !l.is_finite()) {
            return Err(FitError::InvalidInput(format!(
                "sample {i} is not finite: t = {}, lnl = {}",
                t[i], lnl[i]
            )));
        }
        if let Some(i) = w.iter().position(|w| !w.is_finite() || *w < 0.0) {
            return Err(FitError::InvalidInput(format!(
                "sample {i} has invalid weight {}",
                w[i]
            )));
        }
        if w.iter().all(|&w| w == 0.0) {
            return Err(FitError::InvalidInput("all sample weights are zero".into()));
        }
        Ok(Self { t, lnl, w })
    }

    /// Samples with unit weights.
    pub fn unweighted(t: Vec<f64>, lnl: Vec<f64>) -> Result<Self, FitError> {
        let w = vec![1.0; t.len()];
        Self::new(t, lnl, w)
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn t(&self) -> &[f64] {
        &self.t
    }

    pub fn lnl(&self) -> &[f64] {
        &self.lnl
    }

    pub fn w(&self) -> &[f64] {
        &self.w
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.t
            .iter()
            .zip(self.lnl.iter())
            .zip(self.w.iter())
            .map(|((&t, &lnl), &w)| (t, lnl, w))
    }

    /// Smallest and largest `t`.
    pub fn t_range(&self) -> (f64, f64) {
        self.t
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &t| (lo.min(t), hi.max(t)))
    }
}

/// Which reduced BSM parameterization to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelForm {
    /// `{c, m}` with the maximum pinned at `t0` (needs `t0`, `d2`).
    Bsm2,
    /// `{c, m, θb}` with the slope pinned at `t = 0` (needs `d1`).
    Bsm3,
}

impl ModelForm {
    pub fn display_name(self) -> &'static str {
        match self {
            ModelForm::Bsm2 => "BSM (c, m)",
            ModelForm::Bsm3 => "BSM (c, m, theta_b)",
        }
    }
}

/// Starting point and frozen coefficients for a fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSeed {
    pub c: f64,
    pub m: f64,
    /// Only used by `ModelForm::Bsm3`.
    pub theta_b: f64,
    pub t0: f64,
    pub d1: f64,
    pub d2: f64,
}

/// A full `fit` run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// One independent fit per file.
    pub sample_paths: Vec<PathBuf>,
    pub form: ModelForm,
    pub seed: ModelSeed,
    pub options: FitOptions,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    /// Per-sample residual CSV; with several inputs the file stem gets an index suffix.
    pub export_residuals: Option<PathBuf>,
    /// Write a markdown trace of every objective evaluation under `debug/`.
    pub trace: bool,
}

/// Configuration of a callback-driven fit of the 3-parameter form.
#[derive(Debug, Clone)]
pub struct AutoConfig {
    /// Likelihood maximum; the model is anchored at `t = 0`, so this is normally 0.
    pub min_t: f64,
    pub max_t: f64,
    pub alpha: f64,
    /// Starting `c`, `m`, `theta_b`, plus the frozen `d1`.
    pub seed: ModelSeed,
    pub options: FitOptions,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    pub trace: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_set_rejects_malformed_columns() {
        assert!(SampleSet::new(vec![], vec![], vec![]).is_err());
        assert!(SampleSet::new(vec![0.0, 1.0], vec![0.0], vec![1.0, 1.0]).is_err());
        assert!(SampleSet::unweighted(vec![0.0, f64::NAN], vec![0.0, -1.0]).is_err());
        assert!(SampleSet::new(vec![0.0], vec![0.0], vec![-1.0]).is_err());
        assert!(SampleSet::new(vec![0.0, 1.0], vec![0.0, -1.0], vec![0.0, 0.0]).is_err());
    }

    #[test]
    fn sample_set_iterates_in_input_order() {
        let s = SampleSet::new(vec![2.0, 0.5], vec![-1.0, 0.0], vec![0.5, 1.0]).unwrap();
        let rows: Vec<_> = s.iter().collect();
        assert_eq!(rows, vec![(2.0, -1.0, 0.5), (0.5, 0.0, 1.0)]);
        assert_eq!(s.t_range(), (0.5, 2.0));
        assert_eq!(s.len(), 2);
    }
}
