//! Error types.
//!
//! - `FitError` is what the library returns. Model evaluators and constraint
//!   functions never produce it; they signal infeasibility with non-finite values.
//! - `AppError` is what the `lnl` binary returns: a message plus a process exit code.

use thiserror::Error;

use crate::optim::OptStatus;

/// Caller-visible failures of the fitting library.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// Malformed inputs: mismatched lengths, empty sample sets, non-finite values.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A domain precondition does not hold (e.g. the half-derivative point of the
    /// four-point heuristic falls outside `(min_t, max_t)`).
    #[error("domain precondition violated: {0}")]
    Domain(String),

    /// The optimizer stopped without meeting its tolerance.
    #[error("fit did not converge: {status} after {evaluations} evaluations")]
    NotConverged { status: OptStatus, evaluations: usize },

    /// The fitted point has no valid 4-parameter interpretation.
    #[error("invalid reparameterization: r = {r}, b = {b} (need r > 0, b >= 0)")]
    InvalidReparameterization { r: f64, b: f64 },

    /// A numerical collaborator failed (bracket solver error, singular system, ...).
    #[error("numerical failure: {0}")]
    Numerical(String),
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    /// Prefix the message (e.g. with the input file it concerns).
    pub fn with_context(self, context: &str) -> Self {
        Self {
            exit_code: self.exit_code,
            message: format!("{context}: {}", self.message),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let exit_code = match &err {
            FitError::InvalidInput(_) => 2,
            FitError::Domain(_) => 3,
            FitError::NotConverged { .. }
            | FitError::InvalidReparameterization { .. }
            | FitError::Numerical(_) => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_errors_map_to_distinct_exit_codes() {
        let input: AppError = FitError::InvalidInput("empty".into()).into();
        let domain: AppError = FitError::Domain("t2 outside range".into()).into();
        let reparam: AppError = FitError::InvalidReparameterization { r: -1.0, b: 0.0 }.into();

        assert_eq!(input.exit_code(), 2);
        assert_eq!(domain.exit_code(), 3);
        assert_eq!(reparam.exit_code(), 4);
        assert!(domain.to_string().contains("t2 outside range"));

        let ctx = domain.with_context("a.csv");
        assert_eq!(ctx.exit_code(), 3);
        assert!(ctx.to_string().starts_with("a.csv: "));
    }
}
