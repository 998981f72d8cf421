//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - weighted SSE objective with analytic gradient (`objective`)
//! - domain-feasibility constraints (`constraints`)
//! - the generic constrained fit driver (`fitter`)
//! - four-point placement and likelihood tilting for callback-driven fits (`points`)

pub mod constraints;
pub mod fitter;
pub mod objective;
pub mod points;

pub use constraints::DomainConstraint;
pub use fitter::*;
pub use objective::WeightedSse;
pub use points::{compute_weights, evaluate, fit_auto, four_points, normalize, N_POINTS};
