//! Numerical optimizers used by the fitting engine.
//!
//! - `sqp`: constrained multivariate minimization with analytic gradients.
//! - `bracket`: one-dimensional bracketed minimization and root finding.

pub mod bracket;
pub mod sqp;

pub use bracket::{find_root, minimize};
pub use sqp::{OptOutcome, OptStatus, Sqp, FEASIBILITY_SLACK};
