//! `lnl-curves` library crate.
//!
//! Fits reduced binary-symmetric-model (BSM) curves to log-likelihood samples
//! taken along one branch length. The binary (`lnl`) is a thin wrapper around
//! this library so that:
//!
//! - core logic is testable without spawning processes
//! - the fit engine can be called with any likelihood callback
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod optim;
pub mod plot;
pub mod report;
