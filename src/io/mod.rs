//! Input/output helpers.
//!
//! - CSV ingest + validation of likelihood samples (`samples`)
//! - residual and sample exports (`export`)

pub mod export;
pub mod samples;

pub use export::*;
pub use samples::*;
