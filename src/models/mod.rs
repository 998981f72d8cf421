//! BSM curve parameterizations.
//!
//! - `Bsm4`: unconstrained `{c, m, r, b}` curve (evaluation only)
//! - `Bsm2`: 2 free parameters, maximum pinned at `t0`
//! - `Bsm3`: 3 free parameters, slope pinned at `t = 0`
//!
//! The reduced forms implement `CurveModel`, which is all the fitter sees.

pub mod bsm;
pub mod bsm2;
pub mod bsm3;
pub mod model;

pub use bsm::Bsm4;
pub use bsm2::Bsm2;
pub use bsm3::Bsm3;
pub use model::{CurveModel, MAX_PARAMS};
