//! Mathematical utilities: stable BSM terms and the small dense QP solver.

pub mod basis;
pub mod qp;

pub use basis::*;
pub use qp::*;
