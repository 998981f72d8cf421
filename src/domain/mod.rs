//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - validated sample sets (`SampleSet`)
//! - model selection and seeding (`ModelForm`, `ModelSeed`)
//! - run configuration (`FitConfig`)

pub mod types;

pub use types::*;
