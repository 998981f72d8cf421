//! Command-line parsing for the BSM log-likelihood curve fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::ModelForm;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "lnl", version, about = "BSM log-likelihood curve fitter")]
pub struct Cli {
    /// Log every optimizer iterate (sets the default log level to `debug`; RUST_LOG wins).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a reduced BSM curve to likelihood samples read from CSV.
    Fit(FitArgs),
    /// Choose four points on a known curve, evaluate it there, and fit the 3-parameter form.
    Auto(AutoArgs),
    /// Write samples of a known 4-parameter curve (optionally noisy) to CSV.
    Simulate(SimulateArgs),
}

/// Optimizer knobs shared by `fit` and `auto`.
#[derive(Debug, Args, Clone)]
pub struct OptimizerArgs {
    /// Maximum number of objective evaluations.
    #[arg(long, default_value_t = 1000)]
    pub max_eval: usize,

    /// Relative step tolerance (defaults to sqrt(machine epsilon)).
    #[arg(long)]
    pub xtol: Option<f64>,

    /// Write a markdown trace of every objective evaluation under `debug/`.
    #[arg(long)]
    pub trace: bool,
}

/// Plot options shared by `fit` and `auto`.
#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// Render an ASCII plot in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

/// 4-parameter curve `{c, m, r, b}` used as ground truth.
#[derive(Debug, Args, Clone, Copy)]
pub struct CurveArgs {
    #[arg(id = "curve_c", long = "curve-c", default_value_t = 20.0)]
    pub c: f64,

    #[arg(id = "curve_m", long = "curve-m", default_value_t = 2.0)]
    pub m: f64,

    #[arg(id = "curve_r", long = "curve-r", default_value_t = 2.0)]
    pub r: f64,

    #[arg(id = "curve_b", long = "curve-b", default_value_t = 0.5)]
    pub b: f64,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Sample CSV file(s) with columns `t,lnl[,w]`; each file is fitted independently.
    #[arg(short = 's', long = "samples", value_name = "CSV", required = true, num_args = 1..)]
    pub samples: Vec<PathBuf>,

    /// Which reduced form to fit.
    #[arg(short = 'f', long, value_enum, default_value_t = ModelForm::Bsm2)]
    pub form: ModelForm,

    /// Starting value for `c`.
    #[arg(long, default_value_t = 10.0)]
    pub c: f64,

    /// Starting value for `m`.
    #[arg(long, default_value_t = 2.0)]
    pub m: f64,

    /// Starting value for `theta_b` (bsm3 only).
    #[arg(long = "theta-b", default_value_t = 2.0)]
    pub theta_b: f64,

    /// Location of the maximum (bsm2 only).
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub t0: f64,

    /// First derivative at the anchor.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub d1: f64,

    /// Second derivative at the maximum (bsm2 only; must be negative).
    #[arg(long, default_value_t = -1.0, allow_hyphen_values = true)]
    pub d2: f64,

    #[command(flatten)]
    pub optimizer: OptimizerArgs,

    #[command(flatten)]
    pub plot: PlotArgs,

    /// Export per-sample residuals to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct AutoArgs {
    /// Curve that plays the role of the likelihood callback.
    #[command(flatten)]
    pub curve: CurveArgs,

    /// Lower end of the range (the likelihood maximum).
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub min_t: f64,

    /// Upper end of the range.
    #[arg(long, default_value_t = 2.0)]
    pub max_t: f64,

    /// Tilt exponent for sample weights (0 gives unit weights).
    #[arg(long, default_value_t = 0.0)]
    pub alpha: f64,

    /// Slope at `t = 0`; defaults to the curve's own derivative there.
    #[arg(long, allow_hyphen_values = true)]
    pub d1: Option<f64>,

    /// Starting value for `c`.
    #[arg(long, default_value_t = 10.0)]
    pub c: f64,

    /// Starting value for `m`.
    #[arg(long, default_value_t = 2.0)]
    pub m: f64,

    /// Starting value for `theta_b`.
    #[arg(long = "theta-b", default_value_t = 3.0)]
    pub theta_b: f64,

    #[command(flatten)]
    pub optimizer: OptimizerArgs,

    #[command(flatten)]
    pub plot: PlotArgs,
}

#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub curve: CurveArgs,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub min_t: f64,

    #[arg(long, default_value_t = 2.0)]
    pub max_t: f64,

    /// Number of evenly spaced points.
    #[arg(short = 'n', long, default_value_t = 20)]
    pub points: usize,

    /// Standard deviation of additive Gaussian noise.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Tilt exponent for the written weights (0 gives unit weights).
    #[arg(long, default_value_t = 0.0)]
    pub alpha: f64,

    /// Output CSV (`t,lnl,w`).
    #[arg(short = 'o', long, value_name = "CSV")]
    pub out: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_accepts_several_sample_files_and_negative_values() {
        let cli = Cli::parse_from([
            "lnl", "fit", "--samples", "a.csv", "b.csv", "--form", "bsm3", "--d1", "-1.5", "--no-plot",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.samples, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
        assert_eq!(args.form, ModelForm::Bsm3);
        assert_eq!(args.d1, -1.5);
        assert_eq!(args.d2, -1.0);
        assert!(args.plot.no_plot);
        assert_eq!(args.optimizer.max_eval, 1000);
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::parse_from(["lnl", "auto", "--alpha", "0.5", "-v"]);
        assert!(cli.verbose);
        let Command::Auto(args) = cli.command else {
            panic!("expected auto");
        };
        assert_eq!(args.alpha, 0.5);
        assert_eq!(args.d1, None);
        assert_eq!(args.curve.c, 20.0);
    }

    #[test]
    fn simulate_requires_an_output_path() {
        assert!(Cli::try_parse_from(["lnl", "simulate"]).is_err());
        assert!(Cli::try_parse_from(["lnl", "simulate", "-o", "out.csv"]).is_ok());
    }
}
