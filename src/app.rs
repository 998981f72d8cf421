//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - loads sample files or samples a known curve
//! - runs the constrained fits
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;
use log::info;

use crate::cli::{AutoArgs, Command, FitArgs, OptimizerArgs, SimulateArgs};
use crate::domain::{AutoConfig, FitConfig, ModelSeed};
use crate::error::AppError;
use crate::fit::FitOptions;
use crate::models::Bsm4;

pub mod pipeline;

/// Skipped rows listed per input before the rest are summarized.
const MAX_ROW_ERRORS: usize = 10;

/// Entry point for the `lnl` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Auto(args) => handle_auto(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let results = pipeline::run_fit(&config);

    // Print every input; the exit code follows the first failure.
    let total = results.len();
    let mut failed = 0usize;
    let mut exit_code = None;
    for result in results {
        let outcome = result.and_then(|out| {
            print!(
                "{}",
                crate::report::format_row_errors(&out.loaded.row_errors, MAX_ROW_ERRORS)
            );
            print!("{}", crate::report::format_sample_stats(&out.loaded.stats));
            println!("{}", crate::report::format_fit_summary(&out.summary));
            if let Some(plot) = &out.plot {
                println!("{plot}");
            }
            out.summary
                .ensure_valid()
                .map(|_| ())
                .map_err(|e| AppError::from(e).with_context(&out.path.display().to_string()))
        });

        if let Err(e) = outcome {
            eprintln!("{e}");
            failed += 1;
            exit_code.get_or_insert(e.exit_code());
        }
    }

    match exit_code {
        Some(code) => Err(AppError::new(code, format!("{failed} of {total} input(s) failed"))),
        None => Ok(()),
    }
}

fn handle_auto(args: AutoArgs) -> Result<(), AppError> {
    let truth = Bsm4::new(args.curve.c, args.curve.m, args.curve.r, args.curve.b);
    let config = auto_config_from_args(&args, &truth);
    info!(
        "auto: curve {{c, m, r, b}} = {{{}, {}, {}, {}}}, d1 = {}",
        truth.c, truth.m, truth.r, truth.b, config.seed.d1
    );

    let out = pipeline::run_auto(|t| truth.lnl(t), &config)?;

    println!("{}", crate::report::format_fit_summary(&out.summary));
    println!("{}", crate::report::format_residual_table(&out.summary.residuals));
    if let Some(plot) = &out.plot {
        println!("{plot}");
    }

    out.summary.ensure_valid()?;
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let plan = crate::data::SyntheticPlan {
        curve: Bsm4::new(args.curve.c, args.curve.m, args.curve.r, args.curve.b),
        t: crate::data::linspace(args.min_t, args.max_t, args.points)?,
        anchor: args.min_t,
        noise_sd: args.noise,
        seed: args.seed,
        alpha: args.alpha,
    };
    let samples = crate::data::generate_samples(&plan)?;
    crate::io::write_samples_csv(&args.out, &samples)?;

    println!(
        "Wrote {} samples on [{}, {}] to {}",
        samples.len(),
        args.min_t,
        args.max_t,
        args.out.display()
    );
    Ok(())
}

fn fit_options(args: &OptimizerArgs) -> FitOptions {
    let defaults = FitOptions::default();
    FitOptions {
        max_eval: args.max_eval,
        xtol_rel: args.xtol.unwrap_or(defaults.xtol_rel),
    }
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        sample_paths: args.samples.clone(),
        form: args.form,
        seed: ModelSeed {
            c: args.c,
            m: args.m,
            theta_b: args.theta_b,
            t0: args.t0,
            d1: args.d1,
            d2: args.d2,
        },
        options: fit_options(&args.optimizer),
        plot: args.plot.plot && !args.plot.no_plot,
        plot_width: args.plot.width,
        plot_height: args.plot.height,
        export_residuals: args.export.clone(),
        trace: args.optimizer.trace,
    }
}

/// `d1` defaults to the curve's own slope at `t = 0`.
pub fn auto_config_from_args(args: &AutoArgs, truth: &Bsm4) -> AutoConfig {
    AutoConfig {
        min_t: args.min_t,
        max_t: args.max_t,
        alpha: args.alpha,
        seed: ModelSeed {
            c: args.c,
            m: args.m,
            theta_b: args.theta_b,
            t0: 0.0,
            d1: args.d1.unwrap_or_else(|| truth.d1(0.0)),
            d2: 0.0,
        },
        options: fit_options(&args.optimizer),
        plot: args.plot.plot && !args.plot.no_plot,
        plot_width: args.plot.width,
        plot_height: args.plot.height,
        trace: args.optimizer.trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    #[test]
    fn fit_config_carries_seed_and_options() {
        let cli = Cli::parse_from([
            "lnl", "fit", "-s", "a.csv", "--c", "20", "--t0", "0.5", "--d2", "-30", "--xtol", "1e-10",
            "--no-plot", "--export", "res.csv",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args);

        assert_eq!(config.seed.c, 20.0);
        assert_eq!(config.seed.t0, 0.5);
        assert_eq!(config.seed.d2, -30.0);
        assert_eq!(config.options.xtol_rel, 1e-10);
        assert_eq!(config.options.max_eval, 1000);
        assert!(!config.plot);
        assert_eq!(config.export_residuals.as_deref(), Some(std::path::Path::new("res.csv")));
    }

    #[test]
    fn auto_slope_defaults_to_the_curve_derivative() {
        let cli = Cli::parse_from(["lnl", "auto"]);
        let Command::Auto(args) = cli.command else {
            panic!("expected auto");
        };
        let truth = Bsm4::new(args.curve.c, args.curve.m, args.curve.r, args.curve.b);
        let config = auto_config_from_args(&args, &truth);
        assert_eq!(config.seed.d1, truth.d1(0.0));
        assert!(config.seed.d1 < 0.0);
        assert_eq!(config.options.xtol_rel, FitOptions::default().xtol_rel);
    }
}
