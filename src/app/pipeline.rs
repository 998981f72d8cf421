//! Shared "fit pipeline" logic used by the `fit` and `auto` commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV ingest -> model seed -> constrained fit -> residuals/landmarks -> exports
//!
//! The commands can then focus on presentation.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::diagnostics::{DiagnosticsSink, LogSink, TraceFile};
use crate::domain::{AutoConfig, FitConfig, ModelForm, ModelSeed, SampleSet};
use crate::error::{AppError, FitError};
use crate::fit::{compute_weights, normalize, FitOptions, FitReport, N_POINTS};
use crate::io::LoadedSamples;
use crate::models::{Bsm2, Bsm3, CurveModel};
use crate::report::FitSummary;

const DEBUG_DIR: &str = "debug";

/// All computed outputs for one sample file.
#[derive(Debug, Clone)]
pub struct FitOutput {
    pub path: PathBuf,
    pub loaded: LoadedSamples,
    pub summary: FitSummary,
    /// Terminal plot, when requested.
    pub plot: Option<String>,
    pub trace: Option<PathBuf>,
}

/// Outputs of a callback-driven fit.
#[derive(Debug, Clone)]
pub struct AutoOutput {
    pub model: Bsm3,
    /// The four normalized, weighted samples that were fitted.
    pub samples: SampleSet,
    pub summary: FitSummary,
    pub plot: Option<String>,
    pub trace: Option<PathBuf>,
}

/// Fit every configured sample file independently.
///
/// Files are processed in parallel; results come back in input order.
pub fn run_fit(config: &FitConfig) -> Vec<Result<FitOutput, AppError>> {
    let multiple = config.sample_paths.len() > 1;
    config
        .sample_paths
        .par_iter()
        .enumerate()
        .map(|(idx, path)| {
            let export = config
                .export_residuals
                .as_deref()
                .map(|p| if multiple { indexed_path(p, idx) } else { p.to_path_buf() });
            run_fit_file(path, config, export.as_deref())
        })
        .collect()
}

/// Load, fit, and summarize one sample file.
pub fn run_fit_file(path: &Path, config: &FitConfig, export: Option<&Path>) -> Result<FitOutput, AppError> {
    let loaded = crate::io::load_samples(path)?;
    if !loaded.row_errors.is_empty() {
        warn!(
            "{}: skipped {} of {} rows",
            path.display(),
            loaded.row_errors.len(),
            loaded.rows_read
        );
    }

    let label = path.display().to_string();
    let (summary, plot, trace) = match config.form {
        ModelForm::Bsm2 => {
            let model = bsm2_from_seed(&config.seed);
            fit_and_summarize(&label, config, ModelForm::Bsm2, model, &loaded.samples, export)
        }
        ModelForm::Bsm3 => {
            let model = bsm3_from_seed(&config.seed);
            fit_and_summarize(&label, config, ModelForm::Bsm3, model, &loaded.samples, export)
        }
    }
    .map_err(|e| e.with_context(&label))?;

    Ok(FitOutput {
        path: path.to_path_buf(),
        loaded,
        summary,
        plot,
        trace,
    })
}

pub fn bsm2_from_seed(seed: &ModelSeed) -> Bsm2 {
    Bsm2::new(seed.c, seed.m, seed.t0, seed.d1, seed.d2)
}

pub fn bsm3_from_seed(seed: &ModelSeed) -> Bsm3 {
    Bsm3::new(seed.c, seed.m, seed.theta_b, seed.d1)
}

/// Fit `model` with the configured sink, then build the summary, plot, and export.
fn fit_and_summarize<M: CurveModel>(
    label: &str,
    config: &FitConfig,
    form: ModelForm,
    mut model: M,
    samples: &SampleSet,
    export: Option<&Path>,
) -> Result<(FitSummary, Option<String>, Option<PathBuf>), AppError> {
    let (report, trace) = fit_with_sink(&mut model, samples, &config.options, config.trace, label)?;

    if let Some(path) = export {
        crate::io::write_residuals_csv(path, samples, &model)?;
        info!("{label}: residuals written to {}", path.display());
    }

    let plot = config.plot.then(|| {
        crate::plot::render_fit_plot(samples, |t| model.norm_lnl(t), config.plot_width, config.plot_height)
    });
    let summary = FitSummary::from_model(label, form, &model, report, samples);
    Ok((summary, plot, trace))
}

/// Run the weighted fit, reporting through a trace file or the log.
pub fn fit_with_sink<M: CurveModel>(
    model: &mut M,
    samples: &SampleSet,
    options: &FitOptions,
    trace: bool,
    label: &str,
) -> Result<(FitReport, Option<PathBuf>), AppError> {
    with_sink(trace, label, |sink| crate::fit::fit_weighted(model, samples, options, Some(sink)))
}

/// Choose four points on `lnl_fn`, fit the 3-parameter form there, and summarize.
pub fn run_auto<F>(lnl_fn: F, config: &AutoConfig) -> Result<AutoOutput, AppError>
where
    F: Fn(f64) -> f64,
{
    let label = "auto";
    let mut model = bsm3_from_seed(&config.seed);

    // Keep what the callback returned so the summary shows the fitted samples.
    let mut calls = Vec::with_capacity(N_POINTS);
    let recorded = |t: f64| {
        let v = lnl_fn(t);
        calls.push((t, v));
        v
    };

    let (report, trace) = with_sink(config.trace, label, |sink| {
        crate::fit::fit_auto(
            recorded,
            &mut model,
            config.min_t,
            config.max_t,
            config.alpha,
            &config.options,
            Some(sink),
        )
    })?;

    let (t, mut lnl): (Vec<f64>, Vec<f64>) = calls.into_iter().unzip();
    normalize(lnl[0], &mut lnl);
    let (w, _) = compute_weights(&lnl, config.alpha);
    let samples = SampleSet::new(t, lnl, w)?;

    let plot = config.plot.then(|| {
        crate::plot::render_fit_plot(&samples, |t| model.norm_lnl(t), config.plot_width, config.plot_height)
    });
    let summary = FitSummary::from_model(label, ModelForm::Bsm3, &model, report, &samples);

    Ok(AutoOutput {
        model,
        samples,
        summary,
        plot,
        trace,
    })
}

/// Hand `f` a sink: a markdown trace under `debug/` when `trace` is set, the log otherwise.
fn with_sink<R, F>(trace: bool, label: &str, f: F) -> Result<(R, Option<PathBuf>), AppError>
where
    F: FnOnce(&dyn DiagnosticsSink) -> Result<R, FitError>,
{
    if trace {
        let sink = TraceFile::create(Path::new(DEBUG_DIR), &trace_label(label))?;
        debug!("{label}: tracing to {}", sink.path().display());
        let out = f(&sink)?;
        let path = sink.finish()?;
        info!("{label}: trace written to {}", path.display());
        Ok((out, Some(path)))
    } else {
        let sink = LogSink::new();
        let out = f(&sink)?;
        debug!("{label}: {} objective evaluations logged", sink.iterations());
        Ok((out, None))
    }
}

/// `out.csv` -> `out_2.csv` for the third input.
fn indexed_path(path: &Path, idx: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "residuals".to_string());
    let name = match path.extension() {
        Some(ext) => format!("{stem}_{idx}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{idx}"),
    };
    path.with_file_name(name)
}

/// File-name-safe version of a sample path.
fn trace_label(label: &str) -> String {
    let stem = Path::new(label)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| label.to_string());
    stem.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' { ch } else { '_' })
        .collect()
}
