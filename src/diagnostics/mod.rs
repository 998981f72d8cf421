//! Optional fit diagnostics.
//!
//! A `DiagnosticsSink` is handed to the fit driver explicitly; when it is `None`
//! nothing is reported. Sinks only observe. They never feed anything back
//! into the optimizer.
//!
//! - `LogSink`: one `debug!` line per objective evaluation
//! - `TraceFile`: markdown trace under `debug/` (timestamped file name)

use std::cell::{Cell, RefCell};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{debug, warn};

use crate::domain::SampleSet;
use crate::error::AppError;
use crate::fit::FitReport;

pub trait DiagnosticsSink {
    /// Called once per fit with the samples being fitted.
    fn samples(&self, _model: &str, _samples: &SampleSet) {}

    /// Called after every objective evaluation.
    fn iterate(&self, model: &str, names: &[&str], params: &[f64], rsse: f64, grad: Option<&[f64]>);

    /// Called once the optimizer returns.
    fn finished(&self, _model: &str, _params: &[f64], _report: &FitReport) {}
}

/// Reports iterates through the `log` facade at debug level.
#[derive(Debug, Default)]
pub struct LogSink {
    iteration: Cell<usize>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iterations(&self) -> usize {
        self.iteration.get()
    }
}

impl DiagnosticsSink for LogSink {
    fn samples(&self, model: &str, samples: &SampleSet) {
        debug!("{model}: t = {}", fmt_array(samples.t()));
        debug!("{model}: lnl = {}", fmt_array(samples.lnl()));
        debug!("{model}: w = {}", fmt_array(samples.w()));
    }

    fn iterate(&self, model: &str, names: &[&str], params: &[f64], rsse: f64, grad: Option<&[f64]>) {
        let n = self.iteration.get() + 1;
        self.iteration.set(n);
        match grad {
            Some(g) => debug!(
                "{model} N[{n}] rsse = {rsse:.6e}, model = {}, grad = {}",
                fmt_named(names, params),
                fmt_named(names, g)
            ),
            None => debug!("{model} N[{n}] rsse = {rsse:.6e}, model = {}", fmt_named(names, params)),
        }
    }

    fn finished(&self, model: &str, params: &[f64], report: &FitReport) {
        debug!(
            "{model}: {} after {} evaluations, params = {}",
            report.status,
            report.evaluations,
            fmt_array(params)
        );
    }
}

/// Markdown trace of one fit.
///
/// Write errors never interrupt the fit: the first one is logged and later
/// writes are skipped. `finish` reports whether the trace is complete.
#[derive(Debug)]
pub struct TraceFile {
    path: PathBuf,
    out: RefCell<BufWriter<File>>,
    iteration: Cell<usize>,
    failed: Cell<bool>,
}

impl TraceFile {
    /// Create `dir/lnl_trace_<label>_<timestamp>.md`.
    pub fn create(dir: &Path, label: &str) -> Result<Self, AppError> {
        create_dir_all(dir).map_err(|e| AppError::new(4, format!("Failed to create debug dir: {e}")))?;

        let ts = Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("lnl_trace_{label}_{ts}.md"));
        let file = File::create(&path)
            .map_err(|e| AppError::new(4, format!("Failed to create trace file: {e}")))?;

        let trace = Self {
            path,
            out: RefCell::new(BufWriter::new(file)),
            iteration: Cell::new(0),
            failed: Cell::new(false),
        };
        trace.line(format_args!("# lnl fit trace"));
        trace.line(format_args!("- generated: {}", Local::now().to_rfc3339()));
        trace.line(format_args!("- label: {label}"));
        Ok(trace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and return the trace path.
    pub fn finish(self) -> Result<PathBuf, AppError> {
        let mut out = self.out.into_inner();
        out.flush()
            .map_err(|e| AppError::new(4, format!("Failed to write trace: {e}")))?;
        if self.failed.get() {
            return Err(AppError::new(
                4,
                format!("Trace {} is incomplete (write error)", self.path.display()),
            ));
        }
        Ok(self.path)
    }

    fn line(&self, args: std::fmt::Arguments<'_>) {
        if self.failed.get() {
            return;
        }
        if let Err(e) = writeln!(self.out.borrow_mut(), "{args}") {
            warn!("trace {}: write failed: {e}", self.path.display());
            self.failed.set(true);
        }
    }
}

impl DiagnosticsSink for TraceFile {
    fn samples(&self, model: &str, samples: &SampleSet) {
        self.line(format_args!("\n## Samples ({model})"));
        self.line(format_args!("| t | lnl | w |"));
        self.line(format_args!("| - | - | - |"));
        for (t, lnl, w) in samples.iter() {
            self.line(format_args!("| {t:.6} | {lnl:.6} | {w:.6} |"));
        }
        self.line(format_args!("\n## Iterates"));
        self.line(format_args!("| N | rsse | model | grad |"));
        self.line(format_args!("| - | - | - | - |"));
    }

    fn iterate(&self, _model: &str, names: &[&str], params: &[f64], rsse: f64, grad: Option<&[f64]>) {
        let n = self.iteration.get() + 1;
        self.iteration.set(n);
        let grad = grad.map(|g| fmt_named(names, g)).unwrap_or_else(|| "-".to_string());
        self.line(format_args!(
            "| {n} | {rsse:.6e} | {} | {grad} |",
            fmt_named(names, params)
        ));
    }

    fn finished(&self, _model: &str, params: &[f64], report: &FitReport) {
        self.line(format_args!("\n## Outcome"));
        self.line(format_args!("- status: {}", report.status));
        self.line(format_args!("- evaluations: {}", report.evaluations));
        self.line(format_args!("- sum_sq_err: {:.6e}", report.sum_sq_err));
        self.line(format_args!("- params: {}", fmt_array(params)));
    }
}

fn fmt_array(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v}")).collect();
    format!("{{ {} }}", parts.join(", "))
}

fn fmt_named(names: &[&str], values: &[f64]) -> String {
    let parts: Vec<String> = names
        .iter()
        .zip(values.iter())
        .map(|(name, v)| format!("{name} = {v:.6}"))
        .collect();
    format!("{{ {} }}", parts.join(", "))
}
