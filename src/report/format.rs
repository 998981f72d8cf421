//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (golden tests below)

use log::debug;

use crate::domain::{ModelForm, SampleSet};
use crate::error::FitError;
use crate::fit::FitReport;
use crate::io::{RowError, SampleStats};
use crate::models::{Bsm4, CurveModel};
use crate::report::{compute_residuals, curve_landmarks, residual_stats, Landmarks, Residual};

/// Everything printed about one fitted sample file.
#[derive(Debug, Clone)]
pub struct FitSummary {
    pub label: String,
    pub form: ModelForm,
    pub param_names: Vec<&'static str>,
    pub params: Vec<f64>,
    pub report: FitReport,
    pub residuals: Vec<Residual>,
    pub unconstrained: Result<Bsm4, FitError>,
    pub landmarks: Option<Landmarks>,
}

impl FitSummary {
    pub fn from_model<M: CurveModel>(
        label: &str,
        form: ModelForm,
        model: &M,
        report: FitReport,
        samples: &SampleSet,
    ) -> Self {
        let (t_min, t_max) = samples.t_range();
        let landmarks = if t_max > t_min {
            curve_landmarks(model, t_min, t_max)
                .map_err(|e| debug!("{label}: no landmarks: {e}"))
                .ok()
        } else {
            None
        };

        Self {
            label: label.to_string(),
            form,
            param_names: model.param_names().to_vec(),
            params: model.params(),
            report,
            residuals: compute_residuals(samples, model),
            unconstrained: model.to_unconstrained(),
            landmarks,
        }
    }

    /// The fit converged and maps onto a valid `{c, m, r, b}` curve.
    pub fn ensure_valid(&self) -> Result<Bsm4, FitError> {
        self.report.ensure_converged()?;
        self.unconstrained.clone()
    }
}

pub fn format_fit_summary(summary: &FitSummary) -> String {
    let mut out = String::new();
    let report = &summary.report;

    out.push_str("=== lnl - BSM log-likelihood fit ===\n");
    out.push_str(&format!("Input: {}\n", summary.label));
    out.push_str(&format!(
        "Model: {} | samples={}\n",
        summary.form.display_name(),
        summary.residuals.len()
    ));
    out.push_str(&format!(
        "Status: {} | {} | evaluations={}\n",
        report.status,
        if report.converged() { "converged" } else { "NOT converged" },
        report.evaluations
    ));

    let (sse, max_abs) = residual_stats(&summary.residuals);
    out.push_str(&format!("SSE (weighted): {sse:.6e} | max |residual|: {max_abs:.6e}\n"));

    out.push_str("\nParameters:\n");
    for (name, value) in summary.param_names.iter().zip(summary.params.iter()) {
        out.push_str(&format!("- {name:<8} = {value:.6}\n"));
    }

    match &summary.unconstrained {
        Ok(m) => out.push_str(&format!(
            "- {{c, m, r, b}} = {{{:.6}, {:.6}, {:.6}, {:.6}}}\n",
            m.c, m.m, m.r, m.b
        )),
        Err(e) => out.push_str(&format!("- {{c, m, r, b}}: {e}\n")),
    }

    if let Some(marks) = &summary.landmarks {
        out.push_str(&format!(
            "\nMaximum: t={:.6} (norm_lnl={:.6})\n",
            marks.ml_t, marks.ml_norm_lnl
        ));
        out.push_str(&format!(
            "Support (max - 2): [{}, {}]\n",
            fmt_opt(marks.support_lower),
            fmt_opt(marks.support_upper)
        ));
    }
    out.push('\n');

    out
}

pub fn format_residual_table(residuals: &[Residual]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>12} {:>14} {:>14} {:>14} {:>10}",
            "t", "lnl_obs", "lnl_fit", "residual", "w"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!(
        "{:-<12} {:-<14} {:-<14} {:-<14} {:-<10}\n",
        "", "", "", "", ""
    ));

    for r in residuals {
        out.push_str(&format!(
            "{:>12.6} {:>14.6} {:>14.6} {:>14.3e} {:>10.4}\n",
            r.t, r.lnl_obs, r.lnl_fit, r.residual, r.w
        ));
    }

    out
}

/// Ranges of the rows that made it into the fit.
pub fn format_sample_stats(stats: &SampleStats) -> String {
    format!(
        "Samples: n={} | t in [{:.6}, {:.6}] | lnl in [{:.6}, {:.6}]\n",
        stats.n_points, stats.t_min, stats.t_max, stats.lnl_min, stats.lnl_max
    )
}

/// First `max` skipped rows, plus a count of the rest.
pub fn format_row_errors(errors: &[RowError], max: usize) -> String {
    if errors.is_empty() {
        return String::new();
    }

    let mut out = format!("Skipped {} row(s):\n", errors.len());
    for e in errors.iter().take(max) {
        out.push_str(&format!("  line {}: {}\n", e.line, e.message));
    }
    if errors.len() > max {
        out.push_str(&format!("  ... and {} more\n", errors.len() - max));
    }
    out
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.6}"),
        _ => "-".to_string(),
    }
}
