//! CSV exports.
//!
//! - per-sample residuals of a fitted model (spreadsheet friendly)
//! - sample sets, in the same schema `io::samples` reads back

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::SampleSet;
use crate::error::AppError;
use crate::models::CurveModel;

#[derive(Debug, Serialize)]
struct SampleRow {
    t: f64,
    lnl: f64,
    w: f64,
}

/// Write `t, lnl_obs, lnl_fit, residual, w` for every sample.
pub fn write_residuals_csv<M: CurveModel>(
    path: &Path,
    samples: &SampleSet,
    model: &M,
) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_residuals(&mut file, samples, model)
}

pub fn write_residuals<W: Write, M: CurveModel>(
    out: &mut W,
    samples: &SampleSet,
    model: &M,
) -> Result<(), AppError> {
    writeln!(out, "t,lnl_obs,lnl_fit,residual,w")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for (t, lnl, w) in samples.iter() {
        let fit = model.norm_lnl(t);
        writeln!(out, "{t:.10},{lnl:.10},{fit:.10},{:.10},{w:.10}", lnl - fit)
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }
    Ok(())
}

/// Write a sample set as `t,lnl,w`.
pub fn write_samples_csv(path: &Path, samples: &SampleSet) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create samples CSV '{}': {e}", path.display())))?;
    write_samples(file, samples)
}

pub fn write_samples<W: Write>(out: W, samples: &SampleSet) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    for (t, lnl, w) in samples.iter() {
        writer
            .serialize(SampleRow { t, lnl, w })
            .map_err(|e| AppError::new(2, format!("Failed to write samples CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush samples CSV: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::samples::read_samples;
    use crate::models::Bsm2;

    #[test]
    fn residual_rows_follow_samples() {
        let model = Bsm2::new(10.0, 3.0, 0.0, 0.0, -20.0);
        let samples = SampleSet::unweighted(vec![0.0, 0.1], vec![0.0, -0.5]).unwrap();

        let mut out = Vec::new();
        write_residuals(&mut out, &samples, &model).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "t,lnl_obs,lnl_fit,residual,w");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("0.0000000000,0.0000000000,0.0000000000,0.0000000000,"));
    }

    #[test]
    fn written_samples_read_back() {
        let samples = SampleSet::new(vec![0.0, 0.5], vec![0.0, -1.25], vec![1.0, 0.5]).unwrap();
        let mut out = Vec::new();
        write_samples(&mut out, &samples).unwrap();

        let loaded = read_samples(out.as_slice()).unwrap();
        assert_eq!(loaded.samples, samples);
    }
}
