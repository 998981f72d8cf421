//! CSV ingest of likelihood samples.
//!
//! Expected schema (header names are case-insensitive, BOM tolerant):
//!
//! | column | required | aliases |
//! | - | - | - |
//! | `t` | yes | `x`, `branch_length` |
//! | `lnl` | yes | `ll`, `log_likelihood` |
//! | `w` | no | `weight` |
//!
//! Rows that fail to parse are skipped and reported, in the same way as the
//! rest of the pipeline treats bad input: clear errors, exit code 2 for
//! schema problems, 3 when nothing usable remains.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use serde::Serialize;

use crate::domain::SampleSet;
use crate::error::AppError;

const T_COLUMNS: [&str; 3] = ["t", "x", "branch_length"];
const LNL_COLUMNS: [&str; 3] = ["lnl", "ll", "log_likelihood"];
const W_COLUMNS: [&str; 2] = ["w", "weight"];

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Summary stats about the samples actually used.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleStats {
    pub n_points: usize,
    pub t_min: f64,
    pub t_max: f64,
    pub lnl_min: f64,
    pub lnl_max: f64,
}

/// Ingest output: validated samples + stats + row errors.
#[derive(Debug, Clone)]
pub struct LoadedSamples {
    pub samples: SampleSet,
    pub stats: SampleStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load samples from a CSV file.
pub fn load_samples(path: &Path) -> Result<LoadedSamples, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_samples(file)
        .map_err(|e| AppError::new(e.exit_code(), format!("{}: {e}", path.display())))
}

/// Load samples from any CSV reader (first line is the header).
///
/// Row errors carry the physical line of the offending row, counting the
/// header, comment lines, and blank lines.
pub fn read_samples<R: Read>(mut input: R) -> Result<LoadedSamples, AppError> {
    let mut bytes = Vec::new();
    input
        .read_to_end(&mut bytes)
        .map_err(|e| AppError::new(2, format!("Failed to read CSV: {e}")))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(bytes.as_slice());

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let t_idx = find_column(&header_map, &T_COLUMNS)
        .ok_or_else(|| AppError::new(2, "Missing required column: `t`"))?;
    let lnl_idx = find_column(&header_map, &LNL_COLUMNS)
        .ok_or_else(|| AppError::new(2, "Missing required column: `lnl`"))?;
    let w_idx = find_column(&header_map, &W_COLUMNS);

    let mut t = Vec::new();
    let mut lnl = Vec::new();
    let mut w = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    let mut record = StringRecord::new();
    loop {
        let read = reader.read_record(&mut record);
        let end = usize::try_from(reader.position().byte()).unwrap_or(bytes.len());
        let last_line = last_line_before(&bytes, end);

        match read {
            Ok(false) => break,
            Ok(true) => {
                rows_read += 1;
                // Quoted fields may span lines; report where the row starts.
                let inner: usize = record.iter().map(|f| f.matches('\n').count()).sum();
                let line = last_line.saturating_sub(inner);
                match parse_row(&record, t_idx, lnl_idx, w_idx) {
                    Ok((ti, li, wi)) => {
                        t.push(ti);
                        lnl.push(li);
                        w.push(wi);
                    }
                    Err(message) => row_errors.push(RowError { line, message }),
                }
            }
            Err(e) if e.is_io_error() => {
                return Err(AppError::new(2, format!("Failed to read CSV: {e}")));
            }
            Err(e) => {
                rows_read += 1;
                row_errors.push(RowError {
                    line: last_line,
                    message: format!("CSV parse error: {e}"),
                });
            }
        }
    }

    if t.is_empty() {
        return Err(AppError::new(3, "No valid sample rows found."));
    }

    let stats = compute_stats(&t, &lnl);
    let samples = SampleSet::new(t, lnl, w).map_err(|e| AppError::new(3, e.to_string()))?;

    Ok(LoadedSamples {
        samples,
        stats,
        row_errors,
        rows_read,
    })
}

fn parse_row(
    record: &StringRecord,
    t_idx: usize,
    lnl_idx: usize,
    w_idx: Option<usize>,
) -> Result<(f64, f64, f64), String> {
    let t = parse_f64(record, t_idx, "t")?;
    let lnl = parse_f64(record, lnl_idx, "lnl")?;
    let w = match w_idx {
        Some(i) if record.get(i).is_some_and(|s| !s.is_empty()) => parse_f64(record, i, "w")?,
        _ => 1.0,
    };
    if w < 0.0 {
        return Err(format!("Weight must be >= 0, got {w}"));
    }
    Ok((t, lnl, w))
}

fn parse_f64(record: &StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    let raw = record
        .get(idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))?;
    let v = raw
        .parse::<f64>()
        .map_err(|_| format!("Invalid number for `{name}`: '{raw}'"))?;
    if v.is_finite() {
        Ok(v)
    } else {
        Err(format!("Non-finite value for `{name}`: '{raw}'"))
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn find_column(header_map: &HashMap<String, usize>, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|n| header_map.get(*n).copied())
}

/// 1-based line of the last byte before `end`, ignoring the record terminator.
fn last_line_before(bytes: &[u8], end: usize) -> usize {
    let mut content = &bytes[..end.min(bytes.len())];
    while let [rest @ .., b'\n' | b'\r'] = content {
        content = rest;
    }
    1 + content.iter().filter(|&&b| b == b'\n').count()
}

fn compute_stats(t: &[f64], lnl: &[f64]) -> SampleStats {
    let (t_min, t_max) = t
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let (lnl_min, lnl_max) = lnl
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    SampleStats {
        n_points: t.len(),
        t_min,
        t_max,
        lnl_min,
        lnl_max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_required_and_optional_columns() {
        let csv = "\u{feff}T,LnL,weight\n0,0,1\n1,-0.3,0.5\n2,-1.1,\n";
        let loaded = read_samples(csv.as_bytes()).unwrap();

        assert_eq!(loaded.rows_read, 3);
        assert!(loaded.row_errors.is_empty());
        assert_eq!(loaded.samples.t(), &[0.0, 1.0, 2.0]);
        assert_eq!(loaded.samples.lnl(), &[0.0, -0.3, -1.1]);
        assert_eq!(loaded.samples.w(), &[1.0, 0.5, 1.0]);
        assert_eq!(loaded.stats.lnl_min, -1.1);
        assert_eq!(loaded.stats.t_max, 2.0);
    }

    #[test]
    fn bad_rows_are_skipped_and_reported() {
        let csv = "branch_length,log_likelihood\n0,0\nabc,-1\n# comment\n2,inf\n3,-2\n1,\n";
        let loaded = read_samples(csv.as_bytes()).unwrap();

        assert_eq!(loaded.samples.len(), 2);
        let lines: Vec<usize> = loaded.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 5, 7]);
        assert!(loaded.row_errors[0].message.contains("Invalid number for `t`"));
    }

    #[test]
    fn row_errors_count_comment_and_blank_lines() {
        let loaded = read_samples("t,lnl\n# c1\n# c2\n0,0\nbad,1\n".as_bytes()).unwrap();
        assert_eq!(loaded.row_errors.len(), 1);
        assert_eq!(loaded.row_errors[0].line, 5);

        // Blank line, CRLF endings, and a last row without a terminator.
        let loaded = read_samples("t,lnl\r\n0,0\r\n\r\n1,x\r\n2,-1\r\n3,".as_bytes()).unwrap();
        let lines: Vec<usize> = loaded.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![4, 6]);
        assert_eq!(loaded.samples.t(), &[0.0, 2.0]);
    }

    #[test]
    fn multi_line_rows_report_their_first_line() {
        let loaded = read_samples("t,lnl,note\n0,0,ok\n1,oops,\"two\nlines\"\n2,-1,x\n".as_bytes()).unwrap();
        assert_eq!(loaded.row_errors.len(), 1);
        assert_eq!(loaded.row_errors[0].line, 3);
        assert_eq!(loaded.rows_read, 3);
    }

    #[test]
    fn missing_column_is_a_schema_error() {
        let err = read_samples("t,w\n0,1\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("`lnl`"));
    }

    #[test]
    fn no_usable_rows_is_an_insufficient_data_error() {
        let err = read_samples("t,lnl\nx,y\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
