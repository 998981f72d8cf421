//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks of a fit in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed samples: `o` (zero-weight samples: `x`)
//! - fitted normalized log-likelihood: `-` line

use crate::domain::SampleSet;

/// Render samples together with a curve evaluated over the sample range.
///
/// Non-finite curve values (outside the model's domain) leave a gap.
pub fn render_fit_plot<F>(samples: &SampleSet, curve: F, width: usize, height: usize) -> String
where
    F: Fn(f64) -> f64,
{
    let (t_min, t_max) = match samples.t_range() {
        (lo, hi) if hi > lo => (lo, hi),
        (lo, _) => (lo - 0.5, lo + 0.5),
    };
    let points = sample_curve(&curve, t_min, t_max, width.max(2));
    render_plot(samples, &points, t_min, t_max, width, height)
}

fn render_plot(
    samples: &SampleSet,
    curve: &[(f64, f64)],
    t_min: f64,
    t_max: f64,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (y_min, y_max) = y_range(samples, curve).unwrap_or((-1.0, 0.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curve first so samples overlay it.
    draw_curve(&mut grid, curve, t_min, t_max, y_min, y_max);

    for (t, lnl, w) in samples.iter() {
        let x = map_x(t, t_min, t_max, width);
        let y = map_y(lnl, y_min, y_max, height);
        grid[y][x] = if w > 0.0 { 'o' } else { 'x' };
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: t=[{t_min:.3}, {t_max:.3}] | lnl=[{y_min:.2}, {y_max:.2}]\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    out
}

fn sample_curve<F>(curve: &F, t_min: f64, t_max: f64, n: usize) -> Vec<(f64, f64)>
where
    F: Fn(f64) -> f64,
{
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let t = t_min + u * (t_max - t_min);
            (t, curve(t))
        })
        .collect()
}

fn y_range(samples: &SampleSet, curve: &[(f64, f64)]) -> Option<(f64, f64)> {
    let ys = samples
        .lnl()
        .iter()
        .copied()
        .chain(curve.iter().map(|&(_, y)| y))
        .filter(|y| y.is_finite());

    let (min_y, max_y) = ys.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), y| (lo.min(y), hi.max(y)));
    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // Row 0 is the top (largest lnl).
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], t_min: f64, t_max: f64, y_min: f64, y_max: f64) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, y) in curve {
        if !y.is_finite() {
            prev = None;
            continue;
        }
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        match prev {
            Some((x0, y0)) => draw_line(grid, x0, y0, x, yy, '-'),
            None => grid[yy][x] = '-',
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_golden_snapshot_small() {
        let samples = SampleSet::unweighted(vec![0.0, 1.0], vec![0.0, -1.0]).unwrap();

        let txt = render_fit_plot(&samples, |t| -t, 10, 5);
        let expected = concat!(
            "Plot: t=[0.000, 1.000] | lnl=[-1.05, 0.05]\n",
            "o         \n",
            " ---      \n",
            "    --    \n",
            "      --- \n",
            "         o\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn undefined_curve_region_leaves_a_gap() {
        let samples = SampleSet::unweighted(vec![0.0, 1.0], vec![0.0, -1.0]).unwrap();
        let txt = render_fit_plot(&samples, |t| if t < 0.5 { f64::NAN } else { -t }, 10, 5);
        let first_half: String = txt.lines().skip(1).map(|l| &l[1..5]).collect();
        assert!(!first_half.contains('-'));
    }
}
