//! Dense convex quadratic programs of tiny dimension.
//!
//! The SQP optimizer repeatedly solves subproblems of the form:
//!
//! ```text
//! minimize   ½ dᵀ B d + gᵀ d
//! subject to A d ≤ b
//! ```
//!
//! with `B` symmetric positive definite, 2–3 unknowns and a handful of rows
//! (linearized constraints plus finite bounds).
//!
//! Implementation choices:
//! - We enumerate candidate active sets and solve the equality-constrained KKT
//!   system for each with an LU factorization. At this size that is cheaper and
//!   far simpler than a textbook active-set method, and it is deterministic.
//! - A candidate is accepted when it is primal feasible and its multipliers are
//!   non-negative. For a strictly convex QP that point is the unique optimum;
//!   we still keep the lowest objective to be robust to round-off.

use nalgebra::{DMatrix, DVector};

/// Slack allowed on `A d ≤ b`, relative to `1 + |b_i|`.
const FEAS_TOL: f64 = 1e-9;

/// Multipliers above `-MULT_TOL` count as non-negative.
const MULT_TOL: f64 = 1e-10;

/// Upper limit on rows; the enumeration is exponential.
pub const MAX_QP_ROWS: usize = 16;

/// Optimal step and the multipliers of every row (zero for inactive rows).
#[derive(Debug, Clone)]
pub struct QpSolution {
    pub step: DVector<f64>,
    pub multipliers: DVector<f64>,
    pub objective: f64,
}

/// Solve the QP described in the module docs.
///
/// Returns `None` when no active set yields a feasible KKT point (infeasible
/// constraints, singular `B`, or more than `MAX_QP_ROWS` rows).
pub fn solve_qp(
    hessian: &DMatrix<f64>,
    gradient: &DVector<f64>,
    a: &DMatrix<f64>,
    b: &DVector<f64>,
) -> Option<QpSolution> {
    let n = gradient.len();
    let rows = a.nrows();
    if hessian.nrows() != n || hessian.ncols() != n || a.ncols() != n || b.len() != rows {
        return None;
    }
    if rows > MAX_QP_ROWS {
        return None;
    }

    let mut best: Option<QpSolution> = None;

    for mask in 0usize..(1usize << rows) {
        let active: Vec<usize> = (0..rows).filter(|&i| mask & (1 << i) != 0).collect();
        if active.len() > n {
            continue;
        }

        let Some((step, lambda)) = solve_kkt(hessian, gradient, a, b, &active) else {
            continue;
        };

        if lambda.iter().any(|&l| l < -MULT_TOL) {
            continue;
        }
        let ad = a * &step;
        let feasible = (0..rows).all(|i| ad[i] <= b[i] + FEAS_TOL * (1.0 + b[i].abs()));
        if !feasible {
            continue;
        }

        let objective = 0.5 * step.dot(&(hessian * &step)) + gradient.dot(&step);
        if !objective.is_finite() {
            continue;
        }

        let better = match &best {
            Some(current) => objective < current.objective,
            None => true,
        };
        if better {
            let mut multipliers = DVector::<f64>::zeros(rows);
            for (k, &i) in active.iter().enumerate() {
                multipliers[i] = lambda[k].max(0.0);
            }
            best = Some(QpSolution {
                step,
                multipliers,
                objective,
            });
        }
    }

    best
}

/// Solve `[B Aₛᵀ; Aₛ 0] [d; λ] = [-g; bₛ]` for the active rows `S`.
fn solve_kkt(
    hessian: &DMatrix<f64>,
    gradient: &DVector<f64>,
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    active: &[usize],
) -> Option<(DVector<f64>, DVector<f64>)> {
    let n = gradient.len();
    let k = active.len();
    let dim = n + k;

    let mut kkt = DMatrix::<f64>::zeros(dim, dim);
    let mut rhs = DVector::<f64>::zeros(dim);

    kkt.view_mut((0, 0), (n, n)).copy_from(hessian);
    for i in 0..n {
        rhs[i] = -gradient[i];
    }
    for (row, &i) in active.iter().enumerate() {
        for j in 0..n {
            kkt[(n + row, j)] = a[(i, j)];
            kkt[(j, n + row)] = a[(i, j)];
        }
        rhs[n + row] = b[i];
    }

    let sol = kkt.lu().solve(&rhs)?;
    if sol.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let step = DVector::from_iterator(n, sol.iter().take(n).copied());
    let lambda = DVector::from_iterator(k, sol.iter().skip(n).copied());
    Some((step, lambda))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconstrained_qp_is_newton_step() {
        let h = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 4.0]);
        let g = DVector::from_row_slice(&[-2.0, -4.0]);
        let a = DMatrix::<f64>::zeros(0, 2);
        let b = DVector::<f64>::zeros(0);

        let sol = solve_qp(&h, &g, &a, &b).unwrap();
        assert!((sol.step[0] - 1.0).abs() < 1e-12);
        assert!((sol.step[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn active_constraint_clips_the_step_and_gets_a_positive_multiplier() {
        // minimize (d0 - 1)^2 + (d1 - 1)^2 subject to d0 + d1 <= 1.
        let h = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 2.0]);
        let g = DVector::from_row_slice(&[-2.0, -2.0]);
        let a = DMatrix::from_row_slice(1, 2, &[1.0, 1.0]);
        let b = DVector::from_row_slice(&[1.0]);

        let sol = solve_qp(&h, &g, &a, &b).unwrap();
        assert!((sol.step[0] - 0.5).abs() < 1e-12);
        assert!((sol.step[1] - 0.5).abs() < 1e-12);
        assert!(sol.multipliers[0] > 0.0);
    }

    #[test]
    fn inconsistent_rows_have_no_solution() {
        // d0 <= -1 and -d0 <= -1 cannot both hold.
        let h = DMatrix::<f64>::identity(1, 1);
        let g = DVector::from_row_slice(&[0.0]);
        let a = DMatrix::from_row_slice(2, 1, &[1.0, -1.0]);
        let b = DVector::from_row_slice(&[-1.0, -1.0]);

        assert!(solve_qp(&h, &g, &a, &b).is_none());
    }
}
