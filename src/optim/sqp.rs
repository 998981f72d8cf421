//! Gradient-based minimization with box bounds and inequality constraints.
//!
//! The optimizer solves:
//!
//! ```text
//! minimize f(x)  subject to  g_j(x) ≤ 0,  lower ≤ x ≤ upper
//! ```
//!
//! by sequential quadratic programming:
//! - each iteration solves a QP built from a quasi-Newton model of the
//!   Lagrangian and the linearized constraints (`math::qp`)
//! - the step is globalized by backtracking on the L1 merit function
//!   `f + μ Σ max(0, g_j)`
//! - the Hessian model is a damped BFGS update (stays positive definite)
//!
//! Callbacks receive `(x, gradient_out)`; `gradient_out` is `None` when the
//! caller only needs the value. A non-finite objective or constraint value marks
//! the probe as infeasible and the line search backs off. Nothing panics on
//! NaN input.

use nalgebra::{DMatrix, DVector};

use crate::math::solve_qp;

/// Objective or constraint callback: value at `x`, gradient written when requested.
pub type Callback<'a> = Box<dyn Fn(&[f64], Option<&mut [f64]>) -> f64 + 'a>;

/// Sufficient-decrease constant of the merit line search.
const ARMIJO: f64 = 1e-4;

/// Smallest step fraction tried before giving up on the line search.
const MIN_STEP: f64 = 1e-10;

/// Absolute slack added to each constraint tolerance in the stopping test.
pub const FEASIBILITY_SLACK: f64 = 1e-8;

/// Initial Hessian model is scaled so the first step moves ~10% of `‖x‖`.
const FIRST_STEP_FRACTION: f64 = 0.1;

/// Termination status.
///
/// Codes follow the usual convention: positive is success, negative is failure.
/// `MaxEvalReached` is positive (the iterate is usable) but is not convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptStatus {
    Success,
    XtolReached,
    MaxEvalReached,
    RoundoffLimited,
    Failure,
    InvalidArgs,
}

impl OptStatus {
    pub fn code(self) -> i32 {
        match self {
            OptStatus::Success => 1,
            OptStatus::XtolReached => 4,
            OptStatus::MaxEvalReached => 5,
            OptStatus::RoundoffLimited => -4,
            OptStatus::Failure => -1,
            OptStatus::InvalidArgs => -2,
        }
    }

    /// True when the stopping tolerance was met.
    pub fn is_converged(self) -> bool {
        matches!(self, OptStatus::Success | OptStatus::XtolReached)
    }
}

impl std::fmt::Display for OptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OptStatus::Success => "success",
            OptStatus::XtolReached => "xtol reached",
            OptStatus::MaxEvalReached => "max evaluations reached",
            OptStatus::RoundoffLimited => "roundoff limited",
            OptStatus::Failure => "failure",
            OptStatus::InvalidArgs => "invalid arguments",
        };
        write!(f, "{label} ({})", self.code())
    }
}

/// Result of one `optimize` call. The parameter vector is written back in place.
#[derive(Debug, Clone, Copy)]
pub struct OptOutcome {
    pub status: OptStatus,
    /// Objective value at the returned iterate.
    pub value: f64,
    /// Number of objective evaluations spent.
    pub evaluations: usize,
}

struct InequalityConstraint<'a> {
    eval: Callback<'a>,
    tolerance: f64,
}

/// Everything known about one accepted (finite) iterate.
#[derive(Debug, Clone)]
struct Point {
    x: DVector<f64>,
    f: f64,
    grad: DVector<f64>,
    cons: Vec<f64>,
    cons_grad: Vec<DVector<f64>>,
}

/// SQP optimizer handle.
///
/// ```text
/// let mut opt = Sqp::new(2);
/// opt.set_min_objective(|x, grad| ...);
/// opt.set_lower_bounds(&[1.0, 1.0]);
/// opt.add_inequality_constraint(|x, grad| ..., 0.0);
/// let outcome = opt.optimize(&mut x);
/// ```
pub struct Sqp<'a> {
    dim: usize,
    objective: Option<Callback<'a>>,
    constraints: Vec<InequalityConstraint<'a>>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    xtol_rel: f64,
    max_eval: usize,
    evaluations: usize,
}

impl<'a> Sqp<'a> {
    /// Create an optimizer for `dim` unknowns with no bounds or constraints.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            objective: None,
            constraints: Vec::new(),
            lower: vec![f64::NEG_INFINITY; dim],
            upper: vec![f64::INFINITY; dim],
            xtol_rel: f64::EPSILON.sqrt(),
            max_eval: 1000,
            evaluations: 0,
        }
    }

    pub fn set_min_objective(&mut self, f: impl Fn(&[f64], Option<&mut [f64]>) -> f64 + 'a) {
        self.objective = Some(Box::new(f));
    }

    pub fn set_lower_bounds(&mut self, lower: &[f64]) {
        self.lower = lower.to_vec();
    }

    pub fn set_upper_bounds(&mut self, upper: &[f64]) {
        self.upper = upper.to_vec();
    }

    /// Add `g(x) ≤ 0`, satisfied once `g(x) ≤ tolerance`.
    pub fn add_inequality_constraint(
        &mut self,
        g: impl Fn(&[f64], Option<&mut [f64]>) -> f64 + 'a,
        tolerance: f64,
    ) {
        self.constraints.push(InequalityConstraint {
            eval: Box::new(g),
            tolerance: tolerance.max(0.0),
        });
    }

    /// Stop once `‖Δx‖ ≤ tol ‖x‖` at a feasible iterate.
    pub fn set_xtol_rel(&mut self, tol: f64) {
        self.xtol_rel = tol;
    }

    /// Budget on objective evaluations.
    pub fn set_max_eval(&mut self, max_eval: usize) {
        self.max_eval = max_eval;
    }

    /// Minimize starting from `x`; `x` receives the last accepted iterate.
    pub fn optimize(&mut self, x: &mut [f64]) -> OptOutcome {
        self.evaluations = 0;

        if !self.valid_setup(x) {
            return OptOutcome {
                status: OptStatus::InvalidArgs,
                value: f64::NAN,
                evaluations: 0,
            };
        }

        for i in 0..self.dim {
            x[i] = x[i].clamp(self.lower[i], self.upper[i]);
        }

        let Some(mut point) = self.probe(&DVector::from_column_slice(x)) else {
            return OptOutcome {
                status: OptStatus::Failure,
                value: f64::NAN,
                evaluations: self.evaluations,
            };
        };

        let n_cons = self.constraints.len();
        let mut hessian = initial_hessian(&point);
        let mut penalty = 0.0_f64;

        loop {
            let (a, b) = self.linearize(&point);
            let relaxed = relax(&b, n_cons);

            let mut solution = solve_qp(&hessian, &point.grad, &a, &b);
            if solution.is_none() {
                solution = solve_qp(&hessian, &point.grad, &a, &relaxed);
            }
            if solution.is_none() {
                // The quasi-Newton model can degenerate on flat ridges; restart it.
                hessian = initial_hessian(&point);
                solution = solve_qp(&hessian, &point.grad, &a, &relaxed);
            }
            let Some(solution) = solution else {
                return self.finish(x, &point, OptStatus::Failure);
            };

            let lambda: Vec<f64> = solution.multipliers.iter().take(n_cons).copied().collect();
            let lambda_max = lambda.iter().fold(0.0_f64, |acc, &l| acc.max(l.abs()));
            penalty = penalty.max(1.1 * lambda_max);

            let merit0 = merit(point.f, &point.cons, penalty);
            let slope = point.grad.dot(&solution.step) - penalty * violation(&point.cons);

            let mut alpha = 1.0;
            let mut accepted = None;
            while alpha >= MIN_STEP {
                if self.evaluations >= self.max_eval {
                    return self.finish(x, &point, OptStatus::MaxEvalReached);
                }
                let trial_x = self.project(&(&point.x + &solution.step * alpha));
                if let Some(trial) = self.probe(&trial_x) {
                    let merit1 = merit(trial.f, &trial.cons, penalty);
                    if merit1 <= merit0 + ARMIJO * alpha * slope.min(0.0) {
                        accepted = Some(trial);
                        break;
                    }
                }
                alpha *= 0.5;
            }
            let Some(trial) = accepted else {
                return self.finish(x, &point, OptStatus::RoundoffLimited);
            };

            let s = &trial.x - &point.x;
            let y = lagrangian_gradient(&trial, &lambda) - lagrangian_gradient(&point, &lambda);
            damped_bfgs_update(&mut hessian, &s, &y);

            let small_step = s.norm() <= self.xtol_rel * trial.x.norm();
            point = trial;

            if small_step && self.is_feasible(&point.cons) {
                return self.finish(x, &point, OptStatus::XtolReached);
            }
        }
    }

    fn valid_setup(&self, x: &[f64]) -> bool {
        self.objective.is_some()
            && self.dim > 0
            && x.len() == self.dim
            && self.lower.len() == self.dim
            && self.upper.len() == self.dim
            && x.iter().all(|v| v.is_finite())
            && self
                .lower
                .iter()
                .zip(self.upper.iter())
                .all(|(&lo, &hi)| !lo.is_nan() && !hi.is_nan() && lo <= hi)
            && self.xtol_rel.is_finite()
            && self.xtol_rel >= 0.0
    }

    /// Evaluate objective and constraints with gradients; `None` if anything is non-finite.
    fn probe(&mut self, x: &DVector<f64>) -> Option<Point> {
        let objective = self.objective.as_ref()?;

        let mut grad = DVector::<f64>::zeros(self.dim);
        let f = objective(x.as_slice(), Some(grad.as_mut_slice()));
        self.evaluations += 1;
        if !f.is_finite() || grad.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let mut cons = Vec::with_capacity(self.constraints.len());
        let mut cons_grad = Vec::with_capacity(self.constraints.len());
        for c in &self.constraints {
            let mut g = DVector::<f64>::zeros(self.dim);
            let v = (c.eval)(x.as_slice(), Some(g.as_mut_slice()));
            if !v.is_finite() || g.iter().any(|gi| !gi.is_finite()) {
                return None;
            }
            cons.push(v);
            cons_grad.push(g);
        }

        Some(Point {
            x: x.clone(),
            f,
            grad,
            cons,
            cons_grad,
        })
    }

    /// Rows of `A d ≤ b`: linearized constraints first, then finite bounds.
    fn linearize(&self, point: &Point) -> (DMatrix<f64>, DVector<f64>) {
        let n = self.dim;
        let mut rows: Vec<(DVector<f64>, f64)> = Vec::new();

        for (g, grad) in point.cons.iter().zip(point.cons_grad.iter()) {
            rows.push((grad.clone(), -g));
        }
        for i in 0..n {
            if self.lower[i].is_finite() {
                let mut e = DVector::<f64>::zeros(n);
                e[i] = -1.0;
                rows.push((e, point.x[i] - self.lower[i]));
            }
            if self.upper[i].is_finite() {
                let mut e = DVector::<f64>::zeros(n);
                e[i] = 1.0;
                rows.push((e, self.upper[i] - point.x[i]));
            }
        }

        let mut a = DMatrix::<f64>::zeros(rows.len(), n);
        let mut b = DVector::<f64>::zeros(rows.len());
        for (r, (coeffs, rhs)) in rows.iter().enumerate() {
            for j in 0..n {
                a[(r, j)] = coeffs[j];
            }
            b[r] = *rhs;
        }
        (a, b)
    }

    fn project(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.dim,
            x.iter()
                .enumerate()
                .map(|(i, &v)| v.clamp(self.lower[i], self.upper[i])),
        )
    }

    fn is_feasible(&self, cons: &[f64]) -> bool {
        cons.iter()
            .zip(self.constraints.iter())
            .all(|(&v, c)| v <= c.tolerance + FEASIBILITY_SLACK)
    }

    fn finish(&self, x: &mut [f64], point: &Point, status: OptStatus) -> OptOutcome {
        x.copy_from_slice(point.x.as_slice());
        OptOutcome {
            status,
            value: point.f,
            evaluations: self.evaluations,
        }
    }
}

/// Constraint rows may not be satisfiable by any step; relax them so `d = 0` is feasible.
fn relax(b: &DVector<f64>, n_cons: usize) -> DVector<f64> {
    let mut out = b.clone();
    for i in 0..n_cons.min(out.len()) {
        out[i] = out[i].max(0.0);
    }
    out
}

fn violation(cons: &[f64]) -> f64 {
    cons.iter().map(|&g| g.max(0.0)).sum()
}

fn merit(f: f64, cons: &[f64], penalty: f64) -> f64 {
    f + penalty * violation(cons)
}

fn lagrangian_gradient(point: &Point, lambda: &[f64]) -> DVector<f64> {
    let mut grad = point.grad.clone();
    for (l, g) in lambda.iter().zip(point.cons_grad.iter()) {
        grad += g * *l;
    }
    grad
}

fn initial_hessian(point: &Point) -> DMatrix<f64> {
    let scale = point.grad.norm() / (FIRST_STEP_FRACTION * point.x.norm().max(1.0));
    DMatrix::<f64>::identity(point.x.len(), point.x.len()) * scale.max(1e-8)
}

/// Powell-damped BFGS update; leaves `h` untouched if the update would not be SPD.
fn damped_bfgs_update(h: &mut DMatrix<f64>, s: &DVector<f64>, y: &DVector<f64>) {
    let hs = &*h * s;
    let shs = s.dot(&hs);
    if !(shs > 0.0) {
        return;
    }

    let mut y = y.clone();
    let mut sy = s.dot(&y);
    if sy < 0.2 * shs {
        let theta = 0.8 * shs / (shs - sy);
        y = &y * theta + &hs * (1.0 - theta);
        sy = s.dot(&y);
    }
    if !(sy > 0.0) {
        return;
    }

    let updated = &*h - (&hs * hs.transpose()) / shs + (&y * y.transpose()) / sy;
    if updated.iter().all(|v| v.is_finite()) {
        *h = updated;
    }
}
