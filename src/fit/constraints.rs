//! Domain-feasibility constraints in the canonical form `g(x) ≤ 0`.
//!
//! Each constraint evaluates its value and, on request, its analytic gradient
//! with respect to the model's free parameters. `x[0] = c` and `x[1] = m` for
//! every model form; gradient entries for further parameters are zeroed
//! unless the constraint depends on them.
//!
//! Outside the region where the expressions are defined the value is NaN.
//! The optimizer treats that as a rejected probe, so nothing here returns an error.

/// One inequality constraint together with its frozen coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DomainConstraint {
    /// `m - c ≤ 0`.
    Ordering,

    /// 2-parameter form: `t0 - ln((c + m)/(c - m)) / r ≤ 0`, i.e. `b ≥ 0`, with
    /// `r = 2 sqrt(-c m d2 / (c + m)) / (c - m)`.
    RatePositivity { t0: f64, d2: f64 },

    /// 3-parameter form: `d1 q ≤ 0` with `q = (c - m) θb - c - m`, which keeps
    /// `r = -d1 (θb² - 1) / q` positive.
    RateSign { d1: f64 },
}

impl DomainConstraint {
    pub fn name(&self) -> &'static str {
        match self {
            DomainConstraint::Ordering => "ordering",
            DomainConstraint::RatePositivity { .. } => "rate positivity",
            DomainConstraint::RateSign { .. } => "rate sign",
        }
    }

    /// Constraint value at `x`; writes the gradient when `grad` is given.
    pub fn eval(&self, x: &[f64], grad: Option<&mut [f64]>) -> f64 {
        let (c, m) = (x[0], x[1]);

        match *self {
            DomainConstraint::Ordering => {
                if let Some(g) = grad {
                    g.fill(0.0);
                    g[0] = -1.0;
                    g[1] = 1.0;
                }
                m - c
            }

            DomainConstraint::RatePositivity { t0, d2 } => {
                let sum = c + m;
                let diff = c - m;
                let s = (-c * m * d2 / sum).sqrt();
                let log_ratio = (sum / diff).ln();

                if let Some(g) = grad {
                    let ds2_dc = -d2 * m / sum + c * d2 * m / (sum * sum);
                    let ds2_dm = -d2 * c / sum + c * d2 * m / (sum * sum);
                    let s3 = s * s * s;

                    g.fill(0.0);
                    g[0] = m / (sum * s) - log_ratio / (2.0 * s)
                        + diff * log_ratio * ds2_dc / (4.0 * s3);
                    g[1] = log_ratio / (2.0 * s) - c / (sum * s)
                        + diff * log_ratio * ds2_dm / (4.0 * s3);
                }

                t0 - 0.5 * diff * log_ratio / s
            }

            DomainConstraint::RateSign { d1 } => {
                let theta_b = x[2];
                if let Some(g) = grad {
                    g[0] = d1 * (theta_b - 1.0);
                    g[1] = d1 * (-theta_b - 1.0);
                    g[2] = d1 * (c - m);
                }
                d1 * ((c - m) * theta_b - c - m)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_gradient(constraint: DomainConstraint, x: &[f64]) {
        let mut grad = vec![0.0; x.len()];
        constraint.eval(x, Some(&mut grad));

        for k in 0..x.len() {
            let step = 1e-6 * x[k].abs().max(1.0);
            let mut up = x.to_vec();
            let mut down = x.to_vec();
            up[k] += step;
            down[k] -= step;
            let fd = (constraint.eval(&up, None) - constraint.eval(&down, None)) / (2.0 * step);
            assert!(
                (grad[k] - fd).abs() <= 1e-6 * (1.0 + fd.abs()),
                "{}: k = {k}, analytic {} vs fd {fd}",
                constraint.name(),
                grad[k]
            );
        }
    }

    #[test]
    fn ordering_sign_follows_c_and_m() {
        let g = DomainConstraint::Ordering;
        for &(c, m) in &[(2.0, 1.0), (5.0, 5.0), (100.0, 1.0)] {
            assert!(g.eval(&[c, m], None) <= 0.0);
        }
        for &(c, m) in &[(1.0, 2.0), (1.0, 1.0 + 1e-9)] {
            assert!(g.eval(&[c, m], None) > 0.0);
        }

        let mut grad = [9.0; 3];
        g.eval(&[3.0, 1.0, 2.0], Some(&mut grad));
        assert_eq!(grad, [-1.0, 1.0, 0.0]);
    }

    #[test]
    fn rate_positivity_is_minus_offset() {
        // c = 10, m = 3, d2 = -20, t0 = 0.1: b = ln(13/7)/r - t0 > 0.
        let g = DomainConstraint::RatePositivity { t0: 0.1, d2: -20.0 };
        let s = (10.0_f64 * 3.0 * 20.0 / 13.0).sqrt();
        let r = 2.0 * s / 7.0;
        let b = (13.0_f64 / 7.0).ln() / r - 0.1;
        assert!((g.eval(&[10.0, 3.0], None) + b).abs() < 1e-12);
        assert!(g.eval(&[10.0, 3.0], None) < 0.0);

        let far = DomainConstraint::RatePositivity { t0: 5.0, d2: -20.0 };
        assert!(far.eval(&[10.0, 3.0], None) > 0.0);
    }

    #[test]
    fn rate_positivity_is_undefined_without_negative_curvature() {
        let g = DomainConstraint::RatePositivity { t0: 0.0, d2: 1.0 };
        assert!(g.eval(&[10.0, 3.0], None).is_nan());
    }

    #[test]
    fn analytic_gradients_match_finite_differences() {
        for &(t0, d2, c, m) in &[
            (0.0, -20.0, 10.0, 3.0),
            (0.02, -5000.0, 1500.0, 30.0),
            (1.0, -1.0, 33.0, 9.5),
        ] {
            check_gradient(DomainConstraint::RatePositivity { t0, d2 }, &[c, m]);
        }
        check_gradient(DomainConstraint::Ordering, &[4.0, 2.0]);
        check_gradient(DomainConstraint::RateSign { d1: -8.4 }, &[20.0, 2.0, 2.7]);
        check_gradient(DomainConstraint::RateSign { d1: 1.2 }, &[2.0, 1.0, 1.5]);
    }

    #[test]
    fn rate_sign_tracks_rate() {
        use crate::models::Bsm3;

        for model in [
            Bsm3::new(20.0, 2.0, 3.0, -8.0),
            Bsm3::new(2.0, 1.0, 1.5, 1.2),
            Bsm3::new(2.0, 1.0, 1.5, -1.2),
        ] {
            let g = DomainConstraint::RateSign { d1: model.d1 };
            let value = g.eval(&[model.c, model.m, model.theta_b], None);
            assert_eq!(value < 0.0, model.var_r() > 0.0);
        }
    }
}
