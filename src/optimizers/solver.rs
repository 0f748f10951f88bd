//! # Budget Preserving NelderMead
//!
//! $$
//! \mathbf{w} = v\,\operatorname{softmax}(\mathbf{a}) - s\,\operatorname{softmax}(\mathbf{b})
//! $$
//!
//! The optimizers search an unconstrained parameter space mapped onto the
//! budget set. Target bounds enter the cost as penalties and are checked
//! again on the returned weights.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;
use ndarray::Array1;
use tracing::debug;
use tracing::warn;

use super::types::Budget;
use super::types::Deadline;
use super::types::SolverSettings;
use crate::error::OptimizationError;
use crate::error::Result;

const PENALTY: f64 = 1e4;
const FEASIBILITY_TOL: f64 = 1e-3;

fn softmax(x: &[f64]) -> Array1<f64> {
  if x.is_empty() {
    return Array1::zeros(0);
  }
  let max_x = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
  let exps: Array1<f64> = x.iter().map(|&v| (v - max_x).exp()).collect();
  let sum = exps.sum();
  if sum < 1e-15 || !sum.is_finite() {
    Array1::from_elem(x.len(), 1.0 / x.len() as f64)
  } else {
    exps / sum
  }
}

/// Map from `R^n` (long-only) or `R^{2n}` (long-short) onto the budget set.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Parameterisation {
  n: usize,
  budget: Budget,
}

impl Parameterisation {
  pub(crate) fn new(n: usize, budget: Budget) -> Self {
    Self { n, budget }
  }

  fn dim(&self) -> usize {
    if self.budget.is_long_only() {
      self.n
    } else {
      2 * self.n
    }
  }

  pub(crate) fn weights(&self, x: &[f64]) -> Array1<f64> {
    let long = softmax(&x[..self.n]) * self.budget.value;
    if self.budget.is_long_only() {
      long
    } else {
      long - softmax(&x[self.n..]) * self.budget.value_short
    }
  }

  /// Parameters reproducing the positive part of `w` on the long leg.
  fn encode(&self, w: &Array1<f64>) -> Vec<f64> {
    let mut x: Vec<f64> = w.iter().map(|&v| v.max(1e-12).ln()).collect();
    x.resize(self.dim(), 0.0);
    x
  }
}

struct RawCost<'a> {
  f: &'a dyn Fn(&[f64]) -> f64,
}

impl CostFunction for RawCost<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    let v = (self.f)(x);
    Ok(if v.is_finite() { v } else { f64::MAX })
  }
}

/// Minimise `f` from `x0`. Each restart rebuilds the simplex around the best
/// point with half the previous edge length.
pub(crate) fn nelder_mead(
  f: &dyn Fn(&[f64]) -> f64,
  x0: Vec<f64>,
  settings: &SolverSettings,
) -> Result<Vec<f64>> {
  let deadline = Deadline::new(settings.timeout);
  let mut best = x0;
  let mut step = 1.0;

  for run in 0..=settings.restarts {
    let mut simplex = Vec::with_capacity(best.len() + 1);
    simplex.push(best.clone());
    for i in 0..best.len() {
      let mut point = best.clone();
      point[i] += step;
      simplex.push(point);
    }

    let solver = NelderMead::new(simplex)
      .with_sd_tolerance(settings.sd_tolerance)
      .map_err(|e| OptimizationError::NotConverged(e.to_string()))?;
    let mut executor = Executor::new(RawCost { f }, solver)
      .configure(|state| state.max_iters(settings.max_iters));
    if let Some(remaining) = deadline.remaining() {
      executor = executor.timeout(remaining);
    }
    let res = executor
      .run()
      .map_err(|e| OptimizationError::NotConverged(e.to_string()))?;
    deadline.check()?;

    best = res
      .state
      .best_param
      .ok_or_else(|| OptimizationError::NotConverged("no iterate was evaluated".into()))?;
    debug!(run, step, cost = f(&best), "NelderMead run finished");
    step *= 0.5;
  }

  Ok(best)
}

/// Minimise `objective` over the budget set, optionally warm started at `start`.
pub(crate) fn minimise_weights(
  objective: &dyn Fn(&Array1<f64>) -> f64,
  param: Parameterisation,
  settings: &SolverSettings,
  start: Option<&Array1<f64>>,
) -> Result<Array1<f64>> {
  let x0 = match start {
    Some(w) => param.encode(&(w / param.budget.value)),
    None => vec![0.0; param.dim()],
  };
  let cost = |x: &[f64]| objective(&param.weights(x));
  let x = nelder_mead(&cost, x0, settings)?;
  Ok(param.weights(&x))
}

/// One-sided bound on a scalar portfolio statistic.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Bound {
  name: &'static str,
  limit: f64,
  upper: bool,
  scale: f64,
}

impl Bound {
  /// `value ≥ limit`; `scale` is the magnitude violations are measured against.
  pub(crate) fn lower(name: &'static str, limit: f64, scale: f64) -> Self {
    Self {
      name,
      limit,
      upper: false,
      scale: scale.abs().max(limit.abs()).max(1e-12),
    }
  }

  /// `value ≤ limit`.
  pub(crate) fn upper(name: &'static str, limit: f64, scale: f64) -> Self {
    Self {
      upper: true,
      ..Self::lower(name, limit, scale)
    }
  }

  fn violation(&self, value: f64) -> f64 {
    let v = if self.upper {
      value - self.limit
    } else {
      self.limit - value
    };
    if v.is_nan() {
      f64::INFINITY
    } else {
      v.max(0.0)
    }
  }

  pub(crate) fn penalty(&self, value: f64) -> f64 {
    let v = self.violation(value) / self.scale;
    PENALTY * (v + v * v)
  }

  pub(crate) fn check(&self, value: f64) -> Result<()> {
    let violation = self.violation(value);
    if violation > FEASIBILITY_TOL * self.scale {
      warn!(
        constraint = self.name,
        limit = self.limit,
        value,
        "optimizer found no solution"
      );
      return Err(
        OptimizationError::Infeasible {
          constraint: self.name,
          violation,
        }
        .into(),
      );
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use tracing_test::traced_test;

  use super::*;
  use crate::error::PortfolioError;

  #[test]
  fn parameterisation_preserves_budgets() {
    let long = Parameterisation::new(3, Budget::long_only(2.0));
    let w = long.weights(&[0.3, -1.0, 2.0]);
    assert_abs_diff_eq!(w.sum(), 2.0, epsilon = 1e-12);
    assert!(w.iter().all(|&v| v > 0.0));

    let pair = Parameterisation::new(
      2,
      Budget {
        value: 1.0,
        value_short: 0.4,
      },
    );
    let w = pair.weights(&[0.0, 1.0, 2.0, 0.0]);
    assert_abs_diff_eq!(w.sum(), 0.6, epsilon = 1e-12);
  }

  #[test]
  fn minimises_a_quadratic_on_the_simplex() {
    let target = array![0.2, 0.3, 0.5];
    let objective = |w: &Array1<f64>| (w - &target).mapv(|d| d * d).sum();
    let w = minimise_weights(
      &objective,
      Parameterisation::new(3, Budget::default()),
      &SolverSettings::default(),
      None,
    )
    .unwrap();
    assert_abs_diff_eq!(w, target, epsilon = 1e-4);
  }

  #[test]
  #[traced_test]
  fn violated_bounds_are_infeasible() {
    let floor = Bound::lower("target_return", 0.01, 0.01);
    assert!(floor.check(0.01).is_ok());
    assert!(floor.check(0.009_999_99).is_ok());
    assert_eq!(floor.penalty(0.02), 0.0);
    assert!(floor.penalty(0.005) > 0.0);
    assert!(matches!(
      floor.check(0.005),
      Err(PortfolioError::Optimization(OptimizationError::Infeasible {
        constraint: "target_return",
        ..
      }))
    ));
    assert!(logs_contain("optimizer found no solution"));

    let cap = Bound::upper("target_risk", 0.2, 0.2);
    assert!(cap.check(0.1).is_ok());
    assert!(cap.check(0.3).is_err());
  }
}
