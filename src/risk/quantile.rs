//! # Tail Risk
//!
//! $$
//! \mathrm{EVaR}_\alpha(x)=\inf_{z>0}\ z\ln\left(\frac{1}{\alpha T}\sum_{t=1}^T e^{-x_t/z}\right)
//! $$
//!
//! Quantile based measures on the empirical return distribution.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;

fn sorted(x: &[f64]) -> Vec<f64> {
  let mut s = x.to_vec();
  s.sort_by(f64::total_cmp);
  s
}

fn tail_index(t: usize, alpha: f64) -> usize {
  ((alpha * t as f64).ceil() as usize).clamp(1, t) - 1
}

fn cvar_sorted(s: &[f64], alpha: f64) -> f64 {
  let t = s.len();
  let k = tail_index(t, alpha);
  let var = s[k];
  let excess: f64 = s[..=k].iter().map(|v| v - var).sum();
  -var - excess / (alpha * t as f64)
}

/// Historical value at risk, `-x_(k)` with `k = ceil(αT) - 1`.
pub fn var(x: &[f64], alpha: f64) -> f64 {
  if x.is_empty() {
    return f64::NAN;
  }
  let s = sorted(x);
  -s[tail_index(s.len(), alpha)]
}

/// Historical conditional value at risk.
pub fn cvar(x: &[f64], alpha: f64) -> f64 {
  if x.is_empty() {
    return f64::NAN;
  }
  cvar_sorted(&sorted(x), alpha)
}

/// Worst realisation, `-min x`.
pub fn worst_realization(x: &[f64]) -> f64 {
  -x.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Range, `max x - min x`.
pub fn range(x: &[f64]) -> f64 {
  let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
  let min = x.iter().copied().fold(f64::INFINITY, f64::min);
  max - min
}

fn tail_levels(alpha: f64, a_sim: usize) -> Vec<f64> {
  const ALPHA_MIN: f64 = 1e-4;
  if a_sim <= 1 || alpha <= ALPHA_MIN {
    return vec![alpha];
  }
  let step = (alpha - ALPHA_MIN) / (a_sim - 1) as f64;
  (0..a_sim).map(|i| ALPHA_MIN + step * i as f64).collect()
}

/// Tail Gini: CVaR averaged over `a_sim` levels in `[1e-4, α]`, each level
/// weighted by its increment.
pub fn tail_gini(x: &[f64], alpha: f64, a_sim: usize) -> f64 {
  if x.is_empty() {
    return f64::NAN;
  }
  let s = sorted(x);
  let levels = tail_levels(alpha, a_sim);

  let mut prev = 0.0;
  let mut total = 0.0;
  let mut weight_sum = 0.0;
  for &a in &levels {
    let w = a - prev;
    total += w * cvar_sorted(&s, a);
    weight_sum += w;
    prev = a;
  }
  total / weight_sum
}

/// `CVaR_α(x) + CVaR_β(-x)`.
pub fn cvar_range(x: &[f64], alpha: f64, beta: f64) -> f64 {
  let neg: Vec<f64> = x.iter().map(|v| -v).collect();
  cvar(x, alpha) + cvar(&neg, beta)
}

/// `TG_α(x) + TG_β(-x)`.
pub fn tail_gini_range(x: &[f64], alpha: f64, a_sim: usize, beta: f64, b_sim: usize) -> f64 {
  let neg: Vec<f64> = x.iter().map(|v| -v).collect();
  tail_gini(x, alpha, a_sim) + tail_gini(&neg, beta, b_sim)
}

/// Entropic objective `z ln(mean(e^{-x/z}) / α)` parameterised by `u = ln z`.
#[derive(Clone)]
struct EntropicCost {
  x: Vec<f64>,
  log_alpha: f64,
}

impl EntropicCost {
  fn value(&self, z: f64) -> f64 {
    // log-sum-exp of -x/z
    let max = self
      .x
      .iter()
      .map(|v| -v / z)
      .fold(f64::NEG_INFINITY, f64::max);
    let sum: f64 = self.x.iter().map(|v| (-v / z - max).exp()).sum();
    let log_mean = max + sum.ln() - (self.x.len() as f64).ln();
    z * (log_mean - self.log_alpha)
  }
}

impl CostFunction for EntropicCost {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, u: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    let z = u[0].clamp(-60.0, 60.0).exp();
    let v = self.value(z);
    Ok(if v.is_finite() { v } else { f64::MAX })
  }
}

/// Entropic value at risk. Bounded above by the worst realisation, which is
/// its limit as `z → 0`.
pub fn evar(x: &[f64], alpha: f64) -> f64 {
  if x.is_empty() {
    return f64::NAN;
  }
  let worst = worst_realization(x);
  let spread = range(x);
  if spread <= 1e-14 {
    return worst;
  }

  let cost = EntropicCost {
    x: x.to_vec(),
    log_alpha: alpha.ln(),
  };
  let u0 = spread.ln();
  let mut best = worst;
  for start in [u0 - 2.0, u0 + 1.0] {
    let simplex = vec![vec![start], vec![start + 1.0]];
    let Ok(solver) = NelderMead::new(simplex).with_sd_tolerance(1e-14) else {
      continue;
    };
    let Ok(res) = Executor::new(cost.clone(), solver)
      .configure(|state| state.max_iters(500))
      .run()
    else {
      continue;
    };
    if let Some(u) = res.state.best_param {
      let v = cost.value(u[0].clamp(-60.0, 60.0).exp());
      if v.is_finite() {
        best = best.min(v);
      }
    }
  }
  best
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn grid() -> Vec<f64> {
    // -0.10, -0.09, ..., 0.09 in shuffled order
    let mut x: Vec<f64> = (0..20).map(|i| (i as f64 - 10.0) / 100.0).collect();
    x.swap(0, 13);
    x.swap(4, 18);
    x
  }

  #[test]
  fn var_and_cvar_pick_the_tail() {
    let x = grid();
    // T = 20, α = 0.1 -> k = 1
    assert_abs_diff_eq!(var(&x, 0.1), 0.09, epsilon = 1e-12);
    assert_abs_diff_eq!(cvar(&x, 0.1), 0.095, epsilon = 1e-12);
    assert!(cvar(&x, 0.1) >= var(&x, 0.1));
  }

  #[test]
  fn worst_case_and_range() {
    let x = grid();
    assert_abs_diff_eq!(worst_realization(&x), 0.10, epsilon = 1e-12);
    assert_abs_diff_eq!(range(&x), 0.19, epsilon = 1e-12);
  }

  #[test]
  fn evar_sits_between_cvar_and_worst_case() {
    let x = grid();
    let e = evar(&x, 0.1);
    assert!(e >= cvar(&x, 0.1) - 1e-9, "evar {e}");
    assert!(e <= worst_realization(&x) + 1e-12);
  }

  #[test]
  fn evar_of_constant_series_is_its_loss() {
    assert_abs_diff_eq!(evar(&[0.01; 5], 0.05), -0.01, epsilon = 1e-12);
  }

  #[test]
  fn tail_gini_lies_between_cvar_and_worst_case() {
    let x = grid();
    let tg = tail_gini(&x, 0.2, 50);
    assert!(tg >= cvar(&x, 0.2) - 1e-12);
    assert!(tg <= worst_realization(&x) + 1e-12);
    assert_abs_diff_eq!(tail_gini(&x, 0.2, 1), cvar(&x, 0.2), epsilon = 1e-12);
  }

  #[test]
  fn ranges_add_both_tails() {
    let x = grid();
    let neg: Vec<f64> = x.iter().map(|v| -v).collect();
    assert_abs_diff_eq!(cvar_range(&x, 0.1, 0.1), cvar(&x, 0.1) + cvar(&neg, 0.1), epsilon = 1e-12);
    assert!(tail_gini_range(&x, 0.1, 20, 0.1, 20) > 0.0);
  }
}
