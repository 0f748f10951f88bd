//! # Mean-Risk
//!
//! $$
//! \max_{\mathbf{w}}\ f(\mu^\top\mathbf{w}, \mathcal{R}(\mathbf{w}))
//! \quad\text{s.t.}\quad \mu^\top\mathbf{w}\ge r^\*,\ \mathcal{R}(\mathbf{w})\le \rho^\*
//! $$
//!
//! Minimum risk, utility, Sharpe ratio and maximum return portfolios under
//! any of the supported risk measures.

use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;

use super::solver;
use super::solver::Bound;
use super::solver::Parameterisation;
use super::types::Budget;
use super::types::Objective;
use super::types::SolverSettings;
use super::types::Weights;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::moments::MomentEstimates;
use crate::returns::ReturnMatrix;
use crate::risk;
use crate::risk::RiskMeasure;
use crate::risk::RiskParams;

/// Mean-Risk problem definition. Rates and targets are per period.
#[derive(Clone, Debug)]
pub struct MeanRiskConfig {
  pub measure: RiskMeasure,
  pub objective: Objective,
  pub risk_params: RiskParams,
  /// `λ` of the utility objective.
  pub risk_aversion: f64,
  pub risk_free: f64,
  pub budget: Budget,
  /// Lower bound on the expected portfolio return.
  pub target_return: Option<f64>,
  /// Upper bound on the risk; the standard deviation for `MV`.
  pub target_risk: Option<f64>,
  pub solver: SolverSettings,
}

impl Default for MeanRiskConfig {
  fn default() -> Self {
    Self {
      measure: RiskMeasure::MV,
      objective: Objective::MinRisk,
      risk_params: RiskParams::default(),
      risk_aversion: 1.0,
      risk_free: 0.0,
      budget: Budget::default(),
      target_return: None,
      target_risk: None,
      solver: SolverSettings::default(),
    }
  }
}

impl MeanRiskConfig {
  pub fn validate(&self) -> Result<()> {
    if self.objective == Objective::Erc {
      return Err(PortfolioError::invalid(
        "ERC is not a Mean-Risk objective, use risk parity",
      ));
    }
    if !(self.risk_aversion.is_finite() && self.risk_aversion >= 0.0) {
      return Err(PortfolioError::invalid("risk_aversion must be non-negative"));
    }
    if !self.risk_free.is_finite() {
      return Err(PortfolioError::invalid("risk_free must be finite"));
    }
    if self.target_return.is_some_and(|t| !t.is_finite()) {
      return Err(PortfolioError::invalid("target_return must be finite"));
    }
    if self.target_risk.is_some_and(|t| !(t.is_finite() && t > 0.0)) {
      return Err(PortfolioError::invalid("target_risk must be positive"));
    }
    self.risk_params.validate()?;
    self.budget.validate()?;
    self.solver.validate()
  }
}

/// Risk used by the objective: variance for `MV` under MinRisk and Utility,
/// the degree-one risk otherwise.
fn objective_risk(
  w: &Array1<f64>,
  cov: &Array2<f64>,
  returns: &Array2<f64>,
  config: &MeanRiskConfig,
) -> f64 {
  let value = match config.objective {
    Objective::MinRisk | Objective::Utility => {
      risk::risk(w, cov, returns, config.measure, &config.risk_params)
    }
    _ => risk::risk_linear(w, cov, returns, config.measure, &config.risk_params),
  };
  value.unwrap_or(f64::MAX)
}

fn max_return_closed_form(mean: &Array1<f64>, budget: Budget) -> Array1<f64> {
  let argmax = |sign: f64| {
    mean
      .iter()
      .enumerate()
      .fold((0, f64::NEG_INFINITY), |best, (i, &m)| {
        if sign * m > best.1 {
          (i, sign * m)
        } else {
          best
        }
      })
      .0
  };
  let mut w = Array1::zeros(mean.len());
  w[argmax(1.0)] += budget.value;
  if !budget.is_long_only() {
    w[argmax(-1.0)] -= budget.value_short;
  }
  w
}

/// Solve on raw arrays; used directly by the nested optimizers.
pub(crate) fn solve(
  returns: &Array2<f64>,
  mean: &Array1<f64>,
  cov: &Array2<f64>,
  config: &MeanRiskConfig,
) -> Result<Array1<f64>> {
  let n = mean.len();
  if n < 2 {
    return Err(PortfolioError::insufficient(
      "Mean-Risk optimization needs at least 2 assets",
    ));
  }

  let mean_scale = mean.iter().fold(0.0f64, |m, v| m.max(v.abs()));
  let return_bound = config
    .target_return
    .map(|t| Bound::lower("target_return", t, mean_scale));
  let risk_bound = config
    .target_risk
    .map(|t| Bound::upper("target_risk", t, t));
  let linear_risk = |w: &Array1<f64>| {
    risk::risk_linear(w, cov, returns, config.measure, &config.risk_params).unwrap_or(f64::MAX)
  };

  let w = if config.objective == Objective::MaxRet && config.target_risk.is_none() {
    max_return_closed_form(mean, config.budget)
  } else {
    let cost = |w: &Array1<f64>| {
      let mu = mean.dot(w);
      let base = match config.objective {
        Objective::MinRisk => objective_risk(w, cov, returns, config),
        Objective::Utility => -mu + config.risk_aversion * objective_risk(w, cov, returns, config),
        Objective::Sharpe => {
          -(mu - config.risk_free) / objective_risk(w, cov, returns, config).max(1e-12)
        }
        Objective::MaxRet | Objective::Erc => -mu,
      };
      base
        + return_bound.map_or(0.0, |b| b.penalty(mu))
        + risk_bound.map_or(0.0, |b| b.penalty(linear_risk(w)))
    };
    solver::minimise_weights(
      &cost,
      Parameterisation::new(n, config.budget),
      &config.solver,
      None,
    )?
  };

  if let Some(b) = return_bound {
    b.check(mean.dot(&w))?;
  }
  if let Some(b) = risk_bound {
    b.check(linear_risk(&w))?;
  }
  debug!(
    measure = %config.measure,
    objective = %config.objective,
    "Mean-Risk portfolio solved"
  );
  Ok(w)
}

/// Mean-Risk portfolio of `returns` given estimated `moments`.
pub fn mean_risk(
  returns: &ReturnMatrix,
  moments: &MomentEstimates,
  config: &MeanRiskConfig,
) -> Result<Weights> {
  config.validate()?;
  let w = solve(returns.values(), &moments.mean, &moments.cov, config)?;
  Ok(Weights::new(returns.symbols(), &w))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;
  use crate::error::OptimizationError;
  use crate::moments::MomentConfig;
  use crate::optimizers::fixtures::three_assets;

  #[test]
  fn min_variance_with_perfectly_anticorrelated_assets_is_interior() {
    let x = array![0.01, -0.02, 0.015, 0.0, -0.005, 0.012, -0.008];
    let mut values = Array2::zeros((7, 2));
    values.column_mut(0).assign(&x);
    values.column_mut(1).assign(&(-&x));
    let returns = ReturnMatrix::from_array(&["A", "B"], values).unwrap();
    let moments = MomentEstimates::estimate(returns.values(), &MomentConfig::default()).unwrap();
    let w = mean_risk(&returns, &moments, &MeanRiskConfig::default()).unwrap();
    let a = w.get("A").unwrap();
    let b = w.get("B").unwrap();
    assert!(a > 0.0 && b > 0.0);
    assert_abs_diff_eq!(a, 0.5, epsilon = 1e-3);
    assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-9);
  }

  #[test]
  fn long_only_results_respect_the_budget_for_every_objective() {
    let (returns, moments) = three_assets();
    for objective in [Objective::MinRisk, Objective::Utility, Objective::Sharpe, Objective::MaxRet] {
      for measure in [RiskMeasure::MV, RiskMeasure::CVaR, RiskMeasure::MAD, RiskMeasure::CDaR] {
        let config = MeanRiskConfig {
          measure,
          objective,
          ..Default::default()
        };
        let w = mean_risk(&returns, &moments, &config).unwrap();
        assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-6);
        assert!(w.iter().all(|(_, v)| v >= 0.0), "{objective} {measure}");
      }
    }
  }

  #[test]
  fn min_risk_beats_equal_weight() {
    let (returns, moments) = three_assets();
    let w = mean_risk(&returns, &moments, &MeanRiskConfig::default())
      .unwrap()
      .to_array();
    let equal = Array1::from_elem(3, 1.0 / 3.0);
    let risk_of = |w: &Array1<f64>| w.dot(&moments.cov.dot(w));
    assert!(risk_of(&w) <= risk_of(&equal) + 1e-15);
  }

  #[test]
  fn max_sharpe_beats_equal_weight() {
    let (returns, moments) = three_assets();
    let config = MeanRiskConfig {
      objective: Objective::Sharpe,
      ..Default::default()
    };
    let w = mean_risk(&returns, &moments, &config).unwrap().to_array();
    let sharpe = |w: &Array1<f64>| moments.mean.dot(w) / w.dot(&moments.cov.dot(w)).sqrt();
    assert!(sharpe(&w) >= sharpe(&Array1::from_elem(3, 1.0 / 3.0)) - 1e-9);
  }

  #[test]
  fn max_return_without_risk_cap_is_a_corner() {
    let (returns, moments) = three_assets();
    let config = MeanRiskConfig {
      objective: Objective::MaxRet,
      ..Default::default()
    };
    let w = mean_risk(&returns, &moments, &config).unwrap();
    let best = moments
      .mean
      .iter()
      .enumerate()
      .fold((0, f64::NEG_INFINITY), |b, (i, &m)| if m > b.1 { (i, m) } else { b })
      .0;
    assert_eq!(w.to_array()[best], 1.0);
  }

  #[test]
  fn target_return_is_met() {
    let (returns, moments) = three_assets();
    let lo = moments.mean.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = moments.mean.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let target = lo + 0.7 * (hi - lo);
    let config = MeanRiskConfig {
      target_return: Some(target),
      ..Default::default()
    };
    let w = mean_risk(&returns, &moments, &config).unwrap().to_array();
    assert!(moments.mean.dot(&w) >= target - 1e-3 * target.abs().max(hi.abs()));
  }

  #[test]
  fn unreachable_target_is_infeasible() {
    let (returns, moments) = three_assets();
    let hi = moments.mean.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let config = MeanRiskConfig {
      target_return: Some(2.0 * hi.abs() + 0.01),
      ..Default::default()
    };
    let err = mean_risk(&returns, &moments, &config).unwrap_err();
    assert!(matches!(
      err,
      PortfolioError::Optimization(OptimizationError::Infeasible { .. })
    ));
    assert!(err.is_no_solution());
  }

  #[test]
  fn long_short_budget_nets_out() {
    let (returns, moments) = three_assets();
    let config = MeanRiskConfig {
      objective: Objective::Utility,
      budget: Budget {
        value: 1.0,
        value_short: 0.3,
      },
      ..Default::default()
    };
    let w = mean_risk(&returns, &moments, &config).unwrap();
    assert_abs_diff_eq!(w.sum(), 0.7, epsilon = 1e-9);
    assert!(w.long_sum() <= 1.0 + 1e-9);
  }

  #[test]
  fn repeated_runs_are_identical() {
    let (returns, moments) = three_assets();
    let config = MeanRiskConfig {
      measure: RiskMeasure::CVaR,
      ..Default::default()
    };
    let a = mean_risk(&returns, &moments, &config).unwrap();
    let b = mean_risk(&returns, &moments, &config).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn single_asset_and_erc_are_rejected() {
    let (returns, moments) = three_assets();
    let one = returns.select(&[0]);
    let sub = moments.select(&[0]);
    assert!(matches!(
      mean_risk(&one, &sub, &MeanRiskConfig::default()),
      Err(PortfolioError::InsufficientData(_))
    ));
    let config = MeanRiskConfig {
      objective: Objective::Erc,
      ..Default::default()
    };
    assert!(matches!(
      mean_risk(&returns, &moments, &config),
      Err(PortfolioError::InvalidParameter(_))
    ));
  }
}
