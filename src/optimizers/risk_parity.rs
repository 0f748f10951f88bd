//! # Risk Parity
//!
//! $$
//! \min_{\mathbf{y}}\ \mathcal{R}(e^{\mathbf{y}}) - \sum_i b_i y_i
//! \quad\Longrightarrow\quad w_i\,\partial_i\mathcal{R}(\mathbf{w}) = b_i
//! $$
//!
//! Risk budgeting portfolios. Variance budgeting without a return target
//! uses cyclical coordinate descent; every other case minimises the
//! log-barrier formulation. The relaxed variant trades exact parity for a
//! regularised volatility.

use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;

use super::solver;
use super::solver::Bound;
use super::solver::Parameterisation;
use super::types::Budget;
use super::types::Deadline;
use super::types::SolverSettings;
use super::types::Weights;
use crate::error::OptimizationError;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::moments::MomentEstimates;
use crate::returns::ReturnMatrix;
use crate::risk;
use crate::risk::RiskMeasure;
use crate::risk::RiskParams;

/// Risk budgeting problem. Weights are long-only and sum to `value`.
#[derive(Clone, Debug)]
pub struct RiskParityConfig {
  pub measure: RiskMeasure,
  pub risk_params: RiskParams,
  /// Relative risk budget per asset; `None` is the uniform budget.
  pub risk_cont: Option<Vec<f64>>,
  pub value: f64,
  /// Lower bound on the expected portfolio return, per period.
  pub target_return: Option<f64>,
  pub solver: SolverSettings,
}

impl Default for RiskParityConfig {
  fn default() -> Self {
    Self {
      measure: RiskMeasure::MV,
      risk_params: RiskParams::default(),
      risk_cont: None,
      value: 1.0,
      target_return: None,
      solver: SolverSettings::default(),
    }
  }
}

fn validate_common(
  risk_cont: Option<&[f64]>,
  value: f64,
  target_return: Option<f64>,
  solver: &SolverSettings,
) -> Result<()> {
  if let Some(b) = risk_cont {
    if b.is_empty() || b.iter().any(|v| !(v.is_finite() && *v > 0.0)) {
      return Err(PortfolioError::invalid(
        "risk_cont entries must be finite and positive",
      ));
    }
  }
  Budget::long_only(value).validate()?;
  if target_return.is_some_and(|t| !t.is_finite()) {
    return Err(PortfolioError::invalid("target_return must be finite"));
  }
  solver.validate()
}

impl RiskParityConfig {
  pub fn validate(&self) -> Result<()> {
    if !self.measure.supports_risk_parity() {
      return Err(PortfolioError::invalid(format!(
        "{} does not admit a risk budgeting formulation",
        self.measure
      )));
    }
    self.risk_params.validate()?;
    validate_common(
      self.risk_cont.as_deref(),
      self.value,
      self.target_return,
      &self.solver,
    )
  }
}

/// Normalised risk budget of length `n`.
fn budget_vector(risk_cont: Option<&[f64]>, n: usize) -> Result<Array1<f64>> {
  let b = match risk_cont {
    Some(b) if b.len() != n => {
      return Err(PortfolioError::invalid(format!(
        "risk_cont has {} entries for {n} assets",
        b.len()
      )))
    }
    Some(b) => Array1::from_vec(b.to_vec()),
    None => Array1::from_elem(n, 1.0),
  };
  let total = b.sum();
  Ok(b / total)
}

fn inverse_volatility(cov: &Array2<f64>) -> Result<Array1<f64>> {
  let n = cov.nrows();
  if (0..n).any(|i| !(cov[[i, i]] > 0.0)) {
    return Err(OptimizationError::SingularCovariance.into());
  }
  let w: Array1<f64> = (0..n).map(|i| 1.0 / cov[[i, i]].sqrt()).collect();
  let total = w.sum();
  Ok(w / total)
}

/// Cyclical coordinate descent on `w_i (Σw)_i = b_i σ(w)`.
fn coordinate_descent(
  cov: &Array2<f64>,
  b: &Array1<f64>,
  settings: &SolverSettings,
) -> Result<Array1<f64>> {
  let n = b.len();
  let deadline = Deadline::new(settings.timeout);
  let mut w = inverse_volatility(cov)?;

  for iter in 0..settings.max_iters {
    let mut delta = 0.0f64;
    for i in 0..n {
      let sigma = w.dot(&cov.dot(&w)).max(0.0).sqrt();
      let a = cov[[i, i]];
      let c = cov.row(i).dot(&w) - a * w[i];
      let next = (-c + (c * c + 4.0 * a * b[i] * sigma).sqrt()) / (2.0 * a);
      delta = delta.max((next - w[i]).abs());
      w[i] = next;
    }
    let scale = w.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    if delta <= 1e-12 * scale {
      debug!(iterations = iter + 1, "risk parity coordinate descent converged");
      let total = w.sum();
      return Ok(w / total);
    }
    deadline.check()?;
  }
  Err(
    OptimizationError::NotConverged(format!(
      "coordinate descent stopped after {} iterations",
      settings.max_iters
    ))
    .into(),
  )
}

/// Log-barrier risk budgeting for any supported measure.
fn log_barrier(
  returns: &Array2<f64>,
  mean: &Array1<f64>,
  cov: &Array2<f64>,
  b: &Array1<f64>,
  config: &RiskParityConfig,
) -> Result<Array1<f64>> {
  let (measure, params) = (config.measure, &config.risk_params);
  let start = inverse_volatility(cov)?;
  let r0 = risk::risk_linear(&start, cov, returns, measure, params)?;
  if !(r0 > 0.0) {
    return Err(PortfolioError::degenerate(
      measure,
      "non-positive risk at the starting portfolio",
    ));
  }
  // scaled so that R(w) = 1 at the start, where the optimum lives
  let y0: Vec<f64> = start.iter().map(|w| (w / r0).ln()).collect();

  let mean_scale = mean.iter().fold(0.0f64, |m, v| m.max(v.abs()));
  let return_bound = config
    .target_return
    .map(|t| Bound::lower("target_return", t, mean_scale));
  let cost = |y: &[f64]| {
    let w: Array1<f64> = y.iter().map(|v| v.exp()).collect();
    let r = risk::risk_linear(&w, cov, returns, measure, params).unwrap_or(f64::MAX);
    let barrier: f64 = b.iter().zip(y).map(|(bi, yi)| bi * yi).sum();
    let penalty = return_bound.map_or(0.0, |bound| bound.penalty(mean.dot(&w) / w.sum()));
    r - barrier + penalty
  };
  let y = solver::nelder_mead(&cost, y0, &config.solver)?;
  let w: Array1<f64> = y.iter().map(|v| v.exp()).collect();
  let total = w.sum();
  Ok(w / total)
}

/// Solve on raw arrays; weights sum to one.
pub(crate) fn solve(
  returns: &Array2<f64>,
  mean: &Array1<f64>,
  cov: &Array2<f64>,
  config: &RiskParityConfig,
) -> Result<Array1<f64>> {
  let n = mean.len();
  if n < 2 {
    return Err(PortfolioError::insufficient(
      "risk parity needs at least 2 assets",
    ));
  }
  let b = budget_vector(config.risk_cont.as_deref(), n)?;
  let w = if config.measure == RiskMeasure::MV && config.target_return.is_none() {
    coordinate_descent(cov, &b, &config.solver)?
  } else {
    log_barrier(returns, mean, cov, &b, config)?
  };
  if let Some(t) = config.target_return {
    let mean_scale = mean.iter().fold(0.0f64, |m, v| m.max(v.abs()));
    Bound::lower("target_return", t, mean_scale).check(mean.dot(&w))?;
  }
  Ok(w)
}

/// Risk budgeting portfolio of `returns`.
pub fn risk_parity(
  returns: &ReturnMatrix,
  moments: &MomentEstimates,
  config: &RiskParityConfig,
) -> Result<Weights> {
  config.validate()?;
  let w = solve(returns.values(), &moments.mean, &moments.cov, config)?;
  debug!(measure = %config.measure, "risk parity portfolio solved");
  Ok(Weights::new(returns.symbols(), &(w * config.value)))
}

/// Regularisation of the relaxed risk parity volatility term.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RrpVersion {
  /// No regularisation.
  #[default]
  A,
  /// `ψ² ≥ wᵀΣw + wᵀΘw`.
  B,
  /// `ψ² ≥ wᵀΣw + l·wᵀΘw`.
  C,
}

impl fmt::Display for RrpVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      RrpVersion::A => "A",
      RrpVersion::B => "B",
      RrpVersion::C => "C",
    })
  }
}

impl FromStr for RrpVersion {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_uppercase().as_str() {
      "A" => Ok(Self::A),
      "B" => Ok(Self::B),
      "C" => Ok(Self::C),
      other => Err(PortfolioError::invalid(format!(
        "unknown relaxed risk parity version '{other}'"
      ))),
    }
  }
}

/// Relaxed risk parity on the covariance matrix.
#[derive(Clone, Debug)]
pub struct RelaxedRiskParityConfig {
  pub version: RrpVersion,
  /// Penalty `l` of version C.
  pub l: f64,
  pub risk_cont: Option<Vec<f64>>,
  pub value: f64,
  pub target_return: Option<f64>,
  pub solver: SolverSettings,
}

impl Default for RelaxedRiskParityConfig {
  fn default() -> Self {
    Self {
      version: RrpVersion::A,
      l: 1.0,
      risk_cont: None,
      value: 1.0,
      target_return: None,
      solver: SolverSettings::default(),
    }
  }
}

impl RelaxedRiskParityConfig {
  pub fn validate(&self) -> Result<()> {
    if !(self.l.is_finite() && self.l >= 0.0) {
      return Err(PortfolioError::invalid("l must be non-negative"));
    }
    validate_common(
      self.risk_cont.as_deref(),
      self.value,
      self.target_return,
      &self.solver,
    )
  }
}

/// Solve on raw arrays; weights sum to one.
pub(crate) fn solve_relaxed(
  mean: &Array1<f64>,
  cov: &Array2<f64>,
  config: &RelaxedRiskParityConfig,
) -> Result<Array1<f64>> {
  let n = mean.len();
  if n < 2 {
    return Err(PortfolioError::insufficient(
      "relaxed risk parity needs at least 2 assets",
    ));
  }
  let b = budget_vector(config.risk_cont.as_deref(), n)?;
  let theta = Array1::from_shape_fn(n, |i| cov[[i, i]]);
  let reg = match config.version {
    RrpVersion::A => 0.0,
    RrpVersion::B => 1.0,
    RrpVersion::C => config.l,
  };

  let mean_scale = mean.iter().fold(0.0f64, |m, v| m.max(v.abs()));
  let return_bound = config
    .target_return
    .map(|t| Bound::lower("target_return", t, mean_scale));
  let cost = |w: &Array1<f64>| {
    let sigma_w = cov.dot(w);
    let psi = (w.dot(&sigma_w) + reg * (w * w).dot(&theta)).max(0.0).sqrt();
    let gamma = (0..n)
      .map(|i| w[i] * sigma_w[i] / b[i])
      .fold(f64::INFINITY, f64::min)
      .max(0.0)
      .sqrt();
    psi - gamma + return_bound.map_or(0.0, |bound| bound.penalty(mean.dot(w)))
  };
  let start = inverse_volatility(cov)?;
  let w = solver::minimise_weights(
    &cost,
    Parameterisation::new(n, Budget::default()),
    &config.solver,
    Some(&start),
  )?;
  if let Some(bound) = return_bound {
    bound.check(mean.dot(&w))?;
  }
  Ok(w)
}

/// Relaxed risk parity portfolio of `returns`.
pub fn relaxed_risk_parity(
  returns: &ReturnMatrix,
  moments: &MomentEstimates,
  config: &RelaxedRiskParityConfig,
) -> Result<Weights> {
  config.validate()?;
  let w = solve_relaxed(&moments.mean, &moments.cov, config)?;
  debug!(version = %config.version, "relaxed risk parity portfolio solved");
  Ok(Weights::new(returns.symbols(), &(w * config.value)))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;
  use crate::optimizers::fixtures::three_assets;
  use crate::risk::risk_contributions;

  fn fixed_moments(cov: Array2<f64>) -> (ReturnMatrix, MomentEstimates) {
    let n = cov.nrows();
    let symbols: Vec<String> = (0..n).map(|i| format!("S{i}")).collect();
    let returns = ReturnMatrix::from_array(&symbols, Array2::zeros((3, n))).unwrap();
    let moments = MomentEstimates {
      mean: Array1::zeros(n),
      cov,
    };
    (returns, moments)
  }

  #[test]
  fn two_uncorrelated_assets_get_inverse_volatility() {
    let (returns, moments) = fixed_moments(array![[1.0, 0.0], [0.0, 4.0]]);
    let w = risk_parity(&returns, &moments, &RiskParityConfig::default()).unwrap();
    assert_abs_diff_eq!(w.get("S0").unwrap(), 2.0 / 3.0, epsilon = 1e-9);
    assert_abs_diff_eq!(w.get("S1").unwrap(), 1.0 / 3.0, epsilon = 1e-9);
  }

  #[test]
  fn variance_contributions_are_equal() {
    let cov = array![[0.04, 0.006, 0.002], [0.006, 0.09, 0.01], [0.002, 0.01, 0.02]];
    let (returns, moments) = fixed_moments(cov.clone());
    let w = risk_parity(&returns, &moments, &RiskParityConfig::default())
      .unwrap()
      .to_array();
    let rc = risk_contributions(&w, &cov, returns.values(), RiskMeasure::MV, &RiskParams::default())
      .unwrap();
    let avg = rc.sum() / 3.0;
    for c in rc.iter() {
      assert!((c / avg - 1.0).abs() < 0.01, "{rc}");
    }
  }

  #[test]
  fn custom_budget_is_matched() {
    let cov = array![[0.04, 0.006, 0.002], [0.006, 0.09, 0.01], [0.002, 0.01, 0.02]];
    let (returns, moments) = fixed_moments(cov.clone());
    let config = RiskParityConfig {
      risk_cont: Some(vec![1.0, 2.0, 1.0]),
      ..Default::default()
    };
    let w = risk_parity(&returns, &moments, &config).unwrap().to_array();
    let rc = risk_contributions(&w, &cov, returns.values(), RiskMeasure::MV, &RiskParams::default())
      .unwrap();
    let share = &rc / rc.sum();
    assert_abs_diff_eq!(share, array![0.25, 0.5, 0.25], epsilon = 1e-6);
  }

  #[test]
  fn log_barrier_path_equalises_contributions() {
    let (returns, moments) = three_assets();
    // a non-binding target routes variance budgeting through the barrier solver
    let config = RiskParityConfig {
      target_return: Some(-1.0),
      ..Default::default()
    };
    let w = risk_parity(&returns, &moments, &config).unwrap().to_array();
    let rc = risk_contributions(
      &w,
      &moments.cov,
      returns.values(),
      RiskMeasure::MV,
      &RiskParams::default(),
    )
    .unwrap();
    let avg = rc.sum() / 3.0;
    for c in rc.iter() {
      assert!((c / avg - 1.0).abs() < 0.01, "{rc}");
    }
  }

  #[test]
  fn supported_measures_give_long_only_budgets() {
    let (returns, moments) = three_assets();
    for measure in [RiskMeasure::MAD, RiskMeasure::CVaR, RiskMeasure::CDaR, RiskMeasure::UCI] {
      let config = RiskParityConfig {
        measure,
        value: 2.0,
        ..Default::default()
      };
      let w = risk_parity(&returns, &moments, &config).unwrap();
      assert_abs_diff_eq!(w.sum(), 2.0, epsilon = 1e-9);
      assert!(w.iter().all(|(_, v)| v > 0.0), "{measure}");
    }
  }

  #[test]
  fn quantile_measures_and_single_assets_are_rejected() {
    let (returns, moments) = three_assets();
    for measure in [RiskMeasure::VaR, RiskMeasure::WR, RiskMeasure::MDD, RiskMeasure::DaRRel] {
      let config = RiskParityConfig {
        measure,
        ..Default::default()
      };
      assert!(matches!(
        risk_parity(&returns, &moments, &config),
        Err(PortfolioError::InvalidParameter(_))
      ));
    }
    assert!(matches!(
      risk_parity(&returns.select(&[1]), &moments.select(&[1]), &RiskParityConfig::default()),
      Err(PortfolioError::InsufficientData(_))
    ));
  }

  #[test]
  fn relaxed_version_a_is_close_to_equal_risk_contribution() {
    let cov = array![[0.04, 0.006, 0.002], [0.006, 0.09, 0.01], [0.002, 0.01, 0.02]];
    let (returns, moments) = fixed_moments(cov);
    let exact = risk_parity(&returns, &moments, &RiskParityConfig::default())
      .unwrap()
      .to_array();
    let relaxed = relaxed_risk_parity(&returns, &moments, &RelaxedRiskParityConfig::default())
      .unwrap()
      .to_array();
    assert_abs_diff_eq!(relaxed, exact, epsilon = 2e-2);
  }

  #[test]
  fn relaxed_versions_sum_to_value() {
    let (returns, moments) = three_assets();
    for version in ["a", "B", "c"] {
      let config = RelaxedRiskParityConfig {
        version: version.parse().unwrap(),
        l: 2.0,
        value: 0.5,
        ..Default::default()
      };
      let w = relaxed_risk_parity(&returns, &moments, &config).unwrap();
      assert_abs_diff_eq!(w.sum(), 0.5, epsilon = 1e-9);
      assert!(w.iter().all(|(_, v)| v >= 0.0));
    }
    assert!("D".parse::<RrpVersion>().is_err());
  }
}
