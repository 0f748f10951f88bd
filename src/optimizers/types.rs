//! # Portfolio Types
//!
//! $$
//! \sum_i w_i = v - s,\qquad \sum_{w_i>0} w_i \le v
//! $$
//!
//! Shared enums, budgets, solver settings and result containers.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use std::time::Instant;

use ndarray::Array1;

use crate::error::OptimizationError;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::moments::MomentEstimates;
use crate::returns::AssetUniverse;
use crate::returns::ReturnMatrix;

/// Ordered `(symbol, weight)` allocation.
#[derive(Clone, Debug, PartialEq)]
pub struct Weights {
  entries: Vec<(String, f64)>,
}

impl Weights {
  pub(crate) fn new(symbols: &[String], values: &Array1<f64>) -> Self {
    Self {
      entries: symbols.iter().cloned().zip(values.iter().copied()).collect(),
    }
  }

  pub fn get(&self, symbol: &str) -> Option<f64> {
    self
      .entries
      .iter()
      .find(|(s, _)| s == symbol)
      .map(|&(_, w)| w)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
    self.entries.iter().map(|(s, w)| (s.as_str(), *w))
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn sum(&self) -> f64 {
    self.entries.iter().map(|(_, w)| w).sum()
  }

  pub fn long_sum(&self) -> f64 {
    self.entries.iter().map(|(_, w)| w.max(0.0)).sum()
  }

  /// Gross short exposure as a non-negative number.
  pub fn short_sum(&self) -> f64 {
    self.entries.iter().map(|(_, w)| (-w).max(0.0)).sum()
  }

  pub fn to_array(&self) -> Array1<f64> {
    self.entries.iter().map(|(_, w)| *w).collect()
  }
}

/// Long and short budgets. `value_short = 0` means long-only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Budget {
  pub value: f64,
  pub value_short: f64,
}

impl Default for Budget {
  fn default() -> Self {
    Self {
      value: 1.0,
      value_short: 0.0,
    }
  }
}

impl Budget {
  pub fn long_only(value: f64) -> Self {
    Self {
      value,
      value_short: 0.0,
    }
  }

  pub fn is_long_only(&self) -> bool {
    self.value_short == 0.0
  }

  /// Net exposure `value - value_short`.
  pub fn net(&self) -> f64 {
    self.value - self.value_short
  }

  pub fn validate(&self) -> Result<()> {
    if !(self.value.is_finite() && self.value > 0.0) {
      return Err(PortfolioError::invalid(format!(
        "value must be positive, got {}",
        self.value
      )));
    }
    if !(self.value_short.is_finite() && self.value_short >= 0.0) {
      return Err(PortfolioError::invalid(format!(
        "value_short must be non-negative, got {}",
        self.value_short
      )));
    }
    Ok(())
  }
}

/// Objective of the Mean-Risk family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Objective {
  #[default]
  MinRisk,
  /// `μᵀw − λ·risk`.
  Utility,
  /// `(μᵀw − rf) / risk`.
  Sharpe,
  MaxRet,
  /// Equal risk contribution; only accepted by nested clustered optimization.
  Erc,
}

impl Objective {
  pub const fn tag(self) -> &'static str {
    match self {
      Objective::MinRisk => "MinRisk",
      Objective::Utility => "Utility",
      Objective::Sharpe => "Sharpe",
      Objective::MaxRet => "MaxRet",
      Objective::Erc => "ERC",
    }
  }
}

impl fmt::Display for Objective {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.tag())
  }
}

impl FromStr for Objective {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    let s = s.trim();
    [
      Objective::MinRisk,
      Objective::Utility,
      Objective::Sharpe,
      Objective::MaxRet,
      Objective::Erc,
    ]
    .into_iter()
    .find(|o| o.tag().eq_ignore_ascii_case(s))
    .ok_or_else(|| PortfolioError::invalid(format!("unknown objective '{s}'")))
  }
}

/// NelderMead budget shared by the numerical optimizers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverSettings {
  pub max_iters: u64,
  /// Extra runs started from the previous best point with a smaller simplex.
  pub restarts: usize,
  pub sd_tolerance: f64,
  /// Wall-clock budget of one optimizer call.
  pub timeout: Option<Duration>,
}

impl Default for SolverSettings {
  fn default() -> Self {
    Self {
      max_iters: 3000,
      restarts: 3,
      sd_tolerance: 1e-12,
      timeout: None,
    }
  }
}

impl SolverSettings {
  pub fn validate(&self) -> Result<()> {
    if self.max_iters == 0 {
      return Err(PortfolioError::invalid("max_iters must be positive"));
    }
    if !(self.sd_tolerance.is_finite() && self.sd_tolerance > 0.0) {
      return Err(PortfolioError::invalid("sd_tolerance must be positive"));
    }
    if self.timeout.is_some_and(|t| t.is_zero()) {
      return Err(PortfolioError::invalid("timeout must be positive"));
    }
    Ok(())
  }
}

/// Wall-clock limit checked between the stages of an optimizer call.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Deadline {
  started: Instant,
  limit: Option<Duration>,
}

impl Deadline {
  pub(crate) fn new(limit: Option<Duration>) -> Self {
    Self {
      started: Instant::now(),
      limit,
    }
  }

  pub(crate) fn remaining(&self) -> Option<Duration> {
    self
      .limit
      .map(|limit| limit.saturating_sub(self.started.elapsed()))
  }

  pub(crate) fn check(&self) -> Result<()> {
    match self.limit {
      Some(limit) if self.started.elapsed() >= limit => {
        Err(OptimizationError::Timeout(limit).into())
      }
      _ => Ok(()),
    }
  }
}

/// Construction algorithm that produced a [`Portfolio`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
  EqualWeight,
  PropertyWeight,
  MeanRisk,
  RiskParity,
  RelaxedRiskParity,
  Hrp,
  Herc,
  Nco,
  BlackLitterman,
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Method::EqualWeight => "Equal Weight",
      Method::PropertyWeight => "Property Weight",
      Method::MeanRisk => "Mean-Risk",
      Method::RiskParity => "Risk Parity",
      Method::RelaxedRiskParity => "Relaxed Risk Parity",
      Method::Hrp => "HRP",
      Method::Herc => "HERC",
      Method::Nco => "NCO",
      Method::BlackLitterman => "Black-Litterman",
    })
  }
}

/// Result of a construction call together with the data it was built on.
#[derive(Clone, Debug)]
pub struct Portfolio {
  universe: AssetUniverse,
  returns: ReturnMatrix,
  moments: MomentEstimates,
  weights: Weights,
  method: Method,
}

impl Portfolio {
  pub(crate) fn new(
    returns: ReturnMatrix,
    moments: MomentEstimates,
    weights: Weights,
    method: Method,
  ) -> Result<Self> {
    let universe = AssetUniverse::new(returns.symbols())?;
    Ok(Self {
      universe,
      returns,
      moments,
      weights,
      method,
    })
  }

  pub fn universe(&self) -> &AssetUniverse {
    &self.universe
  }

  pub fn returns(&self) -> &ReturnMatrix {
    &self.returns
  }

  pub fn moments(&self) -> &MomentEstimates {
    &self.moments
  }

  pub fn weights(&self) -> &Weights {
    &self.weights
  }

  pub fn method(&self) -> Method {
    self.method
  }
}

#[cfg(test)]
mod tests {
  use std::thread;

  use ndarray::array;

  use super::*;

  #[test]
  fn weights_report_long_and_short_exposure() {
    let symbols = vec!["A".to_string(), "B".to_string(), "C".to_string()];
    let w = Weights::new(&symbols, &array![0.7, 0.5, -0.2]);
    assert_eq!(w.get("B"), Some(0.5));
    assert_eq!(w.get("Z"), None);
    assert!((w.sum() - 1.0).abs() < 1e-15);
    assert!((w.long_sum() - 1.2).abs() < 1e-15);
    assert!((w.short_sum() - 0.2).abs() < 1e-15);
    assert_eq!(w.to_array(), array![0.7, 0.5, -0.2]);
  }

  #[test]
  fn objective_tags_parse_case_insensitively() {
    assert_eq!("sharpe".parse::<Objective>().unwrap(), Objective::Sharpe);
    assert_eq!("MINRISK".parse::<Objective>().unwrap(), Objective::MinRisk);
    assert_eq!("erc".parse::<Objective>().unwrap(), Objective::Erc);
    assert!("MaxSharpe".parse::<Objective>().is_err());
  }

  #[test]
  fn budget_and_solver_settings_validate() {
    assert!(Budget::default().validate().is_ok());
    assert!(Budget::long_only(0.0).validate().is_err());
    assert!(Budget {
      value: 1.0,
      value_short: -0.1
    }
    .validate()
    .is_err());
    let settings = SolverSettings {
      timeout: Some(Duration::ZERO),
      ..Default::default()
    };
    assert!(settings.validate().is_err());
  }

  #[test]
  fn deadline_expires() {
    let open = Deadline::new(None);
    assert!(open.check().is_ok());
    let tight = Deadline::new(Some(Duration::from_millis(1)));
    thread::sleep(Duration::from_millis(5));
    assert!(matches!(
      tight.check(),
      Err(PortfolioError::Optimization(OptimizationError::Timeout(_)))
    ));
  }
}
