//! # Black-Litterman
//!
//! $$
//! \Pi_{BL} = \Pi + \tau\Sigma P^\top\left(P\tau\Sigma P^\top + \Omega\right)^{-1}(Q - P\Pi),\qquad
//! \Sigma_{BL} = \Sigma + \tau\Sigma - \tau\Sigma P^\top\left(P\tau\Sigma P^\top + \Omega\right)^{-1}P\tau\Sigma
//! $$
//!
//! Blends equilibrium (or historical) excess returns with investor views.

use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;
use tracing::warn;

use super::mean_risk;
use super::mean_risk::MeanRiskConfig;
use super::types::Budget;
use super::types::Deadline;
use super::types::Objective;
use super::types::SolverSettings;
use super::types::Weights;
use crate::error::OptimizationError;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::linalg;
use crate::moments::MomentEstimates;
use crate::returns::ReturnMatrix;
use crate::risk::RiskMeasure;
use crate::risk::RiskParams;

#[derive(Clone, Debug, PartialEq)]
enum View {
  Absolute { symbol: String, value: f64 },
  Relative { long: String, short: String, value: f64 },
}

/// Investor views expressed on symbols, resolved to `(P, Q)` against the
/// universe that survives preprocessing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Views {
  views: Vec<View>,
}

impl Views {
  pub fn new() -> Self {
    Self::default()
  }

  /// `symbol` returns `value` in excess of the risk free rate, per period.
  pub fn absolute(mut self, symbol: impl Into<String>, value: f64) -> Self {
    self.views.push(View::Absolute {
      symbol: symbol.into(),
      value,
    });
    self
  }

  /// `long` outperforms `short` by `value` per period.
  pub fn relative(mut self, long: impl Into<String>, short: impl Into<String>, value: f64) -> Self {
    self.views.push(View::Relative {
      long: long.into(),
      short: short.into(),
      value,
    });
    self
  }

  pub fn len(&self) -> usize {
    self.views.len()
  }

  pub fn is_empty(&self) -> bool {
    self.views.is_empty()
  }

  fn symbols(&self) -> impl Iterator<Item = &str> {
    self.views.iter().flat_map(|v| match v {
      View::Absolute { symbol, .. } => vec![symbol.as_str()],
      View::Relative { long, short, .. } => vec![long.as_str(), short.as_str()],
    })
  }

  /// Fails on the first symbol outside `universe`.
  pub fn check_symbols(&self, universe: &[String]) -> Result<()> {
    match self.symbols().find(|s| !universe.iter().any(|u| u == s)) {
      Some(s) => Err(PortfolioError::invalid(format!(
        "view references '{s}' which is not in the universe"
      ))),
      None => Ok(()),
    }
  }

  /// Views whose symbols are all in `symbols`; the rest are logged and dropped.
  pub fn retain_known(&self, symbols: &[String]) -> Views {
    let known = |s: &String| symbols.iter().any(|x| x == s);
    let views = self
      .views
      .iter()
      .filter(|v| {
        let keep = match v {
          View::Absolute { symbol, .. } => known(symbol),
          View::Relative { long, short, .. } => known(long) && known(short),
        };
        if !keep {
          warn!(view = ?v, "dropping view on an asset removed by preprocessing");
        }
        keep
      })
      .cloned()
      .collect();
    Views { views }
  }

  /// Pick matrix `P` (k×n) and view returns `Q`.
  pub fn matrices(&self, symbols: &[String]) -> Result<(Array2<f64>, Array1<f64>)> {
    let index = |s: &str| {
      symbols
        .iter()
        .position(|x| x == s)
        .ok_or_else(|| PortfolioError::invalid(format!("view references unknown symbol '{s}'")))
    };
    let mut p = Array2::zeros((self.views.len(), symbols.len()));
    let mut q = Array1::zeros(self.views.len());
    for (row, view) in self.views.iter().enumerate() {
      match view {
        View::Absolute { symbol, value } => {
          p[[row, index(symbol)?]] = 1.0;
          q[row] = *value;
        }
        View::Relative { long, short, value } => {
          let (l, s) = (index(long)?, index(short)?);
          if l == s {
            return Err(PortfolioError::invalid(format!(
              "relative view of {long} against itself"
            )));
          }
          p[[row, l]] = 1.0;
          p[[row, s]] = -1.0;
          q[row] = *value;
        }
      }
    }
    Ok((p, q))
  }

  fn validate(&self) -> Result<()> {
    if self.views.is_empty() {
      return Err(PortfolioError::invalid("Black-Litterman needs at least one view"));
    }
    let finite = self.views.iter().all(|v| match v {
      View::Absolute { value, .. } | View::Relative { value, .. } => value.is_finite(),
    });
    if !finite {
      return Err(PortfolioError::invalid("view returns must be finite"));
    }
    Ok(())
  }
}

/// Black-Litterman settings. Rates are per period.
#[derive(Clone, Debug)]
pub struct BlackLittermanConfig {
  pub views: Views,
  /// Benchmark weights aligned with the universe; `None` is equal weight.
  pub benchmark: Option<Vec<f64>>,
  /// Risk aversion; `None` is the benchmark's excess return over its variance.
  pub delta: Option<f64>,
  pub risk_free: f64,
  /// Use CAPM equilibrium returns as the prior, otherwise historical excess returns.
  pub equilibrium: bool,
  /// Run a Mean-Risk pass on the posterior; otherwise return `(δΣ_BL)⁻¹Π_BL`.
  pub optimize: bool,
  pub objective: Objective,
  pub risk_aversion: f64,
  pub budget: Budget,
  pub solver: SolverSettings,
}

impl Default for BlackLittermanConfig {
  fn default() -> Self {
    Self {
      views: Views::new(),
      benchmark: None,
      delta: None,
      risk_free: 0.0,
      equilibrium: true,
      optimize: true,
      objective: Objective::Sharpe,
      risk_aversion: 1.0,
      budget: Budget::default(),
      solver: SolverSettings::default(),
    }
  }
}

impl BlackLittermanConfig {
  pub fn validate(&self) -> Result<()> {
    self.views.validate()?;
    if let Some(b) = &self.benchmark {
      if b.iter().any(|v| !v.is_finite()) || b.iter().sum::<f64>() <= 0.0 {
        return Err(PortfolioError::invalid(
          "benchmark weights must be finite with a positive sum",
        ));
      }
    }
    if self.delta.is_some_and(|d| !(d.is_finite() && d > 0.0)) {
      return Err(PortfolioError::invalid("delta must be positive"));
    }
    self.mean_risk_config().validate()
  }

  fn mean_risk_config(&self) -> MeanRiskConfig {
    MeanRiskConfig {
      measure: RiskMeasure::MV,
      objective: self.objective,
      risk_params: RiskParams::default(),
      risk_aversion: self.risk_aversion,
      risk_free: self.risk_free,
      budget: self.budget,
      target_return: None,
      target_risk: None,
      solver: self.solver,
    }
  }
}

/// Posterior moments of the model.
#[derive(Clone, Debug, PartialEq)]
pub struct Posterior {
  /// Prior excess returns `Π`.
  pub prior: Array1<f64>,
  /// Posterior excess returns `Π_BL`.
  pub mean: Array1<f64>,
  pub cov: Array2<f64>,
  pub delta: f64,
}

/// Posterior excess returns and covariance.
pub fn posterior(
  returns: &ReturnMatrix,
  moments: &MomentEstimates,
  config: &BlackLittermanConfig,
) -> Result<Posterior> {
  let n = moments.n_assets();
  if n < 2 {
    return Err(PortfolioError::insufficient(
      "Black-Litterman needs at least 2 assets",
    ));
  }
  let views = config.views.retain_known(returns.symbols());
  if views.is_empty() {
    return Err(PortfolioError::insufficient(
      "no view references an asset left after preprocessing",
    ));
  }
  let (p, q) = views.matrices(returns.symbols())?;

  let w_b = match &config.benchmark {
    Some(b) if b.len() != n => {
      return Err(PortfolioError::invalid(format!(
        "benchmark has {} weights for {n} assets",
        b.len()
      )))
    }
    Some(b) => {
      let b = Array1::from_vec(b.clone());
      let total = b.sum();
      b / total
    }
    None => Array1::from_elem(n, 1.0 / n as f64),
  };

  let sigma = &moments.cov;
  let delta = match config.delta {
    Some(d) => d,
    None => {
      let x = returns.portfolio_returns(&w_b);
      let m = x.mean().unwrap_or(0.0);
      let var = x.var(1.0);
      if !(var > 0.0) {
        return Err(PortfolioError::degenerate(
          RiskMeasure::MV,
          "benchmark variance is zero",
        ));
      }
      let d = (m - config.risk_free) / var;
      if !(d > 0.0) {
        return Err(PortfolioError::invalid(format!(
          "implied risk aversion {d:.4} is not positive, set delta explicitly"
        )));
      }
      d
    }
  };

  let prior = if config.equilibrium {
    sigma.dot(&w_b) * delta
  } else {
    moments.mean.mapv(|m| m - config.risk_free)
  };

  let tau = 1.0 / returns.n_periods() as f64;
  let tau_sigma = sigma * tau;
  let view_cov = p.dot(&tau_sigma).dot(&p.t());
  let omega = Array2::from_diag(&view_cov.diag());
  let m_inv = linalg::inverse(&(&view_cov + &omega)).ok_or(OptimizationError::SingularCovariance)?;
  let gain = tau_sigma.dot(&p.t()).dot(&m_inv);

  let mean = &prior + &gain.dot(&(&q - &p.dot(&prior)));
  let cov = linalg::symmetrize(&(sigma + &tau_sigma - gain.dot(&p).dot(&tau_sigma)));
  debug!(views = views.len(), delta, tau, "Black-Litterman posterior");
  Ok(Posterior {
    prior,
    mean,
    cov,
    delta,
  })
}

/// Scales unconstrained weights onto `budget`. Long-only budgets clip
/// shorts first; long-short budgets scale each side separately.
fn closed_form(raw: &Array1<f64>, budget: &Budget) -> Result<Array1<f64>> {
  let infeasible = || {
    PortfolioError::from(OptimizationError::Infeasible {
      constraint: "budget",
      violation: budget.net(),
    })
  };
  let longs = raw.mapv(|v| v.max(0.0));
  let long_sum = longs.sum();
  if !(long_sum > 1e-12) {
    return Err(infeasible());
  }
  if budget.is_long_only() {
    return Ok(longs * (budget.value / long_sum));
  }
  let shorts = raw.mapv(|v| (-v).max(0.0));
  let short_sum = shorts.sum();
  if !(short_sum > 1e-12) {
    if !(budget.net() > 0.0) {
      return Err(infeasible());
    }
    return Ok(longs * (budget.net() / long_sum));
  }
  Ok(longs * (budget.value / long_sum) - shorts * (budget.value_short / short_sum))
}

/// Black-Litterman portfolio of `returns`.
pub fn black_litterman(
  returns: &ReturnMatrix,
  moments: &MomentEstimates,
  config: &BlackLittermanConfig,
) -> Result<Weights> {
  config.validate()?;
  let deadline = Deadline::new(config.solver.timeout);
  let post = posterior(returns, moments, config)?;
  deadline.check()?;

  let w = if config.optimize {
    let mean = post.mean.mapv(|m| m + config.risk_free);
    mean_risk::solve(returns.values(), &mean, &post.cov, &config.mean_risk_config())?
  } else {
    let inv = linalg::inverse(&(&post.cov * post.delta)).ok_or(OptimizationError::SingularCovariance)?;
    closed_form(&inv.dot(&post.mean), &config.budget)?
  };
  Ok(Weights::new(returns.symbols(), &w))
}
