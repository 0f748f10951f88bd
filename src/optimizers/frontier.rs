//! # Efficient Frontier
//!
//! $$
//! \mathbf{w}_j = \arg\min_{\mathbf{w}} \mathcal{R}(\mathbf{w})
//! \quad\text{s.t.}\quad \mu^\top\mathbf{w} \ge r_j,\qquad
//! r_j \in [\mu_{\min\mathcal{R}},\ \mu_{\max}]
//! $$
//!
//! Minimum-risk portfolios at evenly spaced target returns, plus seeded
//! random portfolios for scatter plots.

use ndarray::Array1;
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Exp1;
use ndarray_rand::RandomExt;
use tracing::debug;

use super::mean_risk;
use super::mean_risk::MeanRiskConfig;
use super::types::Objective;
use super::types::Weights;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::moments::MomentEstimates;
use crate::returns::ReturnMatrix;
use crate::risk;
use crate::risk::RiskMeasure;
use crate::risk::RiskParams;

/// One portfolio on (or under) the frontier.
#[derive(Clone, Debug, PartialEq)]
pub struct FrontierPoint {
  pub weights: Weights,
  /// Expected return per period.
  pub mean: f64,
  /// Degree-one risk per period; the standard deviation for `MV`.
  pub risk: f64,
  /// `(mean - risk_free) / risk`, `NaN` at zero risk.
  pub sharpe: f64,
}

fn point(
  returns: &ReturnMatrix,
  moments: &MomentEstimates,
  w: &Array1<f64>,
  measure: RiskMeasure,
  params: &RiskParams,
  risk_free: f64,
) -> Result<FrontierPoint> {
  let mean = moments.mean.dot(w);
  let risk = risk::risk_linear(w, &moments.cov, returns.values(), measure, params)?;
  Ok(FrontierPoint {
    weights: Weights::new(returns.symbols(), w),
    mean,
    risk,
    sharpe: if risk > 0.0 { (mean - risk_free) / risk } else { f64::NAN },
  })
}

/// `points` minimum-risk portfolios from the global minimum risk portfolio up
/// to the maximum return portfolio. Targets the solver cannot reach are skipped.
pub fn efficient_frontier(
  returns: &ReturnMatrix,
  moments: &MomentEstimates,
  config: &MeanRiskConfig,
  points: usize,
) -> Result<Vec<FrontierPoint>> {
  config.validate()?;
  if points < 2 {
    return Err(PortfolioError::invalid("a frontier needs at least 2 points"));
  }
  let (r, mu, cov) = (returns.values(), &moments.mean, &moments.cov);

  let base = MeanRiskConfig {
    objective: Objective::MinRisk,
    target_return: None,
    target_risk: None,
    ..config.clone()
  };
  let w_min = mean_risk::solve(r, mu, cov, &base)?;
  let top = MeanRiskConfig {
    objective: Objective::MaxRet,
    ..base.clone()
  };
  let w_max = mean_risk::solve(r, mu, cov, &top)?;
  let (lo, hi) = (mu.dot(&w_min), mu.dot(&w_max));

  let mut frontier = Vec::with_capacity(points);
  frontier.push(point(
    returns,
    moments,
    &w_min,
    config.measure,
    &config.risk_params,
    config.risk_free,
  )?);
  for target in Array1::linspace(lo, hi, points).iter().skip(1) {
    let step = MeanRiskConfig {
      target_return: Some(*target),
      ..base.clone()
    };
    match mean_risk::solve(r, mu, cov, &step) {
      Ok(w) => frontier.push(point(
        returns,
        moments,
        &w,
        config.measure,
        &config.risk_params,
        config.risk_free,
      )?),
      Err(e) if e.is_no_solution() => debug!(target, error = %e, "skipping frontier point"),
      Err(e) => return Err(e),
    }
  }
  Ok(frontier)
}

/// `count` long-only portfolios drawn uniformly from the simplex.
pub fn random_portfolios(
  returns: &ReturnMatrix,
  moments: &MomentEstimates,
  measure: RiskMeasure,
  params: &RiskParams,
  risk_free: f64,
  count: usize,
  seed: u64,
) -> Result<Vec<FrontierPoint>> {
  params.validate()?;
  let n = returns.n_assets();
  if n == 0 {
    return Err(PortfolioError::EmptyUniverse);
  }
  let mut rng = StdRng::seed_from_u64(seed);
  (0..count)
    .map(|_| {
      let draw: Array1<f64> = Array1::random_using(n, Exp1, &mut rng);
      let w = &draw / draw.sum();
      point(returns, moments, &w, measure, params, risk_free)
    })
    .collect()
}
