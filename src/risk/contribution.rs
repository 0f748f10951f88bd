//! # Risk Contributions
//!
//! $$
//! RC_i = w_i \frac{\partial \mathcal{R}(\mathbf{w})}{\partial w_i}
//! $$
//!
//! For positively homogeneous measures of degree one the contributions add up
//! to the total risk (Euler). `MV` is decomposed on the standard deviation.

use ndarray::Array1;
use ndarray::Array2;

use super::risk_linear;
use super::RiskMeasure;
use super::RiskParams;
use crate::error::PortfolioError;
use crate::error::Result;

const STEP: f64 = 1e-6;

/// Per-asset contributions to the degree-one risk of `weights`.
pub fn risk_contributions(
  weights: &Array1<f64>,
  cov: &Array2<f64>,
  returns: &Array2<f64>,
  measure: RiskMeasure,
  params: &RiskParams,
) -> Result<Array1<f64>> {
  if measure == RiskMeasure::MV {
    let n = weights.len();
    if cov.nrows() != n || cov.ncols() != n {
      return Err(PortfolioError::degenerate(measure, "covariance does not match weights"));
    }
    let sigma_w = cov.dot(weights);
    let std = weights.dot(&sigma_w).max(0.0).sqrt();
    if std <= 0.0 {
      return Err(PortfolioError::degenerate(measure, "zero portfolio variance"));
    }
    return Ok(weights * &sigma_w / std);
  }

  let mut out = Array1::zeros(weights.len());
  for i in 0..weights.len() {
    let mut up = weights.clone();
    let mut down = weights.clone();
    up[i] += STEP;
    down[i] -= STEP;
    let r_up = risk_linear(&up, cov, returns, measure, params)?;
    let r_down = risk_linear(&down, cov, returns, measure, params)?;
    out[i] = weights[i] * (r_up - r_down) / (2.0 * STEP);
  }
  Ok(out)
}
