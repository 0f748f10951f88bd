//! # Shrinkage Covariance
//!
//! $$
//! \hat\Sigma = (1-\delta) S + \delta\,\mu I,\qquad \mu = \operatorname{tr}(S)/N
//! $$
//!
//! Shrinkage toward the scaled identity with the Ledoit-Wolf, Oracle
//! Approximating and fixed intensities. `S` is the maximum likelihood
//! (ddof = 0) sample covariance.

use ndarray::Array2;
use ndarray::Axis;

fn centered(returns: &Array2<f64>) -> Array2<f64> {
  let mean = returns.mean_axis(Axis(0)).unwrap_or_else(|| ndarray::Array1::zeros(returns.ncols()));
  returns - &mean.insert_axis(Axis(0))
}

fn empirical_cov(x: &Array2<f64>) -> Array2<f64> {
  x.t().dot(x) / x.nrows() as f64
}

fn shrink_to_identity(emp: &Array2<f64>, delta: f64) -> Array2<f64> {
  let p = emp.nrows();
  let mu = emp.diag().sum() / p as f64;
  let mut out = emp * (1.0 - delta);
  for i in 0..p {
    out[[i, i]] += delta * mu;
  }
  out
}

/// Ledoit-Wolf optimal shrinkage intensity.
pub fn ledoit_wolf_shrinkage(returns: &Array2<f64>) -> f64 {
  let x = centered(returns);
  let (n, p) = x.dim();
  let (n, p_f) = (n as f64, p as f64);

  let emp = empirical_cov(&x);
  let trace = emp.diag().sum();
  let mu = trace / p_f;

  let x2 = x.mapv(|v| v * v);
  let beta_sum = x2.t().dot(&x2).sum();
  let delta_sum = x.t().dot(&x).mapv(|v| v * v).sum() / (n * n);

  let beta = (beta_sum / n - delta_sum) / (p_f * n);
  let delta = (delta_sum - 2.0 * mu * trace + p_f * mu * mu) / p_f;
  let beta = beta.min(delta);

  if beta <= 0.0 || delta <= 0.0 {
    0.0
  } else {
    beta / delta
  }
}

pub fn ledoit_wolf(returns: &Array2<f64>) -> Array2<f64> {
  let emp = empirical_cov(&centered(returns));
  shrink_to_identity(&emp, ledoit_wolf_shrinkage(returns))
}

/// Oracle Approximating Shrinkage intensity.
pub fn oas_shrinkage(returns: &Array2<f64>) -> f64 {
  let emp = empirical_cov(&centered(returns));
  let (n, p) = (returns.nrows() as f64, emp.nrows() as f64);
  let alpha = emp.mapv(|v| v * v).mean().unwrap_or(0.0);
  let mu = emp.diag().sum() / p;
  let mu2 = mu * mu;
  let num = alpha + mu2;
  let den = (n + 1.0) * (alpha - mu2 / p);
  if den == 0.0 {
    1.0
  } else {
    (num / den).min(1.0)
  }
}

pub fn oas(returns: &Array2<f64>) -> Array2<f64> {
  let emp = empirical_cov(&centered(returns));
  shrink_to_identity(&emp, oas_shrinkage(returns))
}

/// Shrinkage with a fixed intensity.
pub fn shrunk(returns: &Array2<f64>, delta: f64) -> Array2<f64> {
  shrink_to_identity(&empirical_cov(&centered(returns)), delta)
}
