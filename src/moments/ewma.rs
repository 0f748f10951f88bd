//! Observation weights and weighted first/second moments.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;

pub(crate) fn uniform_weights(t: usize) -> Array1<f64> {
  Array1::ones(t)
}

/// `ω_t = (1-α)^{T-1-t}`.
pub(crate) fn adjusted_weights(t: usize, alpha: f64) -> Array1<f64> {
  Array1::from_shape_fn(t, |i| (1.0 - alpha).powi((t - 1 - i) as i32))
}

/// Weights of the recursion `m_t = (1-α) m_{t-1} + α x_t`, `m_0 = x_0`.
pub(crate) fn recursive_weights(t: usize, alpha: f64) -> Array1<f64> {
  Array1::from_shape_fn(t, |i| {
    let decay = (1.0 - alpha).powi((t - 1 - i) as i32);
    if i == 0 {
      decay
    } else {
      alpha * decay
    }
  })
}

pub(crate) fn weighted_mean(returns: &Array2<f64>, weights: &Array1<f64>) -> Array1<f64> {
  returns.t().dot(weights) / weights.sum()
}

/// Weighted covariance with the unbiased correction
/// `(Σω)² / ((Σω)² - Σω²)`; uniform weights give the ddof = 1 estimator.
pub(crate) fn weighted_cov(returns: &Array2<f64>, weights: &Array1<f64>) -> Array2<f64> {
  let mean = weighted_mean(returns, weights);
  let centered = returns - &mean.view().insert_axis(Axis(0));
  let scaled = &centered * &weights.view().insert_axis(Axis(1));
  let sum_w = weights.sum();
  let sum_w2 = weights.mapv(|w| w * w).sum();
  let denom = sum_w - sum_w2 / sum_w;
  scaled.t().dot(&centered) / denom
}
