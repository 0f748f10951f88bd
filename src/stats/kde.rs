use std::f64::consts::PI;

use ndarray::Array1;
use ndarray::ArrayView1;

/// Gaussian kernel density estimate over a sample of observations.
///
/// Used to smooth the empirical eigenvalue spectrum before fitting the
/// Marchenko-Pastur law.
#[derive(Clone, Debug)]
pub struct GaussianKde {
  data: Array1<f64>,
  bandwidth: f64,
}

impl GaussianKde {
  /// Creates an estimator with a fixed `bandwidth`.
  ///
  /// Non-positive bandwidths are raised to `1e-8`.
  pub fn new(data: Array1<f64>, bandwidth: f64) -> Self {
    Self {
      data,
      bandwidth: bandwidth.max(1e-8),
    }
  }

  /// Creates an estimator with Silverman's rule of thumb,
  /// `h = 0.9 min(σ, IQR/1.34) n^{-1/5}`.
  pub fn silverman(data: Array1<f64>) -> Self {
    let h = silverman_bandwidth(data.view());
    Self::new(data, h)
  }

  pub fn bandwidth(&self) -> f64 {
    self.bandwidth
  }

  /// Density at `x`.
  pub fn evaluate(&self, x: f64) -> f64 {
    if self.data.is_empty() {
      return 0.0;
    }
    let norm = 1.0 / (self.bandwidth * (2.0 * PI).sqrt());
    let sum: f64 = self
      .data
      .iter()
      .map(|&xi| (-0.5 * ((x - xi) / self.bandwidth).powi(2)).exp())
      .sum();
    norm * sum / self.data.len() as f64
  }

  /// Density at each point of `xs`.
  pub fn evaluate_array(&self, xs: &Array1<f64>) -> Array1<f64> {
    xs.mapv(|x| self.evaluate(x))
  }
}

/// Silverman bandwidth; degenerate samples fall back to `1e-6`.
pub fn silverman_bandwidth(data: ArrayView1<f64>) -> f64 {
  let n = data.len() as f64;
  if n < 2.0 {
    return 1e-6;
  }

  let std = data.std(1.0);
  let mut sorted = data.to_vec();
  sorted.sort_by(f64::total_cmp);
  let iqr = percentile(&sorted, 0.75) - percentile(&sorted, 0.25);

  let scale = if iqr > 0.0 { std.min(iqr / 1.34) } else { std };
  (0.9 * scale * n.powf(-0.2)).max(1e-8)
}

/// Linearly interpolated `q`-quantile of an ascending slice, `q` in `[0, 1]`.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
  match sorted.len() {
    0 => return f64::NAN,
    1 => return sorted[0],
    _ => {}
  }
  let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
  let lo = rank.floor() as usize;
  let hi = rank.ceil() as usize;
  sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
}
