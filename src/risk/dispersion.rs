//! Dispersion and lower partial moment estimators on a return series.

pub(crate) fn mean(x: &[f64]) -> f64 {
  if x.is_empty() {
    0.0
  } else {
    x.iter().sum::<f64>() / x.len() as f64
  }
}

/// Sample variance, ddof = 1.
pub fn variance(x: &[f64]) -> f64 {
  if x.len() < 2 {
    return f64::NAN;
  }
  let m = mean(x);
  x.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (x.len() - 1) as f64
}

/// Mean absolute deviation around the sample mean.
pub fn mad(x: &[f64]) -> f64 {
  let m = mean(x);
  mean(&x.iter().map(|v| (v - m).abs()).collect::<Vec<_>>())
}

/// Gini mean difference `2/(T(T-1)) Σ_{i<j} |x_i - x_j|`.
pub fn gmd(x: &[f64]) -> f64 {
  let t = x.len();
  if t < 2 {
    return f64::NAN;
  }
  let mut sorted = x.to_vec();
  sorted.sort_by(f64::total_cmp);
  // Σ_{i<j} (x_(j) - x_(i)) = Σ_j x_(j) (2j - T + 1)
  let total: f64 = sorted
    .iter()
    .enumerate()
    .map(|(j, v)| v * (2.0 * j as f64 - t as f64 + 1.0))
    .sum();
  2.0 * total / (t as f64 * (t as f64 - 1.0))
}

/// Semi standard deviation below the sample mean.
pub fn semi_deviation(x: &[f64]) -> f64 {
  if x.len() < 2 {
    return f64::NAN;
  }
  let m = mean(x);
  let sum: f64 = x.iter().map(|v| (v - m).min(0.0).powi(2)).sum();
  (sum / (x.len() - 1) as f64).sqrt()
}

/// First lower partial moment `Σ max(mar - x, 0) / (T - 1)`.
pub fn flpm(x: &[f64], mar: f64) -> f64 {
  if x.len() < 2 {
    return f64::NAN;
  }
  x.iter().map(|v| (mar - v).max(0.0)).sum::<f64>() / (x.len() - 1) as f64
}

/// Second lower partial moment `sqrt(Σ max(mar - x, 0)² / (T - 1))`.
pub fn slpm(x: &[f64], mar: f64) -> f64 {
  if x.len() < 2 {
    return f64::NAN;
  }
  let sum: f64 = x.iter().map(|v| (mar - v).max(0.0).powi(2)).sum();
  (sum / (x.len() - 1) as f64).sqrt()
}
