//! # Random Matrix Denoising
//!
//! $$
//! f_{MP}(\lambda) = \frac{q}{2\pi\sigma^2\lambda}\sqrt{(\lambda_+-\lambda)(\lambda-\lambda_-)},\qquad
//! \lambda_\pm = \sigma^2\left(1\pm\sqrt{1/q}\right)^2
//! $$
//!
//! Eigenvalues of the correlation matrix below the fitted Marchenko-Pastur
//! edge `λ₊` are treated as noise and replaced.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;
use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;

use super::CovMethod;
use super::MomentConfig;
use crate::linalg;
use crate::stats::kde::GaussianKde;

const PDF_POINTS: usize = 1000;
const VAR_MIN: f64 = 1e-5;
const VAR_MAX: f64 = 1.0 - 1e-5;

/// Marchenko-Pastur density on an evenly spaced grid over its support.
pub fn marchenko_pastur_pdf(var: f64, q: f64, points: usize) -> (Array1<f64>, Array1<f64>) {
  let e_min = var * (1.0 - (1.0 / q).sqrt()).powi(2);
  let e_max = var * (1.0 + (1.0 / q).sqrt()).powi(2);
  let grid = Array1::linspace(e_min, e_max, points);
  let pdf = grid.mapv(|l: f64| {
    if l <= 0.0 {
      return 0.0;
    }
    q / (2.0 * std::f64::consts::PI * var * l) * ((e_max - l) * (l - e_min)).max(0.0).sqrt()
  });
  (grid, pdf)
}

struct SpectrumFit {
  eigenvalues: Array1<f64>,
  q: f64,
  bandwidth: f64,
}

impl SpectrumFit {
  fn variance(u: f64) -> f64 {
    VAR_MIN + (VAR_MAX - VAR_MIN) / (1.0 + (-u).exp())
  }

  fn sse(&self, var: f64) -> f64 {
    let (grid, theoretical) = marchenko_pastur_pdf(var, self.q, PDF_POINTS);
    let kde = GaussianKde::new(self.eigenvalues.clone(), self.bandwidth);
    let empirical = kde.evaluate_array(&grid);
    (&empirical - &theoretical).mapv(|d| d * d).sum()
  }
}

impl CostFunction for SpectrumFit {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, u: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    let v = self.sse(Self::variance(u[0]));
    Ok(if v.is_finite() { v } else { f64::MAX })
  }
}

/// Fit the noise variance and return the upper edge `λ₊` with the variance.
pub fn max_eigenvalue(eigenvalues: &Array1<f64>, q: f64, bandwidth: f64) -> (f64, f64) {
  let fit = SpectrumFit {
    eigenvalues: eigenvalues.clone(),
    q,
    bandwidth,
  };
  let simplex = vec![vec![0.0], vec![1.0]];
  let var = NelderMead::new(simplex)
    .with_sd_tolerance(1e-10)
    .ok()
    .and_then(|solver| {
      Executor::new(fit, solver)
        .configure(|state| state.max_iters(200))
        .run()
        .ok()
    })
    .and_then(|res| res.state.best_param)
    .map(|u| SpectrumFit::variance(u[0]))
    .unwrap_or(1.0);

  (var * (1.0 + (1.0 / q).sqrt()).powi(2), var)
}

/// Denoise a covariance matrix estimated from `q = T/N` observations per asset.
pub fn denoise_cov(cov: &Array2<f64>, q: f64, config: &MomentConfig) -> Array2<f64> {
  let (corr, std) = linalg::cov_to_corr(cov);
  let n = corr.nrows();
  let (values, vectors) = linalg::eigh(&corr);
  let (e_max, var) = max_eigenvalue(&values, q, config.bandwidth);
  let n_facts = values.iter().filter(|&&v| v > e_max).count();
  debug!(e_max, var, n_facts, "fitted Marchenko-Pastur edge");

  // ascending order: noise occupies the first `n - n_facts` slots
  let n_noise = n - n_facts;
  let mut corr = if n_noise == 0 {
    corr
  } else {
    match config.cov {
      CovMethod::Shrink => {
        let signal = values.mapv(|_| 0.0);
        let mut left = signal.clone();
        let mut right = signal;
        for i in 0..n {
          if i < n_noise {
            right[i] = values[i];
          } else {
            left[i] = values[i];
          }
        }
        let c0 = linalg::recompose(&left, &vectors);
        let c1 = linalg::recompose(&right, &vectors);
        let a = config.denoise_alpha;
        let mut out = c0 + &c1 * a;
        for i in 0..n {
          out[[i, i]] += (1.0 - a) * c1[[i, i]];
        }
        out
      }
      _ => {
        let fill = if config.cov == CovMethod::Spectral {
          0.0
        } else {
          values.iter().take(n_noise).sum::<f64>() / n_noise as f64
        };
        let adjusted = Array1::from_shape_fn(n, |i| if i < n_noise { fill } else { values[i] });
        linalg::cov_to_corr(&linalg::recompose(&adjusted, &vectors)).0
      }
    }
  };

  if config.detone {
    let k = config.mkt_comp.min(n);
    let market = Array1::from_shape_fn(n, |i| if i >= n - k { values[i] } else { 0.0 });
    corr = corr - linalg::recompose(&market, &vectors);
    corr = linalg::cov_to_corr(&corr).0;
  }

  linalg::corr_to_cov(&corr, &std)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  use super::*;

  fn noisy_returns(t: usize, n: usize) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(7);
    let normal = Normal::new(0.0, 0.01).unwrap();
    let market: Vec<f64> = (0..t).map(|_| normal.sample(&mut rng)).collect();
    Array2::from_shape_fn((t, n), |(i, _)| market[i] + normal.sample(&mut rng))
  }

  #[test]
  fn mp_density_integrates_to_one() {
    let (grid, pdf) = marchenko_pastur_pdf(1.0, 4.0, 20_000);
    let dx = grid[1] - grid[0];
    assert_abs_diff_eq!(pdf.sum() * dx, 1.0, epsilon = 1e-2);
  }

  #[test]
  fn fitted_variance_is_in_bounds() {
    let r = noisy_returns(400, 20);
    let cov = crate::moments::ewma::weighted_cov(&r, &crate::moments::ewma::uniform_weights(400));
    let (corr, _) = linalg::cov_to_corr(&cov);
    let (values, _) = linalg::eigh(&corr);
    let (e_max, var) = max_eigenvalue(&values, 20.0, 0.01);
    assert!(var >= VAR_MIN && var < 1.0);
    assert!(e_max > var);
    // the market factor stands out of the bulk
    assert!(values[19] > e_max);
  }

  #[test]
  fn denoised_covariance_keeps_variances() {
    let r = noisy_returns(300, 12);
    let cov = crate::moments::ewma::weighted_cov(&r, &crate::moments::ewma::uniform_weights(300));
    for method in [CovMethod::Fixed, CovMethod::Spectral, CovMethod::Shrink] {
      let config = MomentConfig {
        cov: method,
        ..Default::default()
      };
      let out = denoise_cov(&cov, 25.0, &config);
      for i in 0..12 {
        assert_abs_diff_eq!(out[[i, i]], cov[[i, i]], epsilon = 1e-10);
      }
    }
  }

  #[test]
  fn detoning_removes_the_common_factor() {
    let r = noisy_returns(300, 12);
    let cov = crate::moments::ewma::weighted_cov(&r, &crate::moments::ewma::uniform_weights(300));
    let config = MomentConfig {
      cov: CovMethod::Fixed,
      detone: true,
      ..Default::default()
    };
    let out = denoise_cov(&cov, 25.0, &config);
    let (corr, _) = linalg::cov_to_corr(&out);
    let (raw, _) = linalg::cov_to_corr(&cov);
    assert!(corr[[0, 1]].abs() < raw[[0, 1]].abs());
  }
}
