//! # Moment Estimation
//!
//! $$
//! \hat\mu = \sum_t \omega_t r_t,\qquad
//! \hat\Sigma = \frac{(\sum\omega)^2}{(\sum\omega)^2-\sum\omega^2}\sum_t \omega_t (r_t-\hat\mu)(r_t-\hat\mu)^\top
//! $$
//!
//! Expected returns and covariance estimators: historical, exponentially
//! weighted, shrinkage, graphical lasso, TMFG-LoGo and random matrix
//! denoising.

use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use ndarray::Array2;
use tracing::debug;

use crate::error::PortfolioError;
use crate::error::Result;
use crate::linalg;

pub mod denoise;
pub mod ewma;
pub mod graphical_lasso;
pub mod jlogo;
pub mod shrinkage;

/// Expected return estimator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MeanMethod {
  #[default]
  Hist,
  /// Exponentially weighted mean with normalised weights.
  Ewma1,
  /// Exponentially weighted mean from the recursive filter.
  Ewma2,
}

impl FromStr for MeanMethod {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "hist" => Ok(Self::Hist),
      "ewma1" => Ok(Self::Ewma1),
      "ewma2" => Ok(Self::Ewma2),
      other => Err(PortfolioError::invalid(format!("unknown mean method '{other}'"))),
    }
  }
}

/// Covariance estimator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CovMethod {
  #[default]
  Hist,
  Ewma1,
  Ewma2,
  Ledoit,
  Oas,
  Shrunk,
  /// Graphical lasso.
  Gl,
  /// TMFG-LoGo sparse inverse.
  Jlogo,
  /// Denoising with a constant tail spectrum.
  Fixed,
  /// Denoising with the tail spectrum removed.
  Spectral,
  /// Denoising with a shrunk tail spectrum.
  Shrink,
}

impl CovMethod {
  pub const fn tag(self) -> &'static str {
    match self {
      CovMethod::Hist => "hist",
      CovMethod::Ewma1 => "ewma1",
      CovMethod::Ewma2 => "ewma2",
      CovMethod::Ledoit => "ledoit",
      CovMethod::Oas => "oas",
      CovMethod::Shrunk => "shrunk",
      CovMethod::Gl => "gl",
      CovMethod::Jlogo => "jlogo",
      CovMethod::Fixed => "fixed",
      CovMethod::Spectral => "spectral",
      CovMethod::Shrink => "shrink",
    }
  }
}

impl fmt::Display for CovMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.tag())
  }
}

impl FromStr for CovMethod {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    let all = [
      CovMethod::Hist,
      CovMethod::Ewma1,
      CovMethod::Ewma2,
      CovMethod::Ledoit,
      CovMethod::Oas,
      CovMethod::Shrunk,
      CovMethod::Gl,
      CovMethod::Jlogo,
      CovMethod::Fixed,
      CovMethod::Spectral,
      CovMethod::Shrink,
    ];
    let key = s.trim().to_ascii_lowercase();
    all
      .into_iter()
      .find(|m| m.tag() == key)
      .ok_or_else(|| PortfolioError::invalid(format!("unknown covariance method '{key}'")))
  }
}

/// Estimator settings.
#[derive(Clone, Debug)]
pub struct MomentConfig {
  pub mean: MeanMethod,
  pub cov: CovMethod,
  /// EWMA decay `d`; the smoothing factor is `1 - d`.
  pub decay: f64,
  /// Fixed shrinkage intensity of `Shrunk`.
  pub shrinkage: f64,
  /// L1 penalty of the graphical lasso on the correlation scale.
  pub gl_alpha: f64,
  /// Weight of the tail spectrum kept by `Shrink` denoising.
  pub denoise_alpha: f64,
  /// Kernel bandwidth of the eigenvalue density fit.
  pub bandwidth: f64,
  /// Remove the market components after denoising.
  pub detone: bool,
  pub mkt_comp: usize,
}

impl Default for MomentConfig {
  fn default() -> Self {
    Self {
      mean: MeanMethod::Hist,
      cov: CovMethod::Hist,
      decay: 0.94,
      shrinkage: 0.1,
      gl_alpha: 0.1,
      denoise_alpha: 0.0,
      bandwidth: 0.01,
      detone: false,
      mkt_comp: 1,
    }
  }
}

impl MomentConfig {
  pub fn validate(&self) -> Result<()> {
    if !(self.decay > 0.0 && self.decay < 1.0) {
      return Err(PortfolioError::invalid(format!(
        "decay must lie in (0, 1), got {}",
        self.decay
      )));
    }
    if !(0.0..=1.0).contains(&self.shrinkage) {
      return Err(PortfolioError::invalid("shrinkage must lie in [0, 1]"));
    }
    if !(self.gl_alpha.is_finite() && self.gl_alpha >= 0.0) {
      return Err(PortfolioError::invalid("gl_alpha must be non-negative"));
    }
    if !(0.0..=1.0).contains(&self.denoise_alpha) {
      return Err(PortfolioError::invalid("denoise_alpha must lie in [0, 1]"));
    }
    if !(self.bandwidth.is_finite() && self.bandwidth > 0.0) {
      return Err(PortfolioError::invalid("bandwidth must be positive"));
    }
    if self.detone && self.mkt_comp == 0 {
      return Err(PortfolioError::invalid("mkt_comp must be positive when detoning"));
    }
    Ok(())
  }
}

/// Estimated mean vector and covariance matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct MomentEstimates {
  pub mean: Array1<f64>,
  pub cov: Array2<f64>,
}

impl MomentEstimates {
  /// Estimate moments of a `T x N` return table.
  ///
  /// The covariance is symmetrised and projected onto the PSD cone.
  pub fn estimate(returns: &Array2<f64>, config: &MomentConfig) -> Result<Self> {
    config.validate()?;
    let (t, n) = returns.dim();
    if t < 2 || n == 0 {
      return Err(PortfolioError::insufficient(format!(
        "{t} period(s) and {n} asset(s) cannot support moment estimation"
      )));
    }

    let alpha = 1.0 - config.decay;
    let mean = match config.mean {
      MeanMethod::Hist => ewma::weighted_mean(returns, &ewma::uniform_weights(t)),
      MeanMethod::Ewma1 => ewma::weighted_mean(returns, &ewma::adjusted_weights(t, alpha)),
      MeanMethod::Ewma2 => ewma::weighted_mean(returns, &ewma::recursive_weights(t, alpha)),
    };

    let cov = match config.cov {
      CovMethod::Hist => ewma::weighted_cov(returns, &ewma::uniform_weights(t)),
      CovMethod::Ewma1 => ewma::weighted_cov(returns, &ewma::adjusted_weights(t, alpha)),
      CovMethod::Ewma2 => ewma::weighted_cov(returns, &ewma::recursive_weights(t, alpha)),
      CovMethod::Ledoit => shrinkage::ledoit_wolf(returns),
      CovMethod::Oas => shrinkage::oas(returns),
      CovMethod::Shrunk => shrinkage::shrunk(returns, config.shrinkage),
      CovMethod::Gl => {
        let sample = ewma::weighted_cov(returns, &ewma::uniform_weights(t));
        graphical_lasso::graphical_lasso(&sample, config.gl_alpha)
      }
      CovMethod::Jlogo => {
        let sample = ewma::weighted_cov(returns, &ewma::uniform_weights(t));
        jlogo::jlogo(&sample)?
      }
      CovMethod::Fixed | CovMethod::Spectral | CovMethod::Shrink => {
        let sample = ewma::weighted_cov(returns, &ewma::uniform_weights(t));
        denoise::denoise_cov(&sample, t as f64 / n as f64, config)
      }
    };

    if cov.iter().any(|v| !v.is_finite()) || mean.iter().any(|v| !v.is_finite()) {
      return Err(PortfolioError::insufficient(format!(
        "{} estimator produced non-finite moments",
        config.cov
      )));
    }

    debug!(method = %config.cov, assets = n, periods = t, "estimated moments");
    Ok(Self {
      mean,
      cov: linalg::nearest_psd(&cov),
    })
  }

  pub fn n_assets(&self) -> usize {
    self.mean.len()
  }

  /// Moments restricted to the given asset indices.
  pub fn select(&self, idx: &[usize]) -> Self {
    Self {
      mean: Array1::from_iter(idx.iter().map(|&i| self.mean[i])),
      cov: Array2::from_shape_fn((idx.len(), idx.len()), |(i, j)| self.cov[[idx[i], idx[j]]]),
    }
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use ndarray::Axis;

  use super::*;

  pub(crate) fn sample() -> Array2<f64> {
    array![
      [0.010, -0.020, 0.004, 0.003],
      [-0.030, 0.010, -0.002, -0.011],
      [0.020, 0.003, 0.010, 0.008],
      [0.004, 0.017, -0.008, 0.002],
      [-0.010, -0.006, 0.001, -0.004],
      [0.015, 0.021, 0.007, 0.012],
      [-0.002, -0.013, -0.012, -0.006],
      [0.008, 0.005, 0.003, 0.001],
      [0.011, -0.004, 0.006, 0.009],
      [-0.007, 0.009, -0.003, -0.002],
    ]
  }

  #[test]
  fn historical_moments_match_sample_statistics() {
    let r = sample();
    let m = MomentEstimates::estimate(&r, &MomentConfig::default()).unwrap();
    let mean = r.mean_axis(Axis(0)).unwrap();
    assert_abs_diff_eq!(m.mean, mean, epsilon = 1e-15);
    let var0 = r.column(0).var(1.0);
    assert_abs_diff_eq!(m.cov[[0, 0]], var0, epsilon = 1e-15);
  }

  #[test]
  fn every_covariance_method_is_symmetric_psd() {
    let r = sample();
    for tag in [
      "hist", "ewma1", "ewma2", "ledoit", "oas", "shrunk", "gl", "jlogo", "fixed", "spectral",
      "shrink",
    ] {
      let config = MomentConfig {
        cov: tag.parse().unwrap(),
        ..Default::default()
      };
      let m = MomentEstimates::estimate(&r, &config).unwrap();
      assert_abs_diff_eq!(m.cov, m.cov.t(), epsilon = 1e-12);
      let (values, _) = linalg::eigh(&m.cov);
      assert!(values[0] >= -1e-12, "{tag}: min eigenvalue {}", values[0]);
    }
  }

  #[test]
  fn unknown_tags_and_bad_decay_are_rejected() {
    assert!("robust".parse::<CovMethod>().is_err());
    assert!("ewma3".parse::<MeanMethod>().is_err());
    let config = MomentConfig {
      decay: 1.0,
      ..Default::default()
    };
    assert!(matches!(
      MomentEstimates::estimate(&sample(), &config),
      Err(PortfolioError::InvalidParameter(_))
    ));
  }

  #[test]
  fn select_restricts_moments() {
    let m = MomentEstimates::estimate(&sample(), &MomentConfig::default()).unwrap();
    let sub = m.select(&[2, 0]);
    assert_eq!(sub.mean[0], m.mean[2]);
    assert_eq!(sub.cov[[0, 1]], m.cov[[2, 0]]);
  }
}
