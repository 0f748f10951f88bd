//! # TMFG-LoGo Covariance
//!
//! $$
//! J = \sum_{c\in\mathcal{C}} \left(S_{cc}\right)^{-1} - \sum_{s\in\mathcal{S}} \left(S_{ss}\right)^{-1},
//! \qquad \hat\Sigma = J^{-1}
//! $$
//!
//! Local-global sparse inverse covariance built on the cliques and separators
//! of the TMFG of squared correlations.

use ndarray::Array2;

use crate::cluster::tmfg::Tmfg;
use crate::error::OptimizationError;
use crate::error::Result;
use crate::linalg;

fn scatter_inverse(j: &mut Array2<f64>, cov: &Array2<f64>, idx: &[usize], sign: f64) -> Result<()> {
  let sub = Array2::from_shape_fn((idx.len(), idx.len()), |(a, b)| cov[[idx[a], idx[b]]]);
  let inv = linalg::inverse(&sub).ok_or(OptimizationError::SingularCovariance)?;
  for (a, &ia) in idx.iter().enumerate() {
    for (b, &ib) in idx.iter().enumerate() {
      j[[ia, ib]] += sign * inv[[a, b]];
    }
  }
  Ok(())
}

/// Sparse precision `J` of the LoGo construction.
pub fn logo_precision(cov: &Array2<f64>) -> Result<Array2<f64>> {
  let (corr, _) = linalg::cov_to_corr(cov);
  let graph = Tmfg::build(&corr.mapv(|v| v * v));

  let n = cov.nrows();
  let mut j = Array2::zeros((n, n));
  for clique in &graph.cliques {
    scatter_inverse(&mut j, cov, clique, 1.0)?;
  }
  for sep in &graph.separators {
    scatter_inverse(&mut j, cov, sep, -1.0)?;
  }
  Ok(j)
}

pub fn jlogo(cov: &Array2<f64>) -> Result<Array2<f64>> {
  let j = logo_precision(cov)?;
  Ok(linalg::inverse(&j).ok_or(OptimizationError::SingularCovariance)?)
}
