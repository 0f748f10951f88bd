//! # Dense Linear Algebra Helpers
//!
//! $$
//! \Sigma_{ij} = \sigma_i \sigma_j \rho_{ij}
//! $$
//!
//! Conversions between `ndarray` and `nalgebra` plus the covariance and
//! correlation utilities shared by the estimators and optimizers.

use nalgebra::DMatrix;
use nalgebra::SymmetricEigen;
use ndarray::Array1;
use ndarray::Array2;

pub(crate) fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
  DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

pub(crate) fn from_dmatrix(m: &DMatrix<f64>) -> Array2<f64> {
  Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

pub(crate) fn symmetrize(a: &Array2<f64>) -> Array2<f64> {
  (a + &a.t()) * 0.5
}

/// Eigenvalues in ascending order with matching eigenvector columns.
pub(crate) fn eigh(a: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
  let n = a.nrows();
  let eig = SymmetricEigen::new(to_dmatrix(&symmetrize(a)));
  let mut order: Vec<usize> = (0..n).collect();
  order.sort_by(|&i, &j| eig.eigenvalues[i].total_cmp(&eig.eigenvalues[j]));

  let values = Array1::from_iter(order.iter().map(|&k| eig.eigenvalues[k]));
  let vectors = Array2::from_shape_fn((n, n), |(i, c)| eig.eigenvectors[(i, order[c])]);
  (values, vectors)
}

/// `V diag(λ) Vᵀ`.
pub(crate) fn recompose(values: &Array1<f64>, vectors: &Array2<f64>) -> Array2<f64> {
  let scaled = vectors * &values.view().insert_axis(ndarray::Axis(0));
  symmetrize(&scaled.dot(&vectors.t()))
}

/// Symmetrise and clip negative eigenvalues to zero.
pub(crate) fn nearest_psd(a: &Array2<f64>) -> Array2<f64> {
  let sym = symmetrize(a);
  let (values, vectors) = eigh(&sym);
  let tol = 1e-12 * values.iter().fold(0.0f64, |m, v| m.max(v.abs())).max(1.0);
  if values.iter().all(|&v| v >= -tol) {
    return sym;
  }
  recompose(&values.mapv(|v| v.max(0.0)), &vectors)
}

pub(crate) fn inverse(a: &Array2<f64>) -> Option<Array2<f64>> {
  let inv = to_dmatrix(a).try_inverse()?;
  let out = from_dmatrix(&inv);
  out.iter().all(|v| v.is_finite()).then_some(out)
}

/// Split a covariance matrix into correlations and standard deviations.
pub(crate) fn cov_to_corr(cov: &Array2<f64>) -> (Array2<f64>, Array1<f64>) {
  let std = cov.diag().mapv(|v| v.max(0.0).sqrt());
  let n = std.len();
  let corr = Array2::from_shape_fn((n, n), |(i, j)| {
    if i == j {
      return 1.0;
    }
    let denom = std[i] * std[j];
    if denom > 1e-15 {
      (cov[[i, j]] / denom).clamp(-1.0, 1.0)
    } else {
      0.0
    }
  });
  (corr, std)
}

pub(crate) fn corr_to_cov(corr: &Array2<f64>, std: &Array1<f64>) -> Array2<f64> {
  let n = std.len();
  Array2::from_shape_fn((n, n), |(i, j)| corr[[i, j]] * std[i] * std[j])
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn eigh_sorts_ascending_and_recomposes() {
    let a = array![[2.0, 1.0], [1.0, 2.0]];
    let (values, vectors) = eigh(&a);
    assert_abs_diff_eq!(values[0], 1.0, epsilon = 1e-10);
    assert_abs_diff_eq!(values[1], 3.0, epsilon = 1e-10);
    assert_abs_diff_eq!(recompose(&values, &vectors), a, epsilon = 1e-10);
  }

  #[test]
  fn nearest_psd_clips_negative_spectrum() {
    let a = array![[1.0, 2.0], [2.0, 1.0]];
    let psd = nearest_psd(&a);
    let (values, _) = eigh(&psd);
    assert!(values.iter().all(|&v| v >= -1e-12));
    assert_abs_diff_eq!(psd[[0, 1]], psd[[1, 0]], epsilon = 1e-14);
  }

  #[test]
  fn correlation_round_trip_and_inverse() {
    let cov = array![[0.04, 0.006], [0.006, 0.09]];
    let (corr, std) = cov_to_corr(&cov);
    assert_abs_diff_eq!(corr[[0, 1]], 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(corr_to_cov(&corr, &std), cov, epsilon = 1e-14);

    let inv = inverse(&cov).unwrap();
    assert_abs_diff_eq!(cov.dot(&inv), Array2::eye(2), epsilon = 1e-10);
    assert!(inverse(&array![[1.0, 1.0], [1.0, 1.0]]).is_none());
  }
}
