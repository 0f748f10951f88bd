//! # Two-Difference Gap Statistic
//!
//! $$
//! W_c = \sum_{C \in \mathcal{C}_c} \overline{d}_C,\qquad
//! \text{gap}_k = W_{k-1} + W_{k+1} - 2W_k
//! $$
//!
//! Picks the cluster count where the within-cluster dispersion curve bends
//! the most, searching `k ≤ min(max_k, ⌊√n⌋)`.

use ndarray::Array2;

use super::ClusterTree;

/// Sum over clusters of the mean pairwise distance, singletons excluded.
pub fn within_dispersion(tree: &ClusterTree, dist: &Array2<f64>, k: usize) -> f64 {
  tree
    .cluster_nodes(k)
    .into_iter()
    .map(|node| {
      let members = tree.leaves(node);
      let m = members.len();
      if m < 2 {
        return 0.0;
      }
      let mut sum = 0.0;
      for (p, &i) in members.iter().enumerate() {
        for &j in &members[p + 1..] {
          sum += dist[[i, j]];
        }
      }
      let mean = sum / (m * (m - 1) / 2) as f64;
      if mean.is_finite() {
        mean
      } else {
        0.0
      }
    })
    .sum()
}

/// Cluster count chosen by the two-difference gap statistic.
pub fn two_diff_gap_stat(tree: &ClusterTree, dist: &Array2<f64>, max_k: usize) -> usize {
  let n = tree.n_leaves();
  let w: Vec<f64> = (1..=n).map(|c| within_dispersion(tree, dist, c)).collect();
  let limit = max_k.min((n as f64).sqrt().floor() as usize);
  let gaps: Vec<f64> = w
    .windows(3)
    .map(|v| v[0] + v[2] - 2.0 * v[1])
    .take(limit)
    .collect();

  if gaps.is_empty() {
    return 1;
  }
  gaps
    .iter()
    .enumerate()
    .filter(|(_, g)| !g.is_nan())
    .fold(None, |best: Option<(usize, f64)>, (i, &g)| match best {
      Some((_, bg)) if bg >= g => best,
      _ => Some((i, g)),
    })
    .map_or(gaps.len(), |(i, _)| i + 2)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;
  use crate::cluster::linkage::linkage;
  use crate::cluster::Linkage;

  fn line(x: &[f64]) -> Array2<f64> {
    Array2::from_shape_fn((x.len(), x.len()), |(i, j)| (x[i] - x[j]).abs())
  }

  #[test]
  fn dispersion_of_one_cluster_is_the_mean_distance() {
    let d = line(&[0.0, 1.0, 3.0]);
    let tree = linkage(&d, &Array2::eye(3), Linkage::Single);
    assert_abs_diff_eq!(within_dispersion(&tree, &d, 1), 2.0, epsilon = 1e-12);
    assert_eq!(within_dispersion(&tree, &d, 3), 0.0);
  }

  #[test]
  fn finds_separated_groups() {
    // three tight groups far apart
    let x = [0.0, 0.1, 0.2, 10.0, 10.1, 10.2, 20.0, 20.1, 20.2];
    let d = line(&x);
    let tree = linkage(&d, &Array2::eye(9), Linkage::Average);
    assert_eq!(two_diff_gap_stat(&tree, &d, 10), 3);
  }

  #[test]
  fn tiny_trees_use_one_cluster() {
    let d = line(&[0.0, 1.0, 5.0]);
    let tree = linkage(&d, &Array2::eye(3), Linkage::Single);
    // floor(sqrt(3)) = 1 admits a single gap value
    assert_eq!(two_diff_gap_stat(&tree, &d, 10), 2);
    let d = line(&[0.0, 1.0]);
    let tree = linkage(&d, &Array2::eye(2), Linkage::Single);
    assert_eq!(two_diff_gap_stat(&tree, &d, 10), 1);
  }
}
