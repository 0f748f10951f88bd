//! # Agglomerative Linkage
//!
//! $$
//! d(i\cup j, k) = \alpha_i d_{ik} + \alpha_j d_{jk} + \beta d_{ij} + \gamma\lvert d_{ik}-d_{jk}\rvert
//! $$
//!
//! Lance-Williams updates on a dense distance matrix. Ward, centroid and
//! median operate on Euclidean distances and update through their squares.

use ndarray::Array2;

use super::tmfg::Tmfg;
use super::ClusterTree;
use super::Linkage;
use super::Merge;

fn update(method: Linkage, d_ik: f64, d_jk: f64, d_ij: f64, n_i: f64, n_j: f64, n_k: f64) -> f64 {
  match method {
    Linkage::Single => d_ik.min(d_jk),
    Linkage::Complete | Linkage::Dbht => d_ik.max(d_jk),
    Linkage::Average => (n_i * d_ik + n_j * d_jk) / (n_i + n_j),
    Linkage::Weighted => 0.5 * (d_ik + d_jk),
    Linkage::Centroid => {
      let n = n_i + n_j;
      ((n_i * d_ik * d_ik + n_j * d_jk * d_jk) / n - n_i * n_j * d_ij * d_ij / (n * n))
        .max(0.0)
        .sqrt()
    }
    Linkage::Median => (0.5 * d_ik * d_ik + 0.5 * d_jk * d_jk - 0.25 * d_ij * d_ij)
      .max(0.0)
      .sqrt(),
    Linkage::Ward => {
      let t = n_i + n_j + n_k;
      (((n_i + n_k) * d_ik * d_ik + (n_j + n_k) * d_jk * d_jk - n_k * d_ij * d_ij) / t)
        .max(0.0)
        .sqrt()
    }
  }
}

/// Build the dendrogram of `dist`. `codep` is the similarity used by the
/// TMFG of [`Linkage::Dbht`].
pub fn linkage(dist: &Array2<f64>, codep: &Array2<f64>, method: Linkage) -> ClusterTree {
  let n = dist.nrows();
  let mut d = if method == Linkage::Dbht {
    Tmfg::build(codep).shortest_paths(dist)
  } else {
    dist.clone()
  };

  // active cluster slots: slot index -> (node id, size)
  let mut active: Vec<Option<(usize, usize)>> = (0..n).map(|i| Some((i, 1))).collect();
  let mut merges = Vec::with_capacity(n.saturating_sub(1));

  for step in 0..n.saturating_sub(1) {
    let mut best: Option<(usize, usize, f64)> = None;
    for i in 0..n {
      if active[i].is_none() {
        continue;
      }
      for j in (i + 1)..n {
        if active[j].is_none() {
          continue;
        }
        if best.map_or(true, |(_, _, bd)| d[[i, j]] < bd) {
          best = Some((i, j, d[[i, j]]));
        }
      }
    }
    let Some((i, j, d_ij)) = best else {
      break;
    };
    let (Some((id_i, n_i)), Some((id_j, n_j))) = (active[i], active[j]) else {
      break;
    };

    for k in 0..n {
      if k == i || k == j {
        continue;
      }
      if let Some((_, n_k)) = active[k] {
        let v = update(
          method,
          d[[i, k]],
          d[[j, k]],
          d_ij,
          n_i as f64,
          n_j as f64,
          n_k as f64,
        );
        d[[i, k]] = v;
        d[[k, i]] = v;
      }
    }

    merges.push(Merge {
      left: id_i.min(id_j),
      right: id_i.max(id_j),
      distance: d_ij,
      size: n_i + n_j,
    });
    active[i] = Some((n + step, n_i + n_j));
    active[j] = None;
  }

  ClusterTree::new(n, merges)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  fn points_on_a_line() -> Array2<f64> {
    // positions 0, 1, 3, 7
    let x = [0.0f64, 1.0, 3.0, 7.0];
    Array2::from_shape_fn((4, 4), |(i, j)| (x[i] - x[j]).abs())
  }

  #[test]
  fn single_linkage_heights() {
    let d = points_on_a_line();
    let t = linkage(&d, &Array2::eye(4), Linkage::Single);
    let heights: Vec<f64> = t.merges().iter().map(|m| m.distance).collect();
    assert_eq!(heights, vec![1.0, 2.0, 4.0]);
    assert_eq!(t.merges()[0].left, 0);
    assert_eq!(t.merges()[0].right, 1);
    assert_eq!(t.merges()[2].size, 4);
  }

  #[test]
  fn complete_and_average_linkage_heights() {
    let d = points_on_a_line();
    let complete = linkage(&d, &Array2::eye(4), Linkage::Complete);
    assert_eq!(complete.merges()[1].distance, 3.0);
    assert_eq!(complete.merges()[2].distance, 7.0);

    let average = linkage(&d, &Array2::eye(4), Linkage::Average);
    assert_abs_diff_eq!(average.merges()[1].distance, 2.5, epsilon = 1e-12);
  }

  #[test]
  fn ward_matches_centroid_distance_for_singletons() {
    let d = array![[0.0, 1.0, 4.0], [1.0, 0.0, 3.0], [4.0, 3.0, 0.0]];
    let t = linkage(&d, &Array2::eye(3), Linkage::Ward);
    // ward: sqrt((2*16 + 2*9 - 1) / 3) = sqrt(49 / 3)
    assert_abs_diff_eq!(t.merges()[1].distance, (49.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    let c = linkage(&d, &Array2::eye(3), Linkage::Centroid);
    assert_abs_diff_eq!(c.merges()[1].distance, 3.5, epsilon = 1e-12);
  }
}
