//! # Optimal Leaf Ordering
//!
//! $$
//! M(v; a, b) = \min_{m \in L,\ k \in R} M(L; a, m) + d_{mk} + M(R; k, b)
//! $$
//!
//! Flips the children of each dendrogram node so the sum of distances
//! between adjacent leaves is minimal. Bar-Joseph dynamic programme.

use ndarray::Array2;

use super::ClusterTree;
use super::Merge;

struct Table {
  cost: Array2<f64>,
  // inner endpoints (m, k) for a pair stored as (left-subtree leaf, right-subtree leaf)
  arg: Array2<(usize, usize)>,
  node_leaves: Vec<Vec<usize>>,
}

impl Table {
  fn build(tree: &ClusterTree, dist: &Array2<f64>) -> Self {
    let n = tree.n_leaves();
    let total = n + tree.merges().len();
    let mut node_leaves: Vec<Vec<usize>> = Vec::with_capacity(total);
    for i in 0..n {
      node_leaves.push(vec![i]);
    }
    let mut cost = Array2::from_elem((n, n), f64::INFINITY);
    let mut arg = Array2::from_elem((n, n), (0usize, 0usize));
    for i in 0..n {
      cost[[i, i]] = 0.0;
    }

    for merge in tree.merges() {
      let left = node_leaves[merge.left].clone();
      let right = node_leaves[merge.right].clone();
      for &a in &left {
        // best path from a through the left subtree to each right leaf k
        let reach: Vec<(f64, usize)> = right
          .iter()
          .map(|&k| {
            left
              .iter()
              .map(|&m| (cost[[a, m]] + dist[[m, k]], m))
              .fold((f64::INFINITY, a), |best, c| if c.0 < best.0 { c } else { best })
          })
          .collect();
        for &b in &right {
          let mut best = (f64::INFINITY, (a, b));
          for (idx, &k) in right.iter().enumerate() {
            let c = reach[idx].0 + cost[[k, b]];
            if c < best.0 {
              best = (c, (reach[idx].1, k));
            }
          }
          cost[[a, b]] = best.0;
          cost[[b, a]] = best.0;
          arg[[a, b]] = best.1;
          arg[[b, a]] = best.1;
        }
      }
      node_leaves.push(left.into_iter().chain(right).collect());
    }

    Self {
      cost,
      arg,
      node_leaves,
    }
  }

  fn order(&self, tree: &ClusterTree, node: usize, a: usize, b: usize, out: &mut Vec<usize>) {
    let Some((l, r)) = tree.children(node) else {
      out.push(node);
      return;
    };
    let (m, k) = self.arg[[a, b]];
    if self.node_leaves[l].contains(&a) {
      self.order(tree, l, a, m, out);
      self.order(tree, r, k, b, out);
    } else {
      self.order(tree, l, b, m, out);
      self.order(tree, r, k, a, out);
      let start = out.len() - self.node_leaves[node].len();
      out[start..].reverse();
    }
  }
}

/// Return `tree` with children swapped so [`ClusterTree::leaf_order`]
/// follows the optimal leaf ordering under `dist`.
pub fn optimal_leaf_ordering(tree: &ClusterTree, dist: &Array2<f64>) -> ClusterTree {
  let n = tree.n_leaves();
  let Some((l, r)) = tree.children(tree.root()) else {
    return tree.clone();
  };
  let table = Table::build(tree, dist);

  let mut best = (f64::INFINITY, (l, r));
  for &a in &table.node_leaves[l] {
    for &b in &table.node_leaves[r] {
      if table.cost[[a, b]] < best.0 {
        best = (table.cost[[a, b]], (a, b));
      }
    }
  }
  let (a, b) = best.1;
  let mut order = Vec::with_capacity(n);
  table.order(tree, tree.root(), a, b, &mut order);

  let mut position = vec![0usize; n];
  for (p, &leaf) in order.iter().enumerate() {
    position[leaf] = p;
  }
  // each subtree occupies a contiguous block of the order
  let first = |node: usize| {
    table.node_leaves[node]
      .iter()
      .map(|&x| position[x])
      .min()
      .unwrap_or(usize::MAX)
  };
  let merges = tree
    .merges()
    .iter()
    .map(|m| {
      if first(m.left) <= first(m.right) {
        *m
      } else {
        Merge {
          left: m.right,
          right: m.left,
          ..*m
        }
      }
    })
    .collect();

  ClusterTree::new(n, merges)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cluster::linkage::linkage;
  use crate::cluster::Linkage;

  fn path_length(order: &[usize], dist: &Array2<f64>) -> f64 {
    order.windows(2).map(|w| dist[[w[0], w[1]]]).sum()
  }

  #[test]
  fn reordering_never_lengthens_the_leaf_path() {
    let x = [0.0f64, 10.0, 1.0, 11.0, 5.0, 2.5];
    let d = Array2::from_shape_fn((6, 6), |(i, j)| (x[i] - x[j]).abs());
    for method in [Linkage::Single, Linkage::Average, Linkage::Ward] {
      let tree = linkage(&d, &Array2::eye(6), method);
      let ordered = optimal_leaf_ordering(&tree, &d);
      let before = path_length(&tree.leaf_order(), &d);
      let after = path_length(&ordered.leaf_order(), &d);
      assert!(after <= before + 1e-12, "{method}: {after} > {before}");
      let mut leaves = ordered.leaf_order();
      leaves.sort_unstable();
      assert_eq!(leaves, (0..6).collect::<Vec<_>>());
    }
  }

  #[test]
  fn points_on_a_line_are_sorted() {
    let x = [3.0f64, 0.0, 7.0, 1.0];
    let d = Array2::from_shape_fn((4, 4), |(i, j)| (x[i] - x[j]).abs());
    let tree = linkage(&d, &Array2::eye(4), Linkage::Single);
    let order = optimal_leaf_ordering(&tree, &d).leaf_order();
    let values: Vec<f64> = order.iter().map(|&i| x[i]).collect();
    // total span of a sorted line is max - min
    assert_eq!(path_length(&order, &d), 7.0);
    assert!(values.windows(2).all(|w| w[0] <= w[1]) || values.windows(2).all(|w| w[0] >= w[1]));
  }

  #[test]
  fn merge_heights_are_preserved() {
    let x = [0.0f64, 4.0, 1.0, 6.0, 2.0];
    let d = Array2::from_shape_fn((5, 5), |(i, j)| (x[i] - x[j]).abs());
    let tree = linkage(&d, &Array2::eye(5), Linkage::Complete);
    let ordered = optimal_leaf_ordering(&tree, &d);
    for (a, b) in tree.merges().iter().zip(ordered.merges()) {
      assert_eq!(a.distance, b.distance);
      assert_eq!(a.size, b.size);
    }
  }
}
