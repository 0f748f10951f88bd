//! # Hierarchical Clustering
//!
//! $$
//! \rho_{ij} \ \to\ d_{ij} \ \to\ \text{dendrogram} \ \to\ \{C_1,\dots,C_k\}
//! $$
//!
//! Codependence, distance, agglomerative linkage, optimal leaf ordering and
//! cluster count selection used by the hierarchical allocators.

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use tracing::debug;

use crate::error::PortfolioError;
use crate::error::Result;

pub mod codependence;
pub mod gap;
pub mod linkage;
pub mod ordering;
pub mod tmfg;

pub use codependence::BinsRule;
pub use codependence::Codependence;

/// Agglomeration rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Linkage {
  #[default]
  Single,
  Complete,
  Average,
  Weighted,
  Centroid,
  Median,
  Ward,
  /// Complete linkage over shortest paths of the TMFG graph.
  Dbht,
}

impl Linkage {
  pub const fn tag(self) -> &'static str {
    match self {
      Linkage::Single => "single",
      Linkage::Complete => "complete",
      Linkage::Average => "average",
      Linkage::Weighted => "weighted",
      Linkage::Centroid => "centroid",
      Linkage::Median => "median",
      Linkage::Ward => "ward",
      Linkage::Dbht => "dbht",
    }
  }
}

impl fmt::Display for Linkage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.tag())
  }
}

impl FromStr for Linkage {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    let key = s.trim().to_ascii_lowercase();
    [
      Linkage::Single,
      Linkage::Complete,
      Linkage::Average,
      Linkage::Weighted,
      Linkage::Centroid,
      Linkage::Median,
      Linkage::Ward,
      Linkage::Dbht,
    ]
    .into_iter()
    .find(|l| l.tag() == key)
    .ok_or_else(|| PortfolioError::invalid(format!("unknown linkage method '{key}'")))
  }
}

/// Clustering settings shared by HRP, HERC and NCO.
#[derive(Clone, Debug)]
pub struct ClusterConfig {
  pub codependence: Codependence,
  pub linkage: Linkage,
  pub bins: BinsRule,
  /// Lower-tail significance of the tail dependence codependence.
  pub tail_alpha: f64,
  /// Reorder the dendrogram so adjacent leaves are as close as possible.
  pub leaf_order: bool,
  /// Upper bound of the gap statistic search.
  pub max_k: usize,
  /// Explicit cluster count; overrides the gap statistic.
  pub k: Option<usize>,
}

impl Default for ClusterConfig {
  fn default() -> Self {
    Self {
      codependence: Codependence::Pearson,
      linkage: Linkage::Single,
      bins: BinsRule::Knuth,
      tail_alpha: 0.05,
      leaf_order: true,
      max_k: 10,
      k: None,
    }
  }
}

impl ClusterConfig {
  pub fn validate(&self) -> Result<()> {
    if !(self.tail_alpha > 0.0 && self.tail_alpha < 1.0) {
      return Err(PortfolioError::invalid(format!(
        "tail_alpha must lie in (0, 1), got {}",
        self.tail_alpha
      )));
    }
    if self.max_k == 0 {
      return Err(PortfolioError::invalid("max_k must be positive"));
    }
    if self.k == Some(0) {
      return Err(PortfolioError::invalid("k must be positive"));
    }
    if let BinsRule::Fixed(0) = self.bins {
      return Err(PortfolioError::invalid("fixed bin count must be positive"));
    }
    Ok(())
  }
}

/// Single agglomeration step. Node ids below `n` are leaves; the merge at
/// position `i` creates node `n + i`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Merge {
  pub left: usize,
  pub right: usize,
  pub distance: f64,
  pub size: usize,
}

/// Binary dendrogram over `n` leaves.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterTree {
  n_leaves: usize,
  merges: Vec<Merge>,
}

impl ClusterTree {
  pub(crate) fn new(n_leaves: usize, merges: Vec<Merge>) -> Self {
    Self { n_leaves, merges }
  }

  pub fn n_leaves(&self) -> usize {
    self.n_leaves
  }

  pub fn merges(&self) -> &[Merge] {
    &self.merges
  }

  pub fn root(&self) -> usize {
    if self.merges.is_empty() {
      0
    } else {
      self.n_leaves + self.merges.len() - 1
    }
  }

  pub fn is_leaf(&self, node: usize) -> bool {
    node < self.n_leaves
  }

  pub fn children(&self, node: usize) -> Option<(usize, usize)> {
    let m = self.merges.get(node.checked_sub(self.n_leaves)?)?;
    Some((m.left, m.right))
  }

  pub fn height(&self, node: usize) -> f64 {
    node
      .checked_sub(self.n_leaves)
      .and_then(|i| self.merges.get(i))
      .map_or(0.0, |m| m.distance)
  }

  /// Leaves under `node`, left to right.
  pub fn leaves(&self, node: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(v) = stack.pop() {
      match self.children(v) {
        Some((l, r)) => {
          stack.push(r);
          stack.push(l);
        }
        None => out.push(v),
      }
    }
    out
  }

  /// Left-to-right leaf sequence of the whole dendrogram.
  pub fn leaf_order(&self) -> Vec<usize> {
    if self.n_leaves == 0 {
      return Vec::new();
    }
    self.leaves(self.root())
  }

  /// Root nodes of the `k` clusters obtained by undoing the last `k - 1` merges.
  pub fn cluster_nodes(&self, k: usize) -> Vec<usize> {
    let k = k.clamp(1, self.n_leaves.max(1));
    let kept = self.merges.len() + 1 - k;
    let mut roots: Vec<usize> = Vec::with_capacity(k);
    let mut stack = vec![self.root()];
    while let Some(v) = stack.pop() {
      let merged_after_cut = v >= self.n_leaves && v - self.n_leaves >= kept;
      match self.children(v) {
        Some((l, r)) if merged_after_cut => {
          stack.push(r);
          stack.push(l);
        }
        _ => roots.push(v),
      }
    }
    roots
  }

  /// Cluster label of each leaf for `k` clusters, numbered by first appearance.
  pub fn cut(&self, k: usize) -> Vec<usize> {
    let mut raw = vec![0usize; self.n_leaves];
    for (c, node) in self.cluster_nodes(k).into_iter().enumerate() {
      for leaf in self.leaves(node) {
        raw[leaf] = c;
      }
    }
    let mut relabel: Vec<Option<usize>> = vec![None; self.n_leaves.max(1)];
    let mut next = 0;
    raw
      .into_iter()
      .map(|c| {
        *relabel[c].get_or_insert_with(|| {
          next += 1;
          next - 1
        })
      })
      .collect()
  }
}

/// Output of the clustering pipeline.
#[derive(Clone, Debug)]
pub struct Clustering {
  pub codependence: Array2<f64>,
  pub distance: Array2<f64>,
  pub tree: ClusterTree,
  pub k: usize,
}

/// Run codependence, linkage, optional leaf ordering and cluster count
/// selection on a `T x N` return table.
pub fn cluster_assets(returns: &Array2<f64>, config: &ClusterConfig) -> Result<Clustering> {
  config.validate()?;
  let n = returns.ncols();
  if n < 2 {
    return Err(PortfolioError::insufficient(
      "hierarchical clustering needs at least 2 assets",
    ));
  }
  if returns.nrows() < 2 {
    return Err(PortfolioError::insufficient(
      "hierarchical clustering needs at least 2 periods",
    ));
  }

  let (codep, dist) =
    codependence::codependence_matrix(returns, config.codependence, config.bins, config.tail_alpha)?;
  let mut tree = linkage::linkage(&dist, &codep, config.linkage);
  if config.leaf_order {
    tree = ordering::optimal_leaf_ordering(&tree, &dist);
  }

  let k = match config.k {
    Some(k) => k.min(n),
    None => gap::two_diff_gap_stat(&tree, &dist, config.max_k),
  };
  debug!(
    codependence = %config.codependence,
    linkage = %config.linkage,
    k,
    "clustered assets"
  );

  Ok(Clustering {
    codependence: codep,
    distance: dist,
    tree,
    k,
  })
}
