//! # Triangulated Maximally Filtered Graph
//!
//! $$
//! G = \arg\max_{G\ \text{planar, chordal}} \sum_{(i,j)\in G} s_{ij}
//! $$
//!
//! Greedy construction: start from the tetrahedron of the four strongest
//! vertices, then repeatedly insert the vertex with the largest gain into one
//! of the triangular faces. Every insertion adds a 4-clique whose separator
//! is the face it was inserted into.

use ndarray::Array2;

/// Planar filtered graph with its clique tree.
#[derive(Clone, Debug)]
pub struct Tmfg {
  n: usize,
  pub cliques: Vec<Vec<usize>>,
  pub separators: Vec<Vec<usize>>,
  pub edges: Vec<(usize, usize)>,
}

impl Tmfg {
  /// Build the graph from a symmetric similarity matrix.
  ///
  /// Fewer than four vertices form a single clique.
  pub fn build(similarity: &Array2<f64>) -> Self {
    let n = similarity.nrows();
    if n < 4 {
      let all: Vec<usize> = (0..n).collect();
      let edges = (0..n)
        .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
        .collect();
      return Self {
        n,
        cliques: vec![all],
        separators: Vec::new(),
        edges,
      };
    }

    let strength = |i: usize| -> f64 { (0..n).filter(|&j| j != i).map(|j| similarity[[i, j]]).sum() };
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| strength(b).total_cmp(&strength(a)).then(a.cmp(&b)));

    let seed = [order[0], order[1], order[2], order[3]];
    let mut cliques = vec![seed.to_vec()];
    let mut separators = Vec::new();
    let mut edges = Vec::with_capacity(3 * n - 6);
    for a in 0..4 {
      for b in (a + 1)..4 {
        edges.push((seed[a].min(seed[b]), seed[a].max(seed[b])));
      }
    }
    let mut faces: Vec<[usize; 3]> = vec![
      [seed[0], seed[1], seed[2]],
      [seed[0], seed[1], seed[3]],
      [seed[0], seed[2], seed[3]],
      [seed[1], seed[2], seed[3]],
    ];
    let mut remaining: Vec<usize> = order[4..].to_vec();

    let gain = |v: usize, f: &[usize; 3]| f.iter().map(|&u| similarity[[v, u]]).sum::<f64>();

    while !remaining.is_empty() {
      let mut best: Option<(usize, usize, f64)> = None;
      for (ri, &v) in remaining.iter().enumerate() {
        for (fi, face) in faces.iter().enumerate() {
          let g = gain(v, face);
          if best.map_or(true, |(_, _, bg)| g > bg) {
            best = Some((ri, fi, g));
          }
        }
      }
      let Some((ri, fi, _)) = best else {
        break;
      };

      let v = remaining.swap_remove(ri);
      let face = faces.swap_remove(fi);
      for &u in &face {
        edges.push((u.min(v), u.max(v)));
      }
      faces.push([face[0], face[1], v]);
      faces.push([face[0], face[2], v]);
      faces.push([face[1], face[2], v]);
      cliques.push(vec![face[0], face[1], face[2], v]);
      separators.push(face.to_vec());
    }

    Self {
      n,
      cliques,
      separators,
      edges,
    }
  }

  pub fn n_vertices(&self) -> usize {
    self.n
  }

  /// All-pairs shortest path lengths on the graph with edge lengths taken
  /// from `dist` (Floyd-Warshall).
  pub fn shortest_paths(&self, dist: &Array2<f64>) -> Array2<f64> {
    let n = self.n;
    let mut d = Array2::from_elem((n, n), f64::INFINITY);
    for i in 0..n {
      d[[i, i]] = 0.0;
    }
    for &(i, j) in &self.edges {
      d[[i, j]] = dist[[i, j]];
      d[[j, i]] = dist[[i, j]];
    }
    for k in 0..n {
      for i in 0..n {
        let dik = d[[i, k]];
        if !dik.is_finite() {
          continue;
        }
        for j in 0..n {
          let via = dik + d[[k, j]];
          if via < d[[i, j]] {
            d[[i, j]] = via;
          }
        }
      }
    }
    d
  }
}
