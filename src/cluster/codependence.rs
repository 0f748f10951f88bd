//! # Codependence
//!
//! $$
//! d_{ij} = \sqrt{\tfrac12(1-\rho_{ij})},\quad
//! d_{ij} = \sqrt{1-\lvert\rho_{ij}\rvert},\quad
//! VI_{ij} = \frac{H_i + H_j - 2I_{ij}}{H_{ij}}
//! $$
//!
//! Pairwise similarity and the matching distance of asset return columns.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use ndarray::ArrayView1;
use statrs::function::gamma::ln_gamma;

use crate::error::PortfolioError;
use crate::error::Result;
use crate::stats::kde::percentile;

/// Codependence measure between two return series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Codependence {
  #[default]
  Pearson,
  Spearman,
  Kendall,
  AbsPearson,
  AbsSpearman,
  AbsKendall,
  /// Distance correlation.
  Distance,
  /// Normalised mutual information with variation of information distance.
  MutualInfo,
  /// Lower tail dependence index.
  Tail,
}

impl Codependence {
  pub const fn tag(self) -> &'static str {
    match self {
      Codependence::Pearson => "pearson",
      Codependence::Spearman => "spearman",
      Codependence::Kendall => "kendall",
      Codependence::AbsPearson => "abs_pearson",
      Codependence::AbsSpearman => "abs_spearman",
      Codependence::AbsKendall => "abs_kendall",
      Codependence::Distance => "distance",
      Codependence::MutualInfo => "mutual_info",
      Codependence::Tail => "tail",
    }
  }
}

impl fmt::Display for Codependence {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.tag())
  }
}

impl FromStr for Codependence {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    let key = s.trim().to_ascii_lowercase();
    [
      Codependence::Pearson,
      Codependence::Spearman,
      Codependence::Kendall,
      Codependence::AbsPearson,
      Codependence::AbsSpearman,
      Codependence::AbsKendall,
      Codependence::Distance,
      Codependence::MutualInfo,
      Codependence::Tail,
    ]
    .into_iter()
    .find(|c| c.tag() == key)
    .ok_or_else(|| PortfolioError::invalid(format!("unknown codependence method '{key}'")))
  }
}

/// Histogram bin count rule of the mutual information estimator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BinsRule {
  /// Knuth's Bayesian rule.
  #[default]
  Knuth,
  FreedmanDiaconis,
  Scott,
  /// Hacine-Gharbi and Ravier.
  Hgr,
  Fixed(usize),
}

impl FromStr for BinsRule {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    let key = s.trim();
    match key.to_ascii_uppercase().as_str() {
      "KN" => Ok(Self::Knuth),
      "FD" => Ok(Self::FreedmanDiaconis),
      "SC" => Ok(Self::Scott),
      "HGR" => Ok(Self::Hgr),
      _ => key
        .parse::<usize>()
        .ok()
        .filter(|&b| b > 0)
        .map(Self::Fixed)
        .ok_or_else(|| PortfolioError::invalid(format!("unknown bins rule '{key}'"))),
    }
  }
}

fn pearson(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
  let (mx, my) = (x.mean().unwrap_or(0.0), y.mean().unwrap_or(0.0));
  let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
  for (a, b) in x.iter().zip(y.iter()) {
    let (dx, dy) = (a - mx, b - my);
    sxy += dx * dy;
    sxx += dx * dx;
    syy += dy * dy;
  }
  let denom = (sxx * syy).sqrt();
  if denom < 1e-300 {
    0.0
  } else {
    (sxy / denom).clamp(-1.0, 1.0)
  }
}

/// Average ranks, ties share the mean rank.
fn ranks(x: ArrayView1<f64>) -> Vec<f64> {
  let n = x.len();
  let mut idx: Vec<usize> = (0..n).collect();
  idx.sort_by(|&a, &b| x[a].total_cmp(&x[b]));
  let mut out = vec![0.0; n];
  let mut i = 0;
  while i < n {
    let mut j = i;
    while j + 1 < n && x[idx[j + 1]] == x[idx[i]] {
      j += 1;
    }
    let rank = (i + j) as f64 / 2.0 + 1.0;
    for &k in &idx[i..=j] {
      out[k] = rank;
    }
    i = j + 1;
  }
  out
}

fn kendall(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
  kendalls::tau_b_with_comparator(&x.to_vec(), &y.to_vec(), |a: &f64, b: &f64| {
    a.partial_cmp(b).unwrap_or(Ordering::Greater)
  })
  .map(|(tau, _)| tau)
  .unwrap_or(0.0)
}

/// Double-centred distance matrix of one series and its distance variance.
struct Centered {
  a: Array2<f64>,
  dvar: f64,
}

impl Centered {
  fn new(x: ArrayView1<f64>) -> Self {
    let n = x.len();
    let d = Array2::from_shape_fn((n, n), |(i, j)| (x[i] - x[j]).abs());
    let row = d.sum_axis(ndarray::Axis(1)) / n as f64;
    let grand = row.sum() / n as f64;
    let a = Array2::from_shape_fn((n, n), |(i, j)| d[[i, j]] - row[i] - row[j] + grand);
    let dvar = (&a * &a).mean().unwrap_or(0.0);
    Self { a, dvar }
  }

  fn correlation(&self, other: &Centered) -> f64 {
    let dcov = (&self.a * &other.a).mean().unwrap_or(0.0).max(0.0);
    let denom = (self.dvar * other.dvar).sqrt();
    if denom <= 0.0 {
      0.0
    } else {
      (dcov / denom).sqrt().clamp(0.0, 1.0)
    }
  }
}

/// Distance correlation of Székely, Rizzo and Bakirov.
pub fn distance_correlation(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
  Centered::new(x).correlation(&Centered::new(y))
}

fn std_dev(x: ArrayView1<f64>) -> f64 {
  x.std(1.0)
}

fn knuth_bins(x: ArrayView1<f64>) -> usize {
  let n = x.len();
  let (lo, hi) = bounds(x);
  if hi <= lo {
    return 1;
  }
  let nf = n as f64;
  let max_bins = n.clamp(2, 200);
  let mut best = (1, f64::NEG_INFINITY);
  for m in 1..=max_bins {
    let counts = histogram(x, m, lo, hi);
    let mf = m as f64;
    let log_post = nf * mf.ln() + ln_gamma(0.5 * mf) - mf * ln_gamma(0.5) - ln_gamma(nf + 0.5 * mf)
      + counts.iter().map(|&c| ln_gamma(c as f64 + 0.5)).sum::<f64>();
    if log_post > best.1 {
      best = (m, log_post);
    }
  }
  best.0
}

fn width_bins(x: ArrayView1<f64>, width: f64) -> usize {
  let (lo, hi) = bounds(x);
  if !(width > 0.0) || hi <= lo {
    return 1;
  }
  (((hi - lo) / width).ceil() as usize).max(1)
}

fn hgr_bins(n: usize, corr: Option<f64>) -> usize {
  let nf = n as f64;
  let bins = match corr {
    Some(rho) if rho.abs() < 1.0 => {
      (2f64.powf(-0.5) * (1.0 + (1.0 + 24.0 * nf / (1.0 - rho * rho)).sqrt()).sqrt()).round()
    }
    _ => {
      let z = (8.0 + 324.0 * nf + 12.0 * (36.0 * nf + 729.0 * nf * nf).sqrt()).cbrt();
      (z / 6.0 + 2.0 / (3.0 * z) + 1.0 / 3.0).round()
    }
  };
  (bins as usize).max(1)
}

/// Bin count of the pair `(x, y)` under `rule`; data driven rules are capped
/// at the number of observations.
pub fn n_bins(x: ArrayView1<f64>, y: ArrayView1<f64>, rule: BinsRule) -> usize {
  let n = x.len() as f64;
  let bins = match rule {
    BinsRule::Knuth => knuth_bins(x),
    BinsRule::FreedmanDiaconis => {
      let mut sorted = x.to_vec();
      sorted.sort_by(f64::total_cmp);
      let iqr = percentile(&sorted, 0.75) - percentile(&sorted, 0.25);
      width_bins(x, 2.0 * iqr * n.powf(-1.0 / 3.0))
    }
    BinsRule::Scott => width_bins(x, 3.49 * std_dev(x) * n.powf(-1.0 / 3.0)),
    BinsRule::Hgr => hgr_bins(x.len(), Some(pearson(x, y)).filter(|r| 1.0 - r.abs() > 1e-8)),
    BinsRule::Fixed(b) => return b.max(1),
  };
  bins.min(x.len().max(1))
}

fn bounds(x: ArrayView1<f64>) -> (f64, f64) {
  x.iter()
    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

fn bin_of(v: f64, bins: usize, lo: f64, hi: f64) -> usize {
  if hi <= lo {
    return 0;
  }
  (((v - lo) / (hi - lo) * bins as f64) as usize).min(bins - 1)
}

fn histogram(x: ArrayView1<f64>, bins: usize, lo: f64, hi: f64) -> Vec<usize> {
  let mut counts = vec![0; bins];
  for &v in x {
    counts[bin_of(v, bins, lo, hi)] += 1;
  }
  counts
}

fn entropy(counts: &[usize], total: f64) -> f64 {
  counts
    .iter()
    .filter(|&&c| c > 0)
    .map(|&c| {
      let p = c as f64 / total;
      -p * p.ln()
    })
    .sum()
}

/// Normalised mutual information and variation of information of a pair.
pub fn mutual_information(x: ArrayView1<f64>, y: ArrayView1<f64>, bins: usize) -> (f64, f64) {
  let total = x.len() as f64;
  let (xlo, xhi) = bounds(x);
  let (ylo, yhi) = bounds(y);
  let mut joint = vec![0usize; bins * bins];
  for (&a, &b) in x.iter().zip(y.iter()) {
    joint[bin_of(a, bins, xlo, xhi) * bins + bin_of(b, bins, ylo, yhi)] += 1;
  }

  let hx = entropy(&histogram(x, bins, xlo, xhi), total);
  let hy = entropy(&histogram(y, bins, ylo, yhi), total);
  let hxy = entropy(&joint, total);
  let mi = (hx + hy - hxy).max(0.0);

  let nmi = if hx.min(hy) > 0.0 {
    (mi / hx.min(hy)).min(1.0)
  } else {
    0.0
  };
  let vi = if hxy > 0.0 {
    ((hx + hy - 2.0 * mi) / hxy).clamp(0.0, 1.0)
  } else {
    0.0
  };
  (nmi, vi)
}

/// Lower tail dependence index at level `alpha`.
pub fn lower_tail_dependence(x: ArrayView1<f64>, y: ArrayView1<f64>, alpha: f64) -> f64 {
  let t = x.len();
  let k = ((t as f64 * alpha).ceil() as usize).clamp(1, t);
  let kth = |v: ArrayView1<f64>| {
    let mut s = v.to_vec();
    s.sort_by(f64::total_cmp);
    s[k - 1]
  };
  let (qx, qy) = (kth(x), kth(y));
  let joint = x
    .iter()
    .zip(y.iter())
    .filter(|(&a, &b)| a <= qx && b <= qy)
    .count();
  (joint as f64 / k as f64).min(1.0)
}

/// Codependence and distance matrices of the columns of `returns`.
pub fn codependence_matrix(
  returns: &Array2<f64>,
  method: Codependence,
  bins: BinsRule,
  tail_alpha: f64,
) -> Result<(Array2<f64>, Array2<f64>)> {
  let n = returns.ncols();
  if returns.iter().any(|v| !v.is_finite()) {
    return Err(PortfolioError::insufficient("returns contain non-finite values"));
  }

  let ranked: Option<Vec<Vec<f64>>> = matches!(method, Codependence::Spearman | Codependence::AbsSpearman)
    .then(|| (0..n).map(|j| ranks(returns.column(j))).collect());

  let centered: Option<Vec<Centered>> = (method == Codependence::Distance)
    .then(|| (0..n).map(|j| Centered::new(returns.column(j))).collect());
  // Only HGR depends on the pair; other rules are fixed per column.
  let column_bins: Option<Vec<usize>> = (method == Codependence::MutualInfo && bins != BinsRule::Hgr)
    .then(|| (0..n).map(|j| n_bins(returns.column(j), returns.column(j), bins)).collect());

  let mut codep = Array2::<f64>::eye(n);
  let mut dist = Array2::<f64>::zeros((n, n));
  for i in 0..n {
    for j in (i + 1)..n {
      let (x, y) = (returns.column(i), returns.column(j));
      let (c, d) = match method {
        Codependence::Pearson | Codependence::Spearman | Codependence::Kendall => {
          let rho = correlation(method, &ranked, x, y, i, j);
          (rho, (0.5 * (1.0 - rho)).max(0.0).sqrt())
        }
        Codependence::AbsPearson | Codependence::AbsSpearman | Codependence::AbsKendall => {
          let rho = correlation(method, &ranked, x, y, i, j).abs();
          (rho, (1.0 - rho).max(0.0).sqrt())
        }
        Codependence::Distance => {
          let dc = match &centered {
            Some(c) => c[i].correlation(&c[j]),
            None => distance_correlation(x, y),
          };
          (dc, (1.0 - dc).max(0.0).sqrt())
        }
        Codependence::MutualInfo => {
          let b = column_bins.as_ref().map_or_else(|| n_bins(x, y, bins), |c| c[i]);
          mutual_information(x, y, b)
        }
        Codependence::Tail => {
          let lambda = lower_tail_dependence(x, y, tail_alpha);
          (lambda, -lambda.max(1e-8).ln())
        }
      };
      codep[[i, j]] = c;
      codep[[j, i]] = c;
      dist[[i, j]] = d;
      dist[[j, i]] = d;
    }
  }
  Ok((codep, dist))
}

fn correlation(
  method: Codependence,
  ranked: &Option<Vec<Vec<f64>>>,
  x: ArrayView1<f64>,
  y: ArrayView1<f64>,
  i: usize,
  j: usize,
) -> f64 {
  match (method, ranked) {
    (Codependence::Kendall | Codependence::AbsKendall, _) => kendall(x, y),
    (_, Some(r)) => pearson(ArrayView1::from(&r[i]), ArrayView1::from(&r[j])),
    _ => pearson(x, y),
  }
}
