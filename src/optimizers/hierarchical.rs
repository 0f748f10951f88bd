//! # Hierarchical Allocation
//!
//! $$
//! \alpha = 1 - \frac{\mathcal{R}_L}{\mathcal{R}_L + \mathcal{R}_R},\qquad
//! \mathbf{w}_L \leftarrow \alpha\,\mathbf{w}_L,\quad \mathbf{w}_R \leftarrow (1-\alpha)\,\mathbf{w}_R
//! $$
//!
//! Hierarchical Risk Parity, Hierarchical Equal Risk Contribution and Nested
//! Clustered Optimization on top of the asset dendrogram.

use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use tracing::debug;

use super::mean_risk;
use super::mean_risk::MeanRiskConfig;
use super::risk_parity;
use super::risk_parity::RiskParityConfig;
use super::types::Budget;
use super::types::Deadline;
use super::types::Objective;
use super::types::SolverSettings;
use super::types::Weights;
use crate::cluster;
use crate::cluster::ClusterConfig;
use crate::cluster::Clustering;
use crate::error::PortfolioError;
use crate::error::Result;
use crate::moments::MomentEstimates;
use crate::returns::ReturnMatrix;
use crate::risk;
use crate::risk::RiskMeasure;
use crate::risk::RiskParams;

/// Hierarchical allocation model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HierarchicalModel {
  #[default]
  Hrp,
  Herc,
  Nco,
}

impl fmt::Display for HierarchicalModel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      HierarchicalModel::Hrp => "HRP",
      HierarchicalModel::Herc => "HERC",
      HierarchicalModel::Nco => "NCO",
    })
  }
}

impl FromStr for HierarchicalModel {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_uppercase().as_str() {
      "HRP" => Ok(Self::Hrp),
      "HERC" => Ok(Self::Herc),
      "NCO" => Ok(Self::Nco),
      other => Err(PortfolioError::invalid(format!(
        "unknown hierarchical model '{other}'"
      ))),
    }
  }
}

/// Settings of the hierarchical allocators.
#[derive(Clone, Debug)]
pub struct HierarchicalConfig {
  pub model: HierarchicalModel,
  pub cluster: ClusterConfig,
  pub measure: RiskMeasure,
  pub risk_params: RiskParams,
  /// Objective of the NCO sub-problems.
  pub objective: Objective,
  pub risk_aversion: f64,
  /// Per-period risk free rate of the NCO Sharpe objective.
  pub risk_free: f64,
  pub value: f64,
  pub solver: SolverSettings,
}

impl Default for HierarchicalConfig {
  fn default() -> Self {
    Self {
      model: HierarchicalModel::Hrp,
      cluster: ClusterConfig::default(),
      measure: RiskMeasure::MV,
      risk_params: RiskParams::default(),
      objective: Objective::MinRisk,
      risk_aversion: 1.0,
      risk_free: 0.0,
      value: 1.0,
      solver: SolverSettings::default(),
    }
  }
}

impl HierarchicalConfig {
  pub fn validate(&self) -> Result<()> {
    self.cluster.validate()?;
    self.risk_params.validate()?;
    Budget::long_only(self.value).validate()?;
    self.solver.validate()?;
    if self.model == HierarchicalModel::Nco {
      if self.objective == Objective::Erc {
        self.risk_parity_config().validate()?;
      } else {
        self.mean_risk_config().validate()?;
      }
    } else if self.objective == Objective::Erc {
      return Err(PortfolioError::invalid(format!(
        "{} does not take an objective",
        self.model
      )));
    }
    Ok(())
  }

  fn mean_risk_config(&self) -> MeanRiskConfig {
    MeanRiskConfig {
      measure: self.measure,
      objective: self.objective,
      risk_params: self.risk_params,
      risk_aversion: self.risk_aversion,
      risk_free: self.risk_free,
      budget: Budget::default(),
      target_return: None,
      target_risk: None,
      solver: self.solver,
    }
  }

  fn risk_parity_config(&self) -> RiskParityConfig {
    RiskParityConfig {
      measure: self.measure,
      risk_params: self.risk_params,
      solver: self.solver,
      ..Default::default()
    }
  }
}

/// Risk inputs of one allocation run.
struct RiskInputs<'a> {
  returns: &'a Array2<f64>,
  cov: &'a Array2<f64>,
  measure: RiskMeasure,
  params: &'a RiskParams,
}

impl RiskInputs<'_> {
  /// Risk of the sub-portfolio `w` over the assets `idx`, floored at a tiny
  /// positive number so splits stay in `[0, 1]`.
  fn subset_risk(&self, idx: &[usize], w: &Array1<f64>) -> Result<f64> {
    let returns = self.returns.select(Axis(1), idx);
    let cov = Array2::from_shape_fn((idx.len(), idx.len()), |(i, j)| self.cov[[idx[i], idx[j]]]);
    let value = risk::risk(w, &cov, &returns, self.measure, self.params)?;
    Ok(value.max(1e-16))
  }

  /// Inverse-risk weights within `idx`.
  fn inverse_risk(&self, idx: &[usize]) -> Result<Array1<f64>> {
    let inv = idx
      .iter()
      .map(|&i| Ok(1.0 / self.subset_risk(&[i], &Array1::ones(1))?))
      .collect::<Result<Array1<f64>>>()?;
    let total = inv.sum();
    Ok(inv / total)
  }

  /// Risk of the inverse-risk portfolio of `idx`.
  fn cluster_risk(&self, idx: &[usize]) -> Result<f64> {
    let w = self.inverse_risk(idx)?;
    self.subset_risk(idx, &w)
  }
}

fn split(risk_left: f64, risk_right: f64) -> f64 {
  1.0 - risk_left / (risk_left + risk_right)
}

fn hrp(clustering: &Clustering, inputs: &RiskInputs, deadline: &Deadline) -> Result<Array1<f64>> {
  let tree = &clustering.tree;
  let mut w = Array1::ones(tree.n_leaves());
  let mut stack = vec![tree.root()];
  while let Some(node) = stack.pop() {
    let Some((l, r)) = tree.children(node) else {
      continue;
    };
    let (left, right) = (tree.leaves(l), tree.leaves(r));
    let alpha = split(inputs.cluster_risk(&left)?, inputs.cluster_risk(&right)?);
    for &i in &left {
      w[i] *= alpha;
    }
    for &i in &right {
      w[i] *= 1.0 - alpha;
    }
    stack.push(l);
    stack.push(r);
    deadline.check()?;
  }
  Ok(w)
}

fn herc(clustering: &Clustering, inputs: &RiskInputs, deadline: &Deadline) -> Result<Array1<f64>> {
  let tree = &clustering.tree;
  let clusters = tree.cluster_nodes(clustering.k);
  let members: Vec<Vec<usize>> = clusters.iter().map(|&c| tree.leaves(c)).collect();
  let risks = members
    .iter()
    .map(|m| inputs.cluster_risk(m))
    .collect::<Result<Vec<f64>>>()?;
  let mut label = vec![0usize; tree.n_leaves()];
  for (c, m) in members.iter().enumerate() {
    for &i in m {
      label[i] = c;
    }
  }
  let side_risk = |node: usize| {
    let mut seen = vec![false; clusters.len()];
    for leaf in tree.leaves(node) {
      seen[label[leaf]] = true;
    }
    seen
      .iter()
      .zip(&risks)
      .filter(|(s, _)| **s)
      .map(|(_, r)| r)
      .sum::<f64>()
  };

  let mut w = Array1::ones(tree.n_leaves());
  let mut stack = vec![tree.root()];
  while let Some(node) = stack.pop() {
    if clusters.contains(&node) {
      continue;
    }
    let Some((l, r)) = tree.children(node) else {
      continue;
    };
    let alpha = split(side_risk(l), side_risk(r));
    for i in tree.leaves(l) {
      w[i] *= alpha;
    }
    for i in tree.leaves(r) {
      w[i] *= 1.0 - alpha;
    }
    stack.push(l);
    stack.push(r);
  }
  deadline.check()?;

  for m in &members {
    let inner = inputs.inverse_risk(m)?;
    for (k, &i) in m.iter().enumerate() {
      w[i] *= inner[k];
    }
  }
  Ok(w)
}

fn nco(
  clustering: &Clustering,
  returns: &Array2<f64>,
  moments: &MomentEstimates,
  config: &HierarchicalConfig,
  deadline: &Deadline,
) -> Result<Array1<f64>> {
  let labels = clustering.tree.cut(clustering.k);
  let k = labels.iter().max().map_or(0, |m| m + 1);
  let members: Vec<Vec<usize>> = (0..k)
    .map(|c| (0..labels.len()).filter(|&i| labels[i] == c).collect())
    .collect();

  let optimise = |r: &Array2<f64>, m: &MomentEstimates| -> Result<Array1<f64>> {
    if m.n_assets() == 1 {
      return Ok(Array1::ones(1));
    }
    if config.objective == Objective::Erc {
      risk_parity::solve(r, &m.mean, &m.cov, &config.risk_parity_config())
    } else {
      mean_risk::solve(r, &m.mean, &m.cov, &config.mean_risk_config())
    }
  };

  let n = labels.len();
  let mut intra = Array2::zeros((n, k));
  for (c, idx) in members.iter().enumerate() {
    let w = optimise(&returns.select(Axis(1), idx), &moments.select(idx))?;
    for (j, &i) in idx.iter().enumerate() {
      intra[[i, c]] = w[j];
    }
    deadline.check()?;
  }

  let cluster_returns = returns.dot(&intra);
  let cluster_moments = MomentEstimates {
    mean: intra.t().dot(&moments.mean),
    cov: intra.t().dot(&moments.cov).dot(&intra),
  };
  let inter = optimise(&cluster_returns, &cluster_moments)?;
  Ok(intra.dot(&inter))
}

/// Hierarchical portfolio of `returns` together with the clustering it used.
pub fn hierarchical_with_clusters(
  returns: &ReturnMatrix,
  moments: &MomentEstimates,
  config: &HierarchicalConfig,
) -> Result<(Weights, Clustering)> {
  config.validate()?;
  let deadline = Deadline::new(config.solver.timeout);
  let clustering = cluster::cluster_assets(returns.values(), &config.cluster)?;
  deadline.check()?;

  let inputs = RiskInputs {
    returns: returns.values(),
    cov: &moments.cov,
    measure: config.measure,
    params: &config.risk_params,
  };
  let w = match config.model {
    HierarchicalModel::Hrp => hrp(&clustering, &inputs, &deadline)?,
    HierarchicalModel::Herc => herc(&clustering, &inputs, &deadline)?,
    HierarchicalModel::Nco => nco(&clustering, returns.values(), moments, config, &deadline)?,
  };

  let w = w.mapv(|v| v.max(0.0));
  let total = w.sum();
  if !(total > 0.0) {
    return Err(PortfolioError::degenerate(
      config.measure,
      "hierarchical allocation produced no positive weight",
    ));
  }
  debug!(model = %config.model, k = clustering.k, "hierarchical portfolio solved");
  let w = w * (config.value / total);
  Ok((Weights::new(returns.symbols(), &w), clustering))
}

/// Hierarchical portfolio of `returns`.
pub fn hierarchical(
  returns: &ReturnMatrix,
  moments: &MomentEstimates,
  config: &HierarchicalConfig,
) -> Result<Weights> {
  hierarchical_with_clusters(returns, moments, config).map(|(w, _)| w)
}
