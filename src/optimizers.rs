//! # Portfolio Optimizers
//!
//! $$
//! \mathbf{w}^\* = \arg\min_{\mathbf{w}\in\mathcal{W}} \ f\big(\mu, \Sigma, \mathbf{R}; \mathbf{w}\big)
//! $$
//!
//! Allocation families operating on a preprocessed [`ReturnMatrix`] and its
//! [`MomentEstimates`](crate::moments::MomentEstimates).
//!
//! [`ReturnMatrix`]: crate::returns::ReturnMatrix

pub mod black_litterman;
pub mod frontier;
pub mod hierarchical;
pub mod mean_risk;
pub mod naive;
pub mod risk_parity;
pub(crate) mod solver;
pub mod types;

pub use black_litterman::black_litterman;
pub use black_litterman::posterior;
pub use black_litterman::BlackLittermanConfig;
pub use black_litterman::Posterior;
pub use black_litterman::Views;
pub use frontier::efficient_frontier;
pub use frontier::random_portfolios;
pub use frontier::FrontierPoint;
pub use hierarchical::hierarchical;
pub use hierarchical::hierarchical_with_clusters;
pub use hierarchical::HierarchicalConfig;
pub use hierarchical::HierarchicalModel;
pub use mean_risk::mean_risk;
pub use mean_risk::MeanRiskConfig;
pub use naive::equal_weighting;
pub use naive::property_weighting;
pub use risk_parity::relaxed_risk_parity;
pub use risk_parity::risk_parity;
pub use risk_parity::RelaxedRiskParityConfig;
pub use risk_parity::RiskParityConfig;
pub use risk_parity::RrpVersion;
pub use types::Budget;
pub use types::Method;
pub use types::Objective;
pub use types::Portfolio;
pub use types::SolverSettings;
pub use types::Weights;

#[cfg(test)]
pub(crate) mod fixtures {
  use ndarray::array;

  use crate::moments::MomentConfig;
  use crate::moments::MomentEstimates;
  use crate::returns::ReturnMatrix;

  /// Twelve periods of three loosely correlated assets.
  pub(crate) fn three_assets() -> (ReturnMatrix, MomentEstimates) {
    let values = array![
      [0.010, -0.004, 0.004],
      [-0.012, 0.010, -0.002],
      [0.020, 0.003, 0.010],
      [0.004, 0.008, -0.006],
      [-0.010, -0.006, 0.001],
      [0.015, 0.012, 0.007],
      [-0.002, -0.005, -0.004],
      [0.008, 0.005, 0.003],
      [0.011, -0.004, 0.006],
      [-0.007, 0.009, -0.001],
      [0.006, 0.002, 0.002],
      [-0.004, 0.001, -0.003]
    ];
    let moments = MomentEstimates::estimate(&values, &MomentConfig::default()).unwrap();
    let returns = ReturnMatrix::from_array(&["A", "B", "C"], values).unwrap();
    (returns, moments)
  }
}
