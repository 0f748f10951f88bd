//! # Errors
//!
//! $$
//! \text{call} \to \text{Ok}(\mathbf{w}) \ \vert\ \text{Err}(\text{config} \cup \text{data} \cup \text{solver})
//! $$
//!
//! Error taxonomy shared by the preprocessor, the risk engine and the optimizers.

use std::time::Duration;

use thiserror::Error;

use crate::risk::RiskMeasure;

/// Convenience alias used throughout the crate.
pub type Result<T, E = PortfolioError> = std::result::Result<T, E>;

/// Top level error of every public operation.
#[derive(Debug, Error)]
pub enum PortfolioError {
  /// Invalid tag, out-of-range parameter or inconsistent dimensions in a config.
  #[error("invalid parameter: {0}")]
  InvalidParameter(String),
  /// Not enough assets or periods left to estimate what the algorithm needs.
  #[error("insufficient data: {0}")]
  InsufficientData(String),
  /// No symbol survived preprocessing.
  #[error("asset universe is empty")]
  EmptyUniverse,
  /// A risk measure could not be evaluated to a finite number.
  #[error("degenerate {measure} risk: {reason}")]
  DegenerateRisk {
    measure: RiskMeasure,
    reason: String,
  },
  /// The solver could not produce a feasible portfolio.
  #[error(transparent)]
  Optimization(#[from] OptimizationError),
  /// Failure raised by the market data collaborator.
  #[error(transparent)]
  Provider(#[from] ProviderError),
}

impl PortfolioError {
  pub(crate) fn invalid(msg: impl Into<String>) -> Self {
    Self::InvalidParameter(msg.into())
  }

  pub(crate) fn insufficient(msg: impl Into<String>) -> Self {
    Self::InsufficientData(msg.into())
  }

  pub(crate) fn degenerate(measure: RiskMeasure, reason: impl Into<String>) -> Self {
    Self::DegenerateRisk {
      measure,
      reason: reason.into(),
    }
  }

  /// `true` when the error is a solver failure ("no solution").
  pub fn is_no_solution(&self) -> bool {
    matches!(self, Self::Optimization(_))
  }
}

/// Soft failures of the optimization layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizationError {
  /// Constraints could not be satisfied (e.g. conflicting target bounds).
  #[error("no solution: {constraint} violated by {violation:.6}")]
  Infeasible {
    constraint: &'static str,
    violation: f64,
  },
  /// The solver terminated without a usable iterate.
  #[error("no solution: solver did not converge ({0})")]
  NotConverged(String),
  /// A covariance matrix could not be inverted or factorised.
  #[error("no solution: covariance matrix is singular")]
  SingularCovariance,
  /// The wall-clock budget was exhausted.
  #[error("no solution: timed out after {0:?}")]
  Timeout(Duration),
}

/// Errors surfaced by a [`crate::provider::MarketDataProvider`].
#[derive(Debug, Error)]
pub enum ProviderError {
  #[error("symbol not found: {0}")]
  SymbolNotFound(String),
  #[error("property '{property}' not available for {symbol}")]
  PropertyNotFound {
    symbol: String,
    property: String,
  },
  #[error("request for {symbol} timed out after {elapsed:?}")]
  Timeout {
    symbol: String,
    elapsed: Duration,
  },
  #[error(transparent)]
  Other(#[from] anyhow::Error),
}

impl ProviderError {
  /// Errors the preprocessor recovers from by excluding the symbol.
  pub fn is_recoverable(&self) -> bool {
    matches!(self, Self::SymbolNotFound(_) | Self::Timeout { .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn optimization_errors_are_no_solution() {
    let err: PortfolioError = OptimizationError::SingularCovariance.into();
    assert!(err.is_no_solution());
    assert!(err.to_string().contains("singular"));
    assert!(!PortfolioError::EmptyUniverse.is_no_solution());
  }

  #[test]
  fn missing_symbols_and_timeouts_are_recoverable() {
    assert!(ProviderError::SymbolNotFound("XYZ".into()).is_recoverable());
    assert!(ProviderError::Timeout {
      symbol: "XYZ".into(),
      elapsed: Duration::from_secs(1)
    }
    .is_recoverable());
    assert!(!ProviderError::Other(anyhow::anyhow!("boom")).is_recoverable());
  }
}
