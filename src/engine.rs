//! # Portfolio Engine
//!
//! $$
//! \text{prices} \to \mathbf{R} \to (\mu, \Sigma) \to \mathbf{w}
//! $$
//!
//! Single entry point that runs the preprocessing pipeline against a
//! [`MarketDataProvider`] and dispatches to the allocation families.

use tracing::info;

use crate::error::Result;
use crate::moments::MomentConfig;
use crate::moments::MomentEstimates;
use crate::optimizers;
use crate::optimizers::BlackLittermanConfig;
use crate::optimizers::FrontierPoint;
use crate::optimizers::HierarchicalConfig;
use crate::optimizers::HierarchicalModel;
use crate::optimizers::MeanRiskConfig;
use crate::optimizers::Method;
use crate::optimizers::Portfolio;
use crate::optimizers::RelaxedRiskParityConfig;
use crate::optimizers::RiskParityConfig;
use crate::provider::MarketDataProvider;
use crate::returns;
use crate::returns::AssetUniverse;
use crate::returns::ReturnMatrix;
use crate::returns::ReturnsConfig;
use crate::returns::Window;

/// Orchestrates data fetch, preprocessing, moment estimation and optimisation.
#[derive(Clone, Debug)]
pub struct PortfolioEngine<P: MarketDataProvider> {
  provider: P,
  returns_config: ReturnsConfig,
  moment_config: MomentConfig,
  annual_risk_free: Option<f64>,
}

impl<P: MarketDataProvider> PortfolioEngine<P> {
  pub fn new(provider: P) -> Self {
    Self {
      provider,
      returns_config: ReturnsConfig::default(),
      moment_config: MomentConfig::default(),
      annual_risk_free: None,
    }
  }

  pub fn with_returns_config(mut self, config: ReturnsConfig) -> Self {
    self.returns_config = config;
    self
  }

  pub fn with_moment_config(mut self, config: MomentConfig) -> Self {
    self.moment_config = config;
    self
  }

  /// Annual risk free rate; replaces the per-period rate of every config.
  pub fn with_risk_free(mut self, annual: f64) -> Self {
    self.annual_risk_free = Some(annual);
    self
  }

  pub fn provider(&self) -> &P {
    &self.provider
  }

  pub fn returns_config(&self) -> &ReturnsConfig {
    &self.returns_config
  }

  /// Annual rate scaled to the return frequency, falling back to `fallback`.
  fn risk_free(&self, fallback: f64) -> f64 {
    self
      .annual_risk_free
      .map_or(fallback, |rf| rf / self.returns_config.frequency.periods_per_year())
  }

  fn prepare(
    &self,
    universe: &AssetUniverse,
    window: &Window,
    config: &ReturnsConfig,
  ) -> Result<(ReturnMatrix, MomentEstimates)> {
    self.moment_config.validate()?;
    let returns = returns::prepare_returns(&self.provider, universe, window, config)?;
    let moments = MomentEstimates::estimate(returns.values(), &self.moment_config)?;
    Ok((returns, moments))
  }

  /// Naive weights ignore the configured estimator; sample moments are kept
  /// for reporting.
  fn prepare_naive(
    &self,
    universe: &AssetUniverse,
    window: &Window,
  ) -> Result<(ReturnMatrix, MomentEstimates)> {
    let config = self.returns_config.for_naive();
    let returns = returns::prepare_returns(&self.provider, universe, window, &config)?;
    let moments = MomentEstimates::estimate(returns.values(), &MomentConfig::default())?;
    Ok((returns, moments))
  }

  fn finish(
    returns: ReturnMatrix,
    moments: MomentEstimates,
    weights: optimizers::Weights,
    method: Method,
  ) -> Result<Portfolio> {
    info!(%method, assets = weights.len(), "portfolio constructed");
    Portfolio::new(returns, moments, weights, method)
  }

  /// `value / n` on every symbol that survives preprocessing.
  pub fn equal_weight(&self, universe: &AssetUniverse, window: &Window, value: f64) -> Result<Portfolio> {
    let (returns, moments) = self.prepare_naive(universe, window)?;
    let weights = optimizers::equal_weighting(returns.symbols(), value)?;
    Self::finish(returns, moments, weights, Method::EqualWeight)
  }

  /// Weights proportional to `property` as reported by the provider.
  pub fn property_weight(
    &self,
    universe: &AssetUniverse,
    window: &Window,
    property: &str,
    value: f64,
  ) -> Result<Portfolio> {
    let (returns, moments) = self.prepare_naive(universe, window)?;
    let properties = returns
      .symbols()
      .iter()
      .map(|s| self.provider.get_property(s, property))
      .collect::<Result<Vec<f64>, _>>()?;
    let weights = optimizers::property_weighting(returns.symbols(), &properties, value)?;
    Self::finish(returns, moments, weights, Method::PropertyWeight)
  }

  pub fn mean_risk(
    &self,
    universe: &AssetUniverse,
    window: &Window,
    config: &MeanRiskConfig,
  ) -> Result<Portfolio> {
    let config = MeanRiskConfig {
      risk_free: self.risk_free(config.risk_free),
      ..config.clone()
    };
    config.validate()?;
    let (returns, moments) = self.prepare(universe, window, &self.returns_config)?;
    let weights = optimizers::mean_risk(&returns, &moments, &config)?;
    Self::finish(returns, moments, weights, Method::MeanRisk)
  }

  /// Minimum-risk frontier of `points` portfolios; unreachable targets are skipped.
  pub fn efficient_frontier(
    &self,
    universe: &AssetUniverse,
    window: &Window,
    config: &MeanRiskConfig,
    points: usize,
  ) -> Result<Vec<FrontierPoint>> {
    let config = MeanRiskConfig {
      risk_free: self.risk_free(config.risk_free),
      ..config.clone()
    };
    config.validate()?;
    let (returns, moments) = self.prepare(universe, window, &self.returns_config)?;
    optimizers::efficient_frontier(&returns, &moments, &config, points)
  }

  pub fn risk_parity(
    &self,
    universe: &AssetUniverse,
    window: &Window,
    config: &RiskParityConfig,
  ) -> Result<Portfolio> {
    config.validate()?;
    let (returns, moments) = self.prepare(universe, window, &self.returns_config)?;
    let weights = optimizers::risk_parity(&returns, &moments, config)?;
    Self::finish(returns, moments, weights, Method::RiskParity)
  }

  pub fn relaxed_risk_parity(
    &self,
    universe: &AssetUniverse,
    window: &Window,
    config: &RelaxedRiskParityConfig,
  ) -> Result<Portfolio> {
    config.validate()?;
    let (returns, moments) = self.prepare(universe, window, &self.returns_config)?;
    let weights = optimizers::relaxed_risk_parity(&returns, &moments, config)?;
    Self::finish(returns, moments, weights, Method::RelaxedRiskParity)
  }

  /// HRP, HERC or NCO depending on `config.model`.
  pub fn hierarchical(
    &self,
    universe: &AssetUniverse,
    window: &Window,
    config: &HierarchicalConfig,
  ) -> Result<Portfolio> {
    let config = HierarchicalConfig {
      risk_free: self.risk_free(config.risk_free),
      ..config.clone()
    };
    config.validate()?;
    let (returns, moments) = self.prepare(universe, window, &self.returns_config)?;
    let weights = optimizers::hierarchical(&returns, &moments, &config)?;
    let method = match config.model {
      HierarchicalModel::Hrp => Method::Hrp,
      HierarchicalModel::Herc => Method::Herc,
      HierarchicalModel::Nco => Method::Nco,
    };
    Self::finish(returns, moments, weights, method)
  }

  pub fn black_litterman(
    &self,
    universe: &AssetUniverse,
    window: &Window,
    config: &BlackLittermanConfig,
  ) -> Result<Portfolio> {
    let config = BlackLittermanConfig {
      risk_free: self.risk_free(config.risk_free),
      ..config.clone()
    };
    config.validate()?;
    config.views.check_symbols(universe.symbols())?;
    let (returns, moments) = self.prepare(universe, window, &self.returns_config)?;
    let weights = optimizers::black_litterman(&returns, &moments, &config)?;
    Self::finish(returns, moments, weights, Method::BlackLitterman)
  }
}
