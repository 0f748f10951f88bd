//! # portfolio-opt
//!
//! $$
//! \mathbf{w}^\* = \arg\min_{\mathbf{w}\in\mathcal{W}} \ \mathcal{R}(\mathbf{R}\mathbf{w})
//! $$
//!
//! Portfolio construction from historical prices: returns preprocessing,
//! moment estimation, a risk measure engine and the allocation families built
//! on top of it (naive, Mean-Risk, Risk Parity, hierarchical, Black-Litterman).

pub mod cluster;
pub mod engine;
pub mod error;
mod linalg;
pub mod moments;
pub mod optimizers;
pub mod provider;
pub mod report;
pub mod returns;
pub mod risk;
pub mod stats;

pub use engine::PortfolioEngine;
pub use error::OptimizationError;
pub use error::PortfolioError;
pub use error::ProviderError;
pub use error::Result;
pub use optimizers::Portfolio;
pub use provider::MarketDataProvider;
pub use returns::AssetUniverse;
pub use returns::ReturnMatrix;
pub use risk::RiskMeasure;
