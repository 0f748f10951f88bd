//! # Market Data Provider
//!
//! $$
//! \text{symbol} \times [t_0, t_1] \mapsto \{(t_k, P_{t_k})\}_k
//! $$
//!
//! Collaborator contract for price history and per-asset properties.
//! Implementations own their network timeouts and report missing symbols as
//! [`ProviderError::SymbolNotFound`] so the preprocessor can exclude them.

use chrono::NaiveDate;
use impl_new_derive::ImplNew;

use crate::error::ProviderError;

pub mod csv;
pub mod memory;
#[cfg(feature = "yahoo")]
pub mod yahoo;

pub use self::csv::CsvProvider;
pub use self::memory::InMemoryProvider;
#[cfg(feature = "yahoo")]
pub use self::yahoo::YahooProvider;

/// Single closing price observation.
#[derive(ImplNew, Clone, Copy, Debug, PartialEq)]
pub struct PricePoint {
  pub date: NaiveDate,
  pub close: f64,
}

/// Source of historical prices and scalar asset properties.
pub trait MarketDataProvider {
  /// Closing prices of `symbol` between `start` and `end` (inclusive), in date order.
  fn get_prices(
    &self,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<Vec<PricePoint>, ProviderError>;

  /// Scalar property of `symbol`, e.g. market capitalisation.
  fn get_property(&self, symbol: &str, property: &str) -> Result<f64, ProviderError>;
}

impl<T: MarketDataProvider + ?Sized> MarketDataProvider for &T {
  fn get_prices(
    &self,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<Vec<PricePoint>, ProviderError> {
    (**self).get_prices(symbol, start, end)
  }

  fn get_property(&self, symbol: &str, property: &str) -> Result<f64, ProviderError> {
    (**self).get_property(symbol, property)
  }
}

impl<T: MarketDataProvider + ?Sized> MarketDataProvider for Box<T> {
  fn get_prices(
    &self,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<Vec<PricePoint>, ProviderError> {
    (**self).get_prices(symbol, start, end)
  }

  fn get_property(&self, symbol: &str, property: &str) -> Result<f64, ProviderError> {
    (**self).get_property(symbol, property)
  }
}
