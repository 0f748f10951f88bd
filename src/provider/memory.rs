use std::collections::HashMap;

use chrono::NaiveDate;

use super::MarketDataProvider;
use super::PricePoint;
use crate::error::ProviderError;

/// Provider backed by in-process price tables.
#[derive(Clone, Debug, Default)]
pub struct InMemoryProvider {
  prices: HashMap<String, Vec<PricePoint>>,
  properties: HashMap<(String, String), f64>,
}

impl InMemoryProvider {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a price history; points are kept sorted by date.
  pub fn with_prices(mut self, symbol: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
    points.sort_by_key(|p| p.date);
    self.prices.insert(symbol.into(), points);
    self
  }

  /// Register a price history from consecutive closes starting at `start`.
  ///
  /// Dates advance by one calendar day per close.
  pub fn with_closes(self, symbol: impl Into<String>, start: NaiveDate, closes: &[f64]) -> Self {
    let points = closes
      .iter()
      .zip(start.iter_days())
      .map(|(&close, date)| PricePoint::new(date, close))
      .collect();
    self.with_prices(symbol, points)
  }

  pub fn with_property(
    mut self,
    symbol: impl Into<String>,
    property: impl Into<String>,
    value: f64,
  ) -> Self {
    self
      .properties
      .insert((symbol.into(), property.into()), value);
    self
  }
}

impl MarketDataProvider for InMemoryProvider {
  fn get_prices(
    &self,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<Vec<PricePoint>, ProviderError> {
    let series = self
      .prices
      .get(symbol)
      .ok_or_else(|| ProviderError::SymbolNotFound(symbol.to_string()))?;

    Ok(
      series
        .iter()
        .filter(|p| p.date >= start && p.date <= end)
        .copied()
        .collect(),
    )
  }

  fn get_property(&self, symbol: &str, property: &str) -> Result<f64, ProviderError> {
    if !self.prices.contains_key(symbol) {
      return Err(ProviderError::SymbolNotFound(symbol.to_string()));
    }

    self
      .properties
      .get(&(symbol.to_string(), property.to_string()))
      .copied()
      .ok_or_else(|| ProviderError::PropertyNotFound {
        symbol: symbol.to_string(),
        property: property.to_string(),
      })
  }
}
