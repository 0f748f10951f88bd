//! # Naive Allocations
//!
//! $$
//! w_i = \frac{v}{n}\qquad\text{or}\qquad w_i = v\,\frac{p_i}{\sum_j p_j}
//! $$
//!
//! Closed-form equal and property weighted portfolios.

use ndarray::Array1;
use tracing::debug;

use super::types::Weights;
use crate::error::PortfolioError;
use crate::error::Result;

fn check_value(value: f64) -> Result<()> {
  if value.is_finite() && value > 0.0 {
    Ok(())
  } else {
    Err(PortfolioError::invalid(format!(
      "value must be positive, got {value}"
    )))
  }
}

/// Split `value` evenly across `symbols`.
pub fn equal_weighting(symbols: &[String], value: f64) -> Result<Weights> {
  check_value(value)?;
  if symbols.is_empty() {
    return Err(PortfolioError::EmptyUniverse);
  }
  let n = symbols.len();
  Ok(Weights::new(symbols, &Array1::from_elem(n, value / n as f64)))
}

/// Split `value` in proportion to a per-asset property such as market cap.
pub fn property_weighting(symbols: &[String], properties: &[f64], value: f64) -> Result<Weights> {
  check_value(value)?;
  if symbols.is_empty() {
    return Err(PortfolioError::EmptyUniverse);
  }
  if properties.len() != symbols.len() {
    return Err(PortfolioError::invalid(format!(
      "{} properties for {} symbols",
      properties.len(),
      symbols.len()
    )));
  }
  if let Some((s, p)) = symbols
    .iter()
    .zip(properties)
    .find(|(_, p)| !(p.is_finite() && **p >= 0.0))
  {
    return Err(PortfolioError::invalid(format!(
      "property of {s} must be finite and non-negative, got {p}"
    )));
  }
  let total: f64 = properties.iter().sum();
  if total <= 0.0 {
    return Err(PortfolioError::invalid("properties sum to zero"));
  }

  debug!(assets = symbols.len(), total, "property weighting");
  let w: Array1<f64> = properties.iter().map(|p| value * p / total).collect();
  Ok(Weights::new(symbols, &w))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  fn symbols(s: &[&str]) -> Vec<String> {
    s.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn equal_weight_on_two_assets() {
    let w = equal_weighting(&symbols(&["A", "B"]), 1.0).unwrap();
    assert_eq!(w.get("A"), Some(0.5));
    assert_eq!(w.get("B"), Some(0.5));
  }

  #[test]
  fn equal_weight_is_exactly_one_over_n() {
    let w = equal_weighting(&symbols(&["A", "B", "C", "D", "E", "F", "G"]), 1.0).unwrap();
    for (_, v) in w.iter() {
      assert_abs_diff_eq!(v, 1.0 / 7.0, epsilon = 1e-9);
    }
    assert_abs_diff_eq!(w.sum(), 1.0, epsilon = 1e-9);
  }

  #[test]
  fn single_asset_gets_the_whole_value() {
    let w = equal_weighting(&symbols(&["SPY"]), 2.5).unwrap();
    assert_eq!(w.get("SPY"), Some(2.5));
    let w = property_weighting(&symbols(&["SPY"]), &[3.0e11], 1.0).unwrap();
    assert_eq!(w.get("SPY"), Some(1.0));
  }

  #[test]
  fn property_weight_is_proportional() {
    let w = property_weighting(&symbols(&["A", "B", "C"]), &[1.0, 3.0, 0.0], 2.0).unwrap();
    assert_abs_diff_eq!(w.get("A").unwrap(), 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(w.get("B").unwrap(), 1.5, epsilon = 1e-12);
    assert_eq!(w.get("C"), Some(0.0));
  }

  #[test]
  fn rejects_empty_and_bad_properties() {
    assert!(matches!(
      equal_weighting(&[], 1.0),
      Err(PortfolioError::EmptyUniverse)
    ));
    let s = symbols(&["A", "B"]);
    assert!(property_weighting(&s, &[1.0, -1.0], 1.0).is_err());
    assert!(property_weighting(&s, &[0.0, 0.0], 1.0).is_err());
    assert!(property_weighting(&s, &[1.0, f64::NAN], 1.0).is_err());
    assert!(property_weighting(&s, &[1.0], 1.0).is_err());
  }
}
