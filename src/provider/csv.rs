use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use anyhow::anyhow;
use anyhow::Context;
use chrono::NaiveDate;

use super::MarketDataProvider;
use super::PricePoint;
use crate::error::ProviderError;

const PROPERTIES_FILE: &str = "properties.csv";

/// Provider reading one `<SYMBOL>.csv` file per asset from a directory.
///
/// Price files need a `date` column (`%Y-%m-%d`) and a `close` column; an
/// `adj close`/`adj_close` column takes precedence when present. Properties
/// are read from an optional `properties.csv` with `symbol,property,value` rows.
#[derive(Clone, Debug)]
pub struct CsvProvider {
  root: PathBuf,
}

impl CsvProvider {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn read_prices(path: &Path) -> anyhow::Result<Vec<PricePoint>> {
    let mut reader = ::csv::Reader::from_path(path)
      .with_context(|| format!("failed to open price file {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let find = |names: &[&str]| {
      headers
        .iter()
        .position(|h| names.contains(&h.trim().to_ascii_lowercase().as_str()))
    };
    let date_col = find(&["date", "timestamp"])
      .ok_or_else(|| anyhow!("missing date column in {}", path.display()))?;
    let close_col = find(&["adj close", "adj_close", "adjclose"])
      .or_else(|| find(&["close"]))
      .ok_or_else(|| anyhow!("missing close column in {}", path.display()))?;

    let mut points = Vec::new();
    for (line, record) in reader.records().enumerate() {
      let record = record.with_context(|| format!("bad record {} in {}", line + 2, path.display()))?;
      let raw_date = record.get(date_col).unwrap_or_default().trim();
      let raw_close = record.get(close_col).unwrap_or_default().trim();
      // Blank closes are holidays or halts; alignment fills them later.
      if raw_close.is_empty() {
        continue;
      }
      let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{raw_date}' in {}", path.display()))?;
      let close: f64 = raw_close
        .parse()
        .with_context(|| format!("invalid close '{raw_close}' in {}", path.display()))?;
      points.push(PricePoint::new(date, close));
    }

    points.sort_by_key(|p| p.date);
    Ok(points)
  }

  fn read_properties(&self) -> anyhow::Result<HashMap<(String, String), f64>> {
    let path = self.root.join(PROPERTIES_FILE);
    let mut out = HashMap::new();
    if !path.exists() {
      return Ok(out);
    }

    let mut reader = ::csv::Reader::from_path(&path)
      .with_context(|| format!("failed to open {}", path.display()))?;
    for record in reader.records() {
      let record = record?;
      let (Some(symbol), Some(property), Some(value)) = (record.get(0), record.get(1), record.get(2))
      else {
        continue;
      };
      let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {symbol}/{property}"))?;
      out.insert((symbol.trim().to_string(), property.trim().to_string()), value);
    }
    Ok(out)
  }
}

impl MarketDataProvider for CsvProvider {
  fn get_prices(
    &self,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<Vec<PricePoint>, ProviderError> {
    let path = self.root.join(format!("{symbol}.csv"));
    if !path.is_file() {
      return Err(ProviderError::SymbolNotFound(symbol.to_string()));
    }

    let points = Self::read_prices(&path)?;
    Ok(
      points
        .into_iter()
        .filter(|p| p.date >= start && p.date <= end)
        .collect(),
    )
  }

  fn get_property(&self, symbol: &str, property: &str) -> Result<f64, ProviderError> {
    let properties = self.read_properties()?;
    properties
      .get(&(symbol.to_string(), property.to_string()))
      .copied()
      .ok_or_else(|| ProviderError::PropertyNotFound {
        symbol: symbol.to_string(),
        property: property.to_string(),
      })
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use super::*;

  fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
  }

  #[test]
  fn reads_adjusted_close_and_skips_blank_rows() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
      dir.path().join("AAA.csv"),
      "Date,Close,Adj Close\n2024-03-04,10,9.5\n2024-03-01,11,10.5\n2024-03-05,12,\n",
    )
    .unwrap();

    let provider = CsvProvider::new(dir.path());
    let prices = provider.get_prices("AAA", day(1), day(31)).unwrap();

    assert_eq!(prices.len(), 2);
    assert_eq!(prices[0].date, day(1));
    assert_eq!(prices[0].close, 10.5);
    assert_eq!(prices[1].close, 9.5);
  }

  #[test]
  fn missing_file_is_symbol_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let provider = CsvProvider::new(dir.path());
    assert!(matches!(
      provider.get_prices("NOPE", day(1), day(2)),
      Err(ProviderError::SymbolNotFound(_))
    ));
  }

  #[test]
  fn malformed_price_is_not_recoverable() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("BAD.csv"), "date,close\n2024-03-01,abc\n").unwrap();
    let err = CsvProvider::new(dir.path())
      .get_prices("BAD", day(1), day(2))
      .unwrap_err();
    assert!(!err.is_recoverable());
  }

  #[test]
  fn reads_properties_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
      dir.path().join(PROPERTIES_FILE),
      "symbol,property,value\nAAA,marketCap,1500\n",
    )
    .unwrap();

    let provider = CsvProvider::new(dir.path());
    assert_eq!(provider.get_property("AAA", "marketCap").unwrap(), 1500.0);
    assert!(provider.get_property("AAA", "beta").is_err());
  }
}
