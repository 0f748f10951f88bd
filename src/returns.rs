//! # Returns Preprocessing
//!
//! $$
//! r_t = \ln\frac{P_t}{P_{t-1}} \quad\text{or}\quad r_t = \frac{P_t}{P_{t-1}} - 1
//! $$
//!
//! Fetches prices through a [`MarketDataProvider`], aligns them on a common
//! calendar, drops sparse assets, fills gaps, converts to returns, clips
//! outliers and resamples to the requested frequency.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use chrono::Days;
use chrono::Months;
use chrono::NaiveDate;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;
use tracing::debug;
use tracing::warn;

use crate::error::PortfolioError;
use crate::error::Result;
use crate::provider::MarketDataProvider;
use crate::provider::PricePoint;

/// Ordered set of ticker symbols without duplicates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetUniverse {
  symbols: Vec<String>,
}

impl AssetUniverse {
  pub fn new<I, S>(symbols: I) -> Result<Self>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut out: Vec<String> = Vec::new();
    for symbol in symbols {
      let symbol = symbol.as_ref().trim();
      if symbol.is_empty() {
        continue;
      }
      if out.iter().any(|s| s == symbol) {
        return Err(PortfolioError::invalid(format!(
          "duplicate symbol '{symbol}' in universe"
        )));
      }
      out.push(symbol.to_string());
    }

    if out.is_empty() {
      return Err(PortfolioError::EmptyUniverse);
    }
    Ok(Self { symbols: out })
  }

  pub fn symbols(&self) -> &[String] {
    &self.symbols
  }

  pub fn len(&self) -> usize {
    self.symbols.len()
  }

  pub fn is_empty(&self) -> bool {
    self.symbols.is_empty()
  }

  pub fn contains(&self, symbol: &str) -> bool {
    self.symbols.iter().any(|s| s == symbol)
  }
}

impl FromStr for AssetUniverse {
  type Err = PortfolioError;

  /// Parse a comma separated symbol list, e.g. `"AAPL,MSFT,GOOG"`.
  fn from_str(s: &str) -> Result<Self> {
    Self::new(s.split(','))
  }
}

/// Sampling frequency of a [`ReturnMatrix`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Frequency {
  #[default]
  Daily,
  Weekly,
  Monthly,
}

impl Frequency {
  /// Annualisation factor: `{D: 252, W: 52, M: 12}`.
  pub const fn periods_per_year(self) -> f64 {
    match self {
      Frequency::Daily => 252.0,
      Frequency::Weekly => 52.0,
      Frequency::Monthly => 12.0,
    }
  }
}

impl FromStr for Frequency {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "d" | "daily" => Ok(Self::Daily),
      "w" | "weekly" => Ok(Self::Weekly),
      "m" | "monthly" => Ok(Self::Monthly),
      other => Err(PortfolioError::invalid(format!(
        "unknown frequency '{other}' (expected d, w or m)"
      ))),
    }
  }
}

impl fmt::Display for Frequency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Frequency::Daily => write!(f, "D"),
      Frequency::Weekly => write!(f, "W"),
      Frequency::Monthly => write!(f, "M"),
    }
  }
}

/// Gap filling method applied to aligned prices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FillMethod {
  /// Linear interpolation weighted by calendar distance.
  #[default]
  Time,
  /// Linear interpolation weighted by row distance.
  Linear,
  /// Closest observed value (earlier one on ties).
  Nearest,
  ForwardFill,
  BackwardFill,
}

impl FromStr for FillMethod {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "time" => Ok(Self::Time),
      "linear" => Ok(Self::Linear),
      "nearest" => Ok(Self::Nearest),
      "pad" | "ffill" | "forward" => Ok(Self::ForwardFill),
      "bfill" | "backfill" | "backward" => Ok(Self::BackwardFill),
      other => Err(PortfolioError::invalid(format!(
        "unknown fill method '{other}'"
      ))),
    }
  }
}

/// Look-back interval relative to an as-of date.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interval {
  OneDay,
  FiveDays,
  OneMonth,
  ThreeMonths,
  SixMonths,
  OneYear,
  TwoYears,
  ThreeYears,
  FiveYears,
  TenYears,
  YearToDate,
  Max,
}

impl Interval {
  pub fn start_from(self, as_of: NaiveDate) -> NaiveDate {
    let months = |m: u32| as_of.checked_sub_months(Months::new(m));
    let start = match self {
      Interval::OneDay => as_of.checked_sub_days(Days::new(1)),
      Interval::FiveDays => as_of.checked_sub_days(Days::new(5)),
      Interval::OneMonth => months(1),
      Interval::ThreeMonths => months(3),
      Interval::SixMonths => months(6),
      Interval::OneYear => months(12),
      Interval::TwoYears => months(24),
      Interval::ThreeYears => months(36),
      Interval::FiveYears => months(60),
      Interval::TenYears => months(120),
      Interval::YearToDate => NaiveDate::from_ymd_opt(as_of.year(), 1, 1),
      Interval::Max => NaiveDate::from_ymd_opt(1900, 1, 1),
    };
    start.unwrap_or(NaiveDate::MIN)
  }
}

impl FromStr for Interval {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "1d" => Ok(Self::OneDay),
      "5d" => Ok(Self::FiveDays),
      "1mo" => Ok(Self::OneMonth),
      "3mo" => Ok(Self::ThreeMonths),
      "6mo" => Ok(Self::SixMonths),
      "1y" => Ok(Self::OneYear),
      "2y" => Ok(Self::TwoYears),
      "3y" => Ok(Self::ThreeYears),
      "5y" => Ok(Self::FiveYears),
      "10y" => Ok(Self::TenYears),
      "ytd" => Ok(Self::YearToDate),
      "max" => Ok(Self::Max),
      other => Err(PortfolioError::invalid(format!("unknown interval '{other}'"))),
    }
  }
}

/// Time window of the price request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Window {
  Range { start: NaiveDate, end: NaiveDate },
  Interval { interval: Interval, as_of: NaiveDate },
}

impl Window {
  pub fn bounds(&self) -> Result<(NaiveDate, NaiveDate)> {
    let (start, end) = match *self {
      Window::Range { start, end } => (start, end),
      Window::Interval { interval, as_of } => (interval.start_from(as_of), as_of),
    };
    if start > end {
      return Err(PortfolioError::invalid(format!(
        "window start {start} is after end {end}"
      )));
    }
    Ok((start, end))
  }
}

/// Preprocessing parameters.
#[derive(Clone, Debug)]
pub struct ReturnsConfig {
  /// Use `ln(P_t/P_{t-1})` instead of arithmetic returns.
  pub log_returns: bool,
  pub frequency: Frequency,
  /// Largest tolerated fraction of missing prices per asset.
  pub maxnan: f64,
  /// Clip returns to `[-threshold, threshold]`; disabled when zero.
  pub threshold: f64,
  pub method: FillMethod,
  /// Fewest assets that must survive preprocessing.
  pub min_assets: usize,
  /// Fewest return periods; `None` means `max(2, n_assets + 1)`.
  pub min_periods: Option<usize>,
}

impl Default for ReturnsConfig {
  fn default() -> Self {
    Self {
      log_returns: false,
      frequency: Frequency::Daily,
      maxnan: 0.05,
      threshold: 0.0,
      method: FillMethod::Time,
      min_assets: 2,
      min_periods: None,
    }
  }
}

impl ReturnsConfig {
  pub fn validate(&self) -> Result<()> {
    if !(0.0..=1.0).contains(&self.maxnan) {
      return Err(PortfolioError::invalid(format!(
        "maxnan must lie in [0, 1], got {}",
        self.maxnan
      )));
    }
    if !self.threshold.is_finite() || self.threshold < 0.0 {
      return Err(PortfolioError::invalid(format!(
        "threshold must be a non-negative number, got {}",
        self.threshold
      )));
    }
    if self.min_assets == 0 {
      return Err(PortfolioError::invalid("min_assets must be at least 1"));
    }
    Ok(())
  }

  /// Settings for naive weighting, which tolerates a single asset.
  pub fn for_naive(&self) -> Self {
    Self {
      min_assets: 1,
      min_periods: Some(self.min_periods.unwrap_or(2)),
      ..self.clone()
    }
  }
}

/// Time indexed return table, rows are periods and columns are assets.
#[derive(Clone, Debug, PartialEq)]
pub struct ReturnMatrix {
  dates: Vec<NaiveDate>,
  symbols: Vec<String>,
  values: Array2<f64>,
  frequency: Frequency,
  log_returns: bool,
}

impl ReturnMatrix {
  pub fn new(
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    values: Array2<f64>,
    frequency: Frequency,
    log_returns: bool,
  ) -> Result<Self> {
    if values.nrows() != dates.len() || values.ncols() != symbols.len() {
      return Err(PortfolioError::invalid(format!(
        "return matrix is {}x{} but got {} dates and {} symbols",
        values.nrows(),
        values.ncols(),
        dates.len(),
        symbols.len()
      )));
    }
    if values.iter().any(|v| !v.is_finite()) {
      return Err(PortfolioError::insufficient(
        "return matrix contains non-finite values",
      ));
    }

    Ok(Self {
      dates,
      symbols,
      values,
      frequency,
      log_returns,
    })
  }

  /// Daily arithmetic returns dated from 2000-01-03 onwards.
  pub fn from_array<S: AsRef<str>>(symbols: &[S], values: Array2<f64>) -> Result<Self> {
    let base = NaiveDate::from_ymd_opt(2000, 1, 3).unwrap_or(NaiveDate::MIN);
    let dates = base.iter_days().take(values.nrows()).collect();
    let symbols = symbols.iter().map(|s| s.as_ref().to_string()).collect();
    Self::new(dates, symbols, values, Frequency::Daily, false)
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn symbols(&self) -> &[String] {
    &self.symbols
  }

  pub fn values(&self) -> &Array2<f64> {
    &self.values
  }

  pub fn frequency(&self) -> Frequency {
    self.frequency
  }

  pub fn is_log(&self) -> bool {
    self.log_returns
  }

  pub fn n_periods(&self) -> usize {
    self.values.nrows()
  }

  pub fn n_assets(&self) -> usize {
    self.values.ncols()
  }

  pub fn column(&self, symbol: &str) -> Option<ArrayView1<'_, f64>> {
    let idx = self.symbols.iter().position(|s| s == symbol)?;
    Some(self.values.column(idx))
  }

  /// Sub-matrix restricted to the given asset columns.
  pub fn select(&self, columns: &[usize]) -> Self {
    Self {
      dates: self.dates.clone(),
      symbols: columns.iter().map(|&j| self.symbols[j].clone()).collect(),
      values: self.values.select(Axis(1), columns),
      frequency: self.frequency,
      log_returns: self.log_returns,
    }
  }

  /// Portfolio return series `R w`.
  pub fn portfolio_returns(&self, weights: &Array1<f64>) -> Array1<f64> {
    self.values.dot(weights)
  }
}

/// Fetch, align, clean and convert prices of `universe` into a [`ReturnMatrix`].
pub fn prepare_returns<P: MarketDataProvider + ?Sized>(
  provider: &P,
  universe: &AssetUniverse,
  window: &Window,
  config: &ReturnsConfig,
) -> Result<ReturnMatrix> {
  config.validate()?;
  let (start, end) = window.bounds()?;

  let mut fetched: Vec<(String, Vec<PricePoint>)> = Vec::with_capacity(universe.len());
  for symbol in universe.symbols() {
    match provider.get_prices(symbol, start, end) {
      Ok(points) => {
        let points: Vec<PricePoint> = points
          .into_iter()
          .filter(|p| p.close.is_finite() && p.close > 0.0)
          .collect();
        if points.is_empty() {
          warn!(symbol = %symbol, "no usable prices in window, excluding symbol");
          continue;
        }
        fetched.push((symbol.clone(), points));
      }
      Err(err) if err.is_recoverable() => {
        warn!(symbol = %symbol, error = %err, "excluding symbol from universe");
      }
      Err(err) => return Err(err.into()),
    }
  }

  let dates: Vec<NaiveDate> = fetched
    .iter()
    .flat_map(|(_, pts)| pts.iter().map(|p| p.date))
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect();

  let mut symbols = Vec::with_capacity(fetched.len());
  let mut columns = Vec::with_capacity(fetched.len());
  for (symbol, points) in fetched {
    let column = align_to_calendar(&dates, &points);
    let missing = column.iter().filter(|v| v.is_none()).count();
    let fraction = missing as f64 / dates.len().max(1) as f64;
    if fraction > config.maxnan {
      warn!(
        symbol = %symbol,
        missing = fraction,
        maxnan = config.maxnan,
        "too many missing prices, excluding symbol"
      );
      continue;
    }
    symbols.push(symbol);
    columns.push(fill_gaps(&dates, column, config.method));
  }

  if symbols.is_empty() {
    return Err(PortfolioError::EmptyUniverse);
  }
  if symbols.len() < config.min_assets {
    return Err(PortfolioError::insufficient(format!(
      "{} usable asset(s) after preprocessing, at least {} required",
      symbols.len(),
      config.min_assets
    )));
  }

  // Rows with unfilled edges are dropped for every asset.
  let complete_rows: Vec<usize> = (0..dates.len())
    .filter(|&t| columns.iter().all(|c| c[t].is_some()))
    .collect();
  let prices = Array2::from_shape_fn((complete_rows.len(), columns.len()), |(t, j)| {
    columns[j][complete_rows[t]].unwrap_or(f64::NAN)
  });
  let price_dates: Vec<NaiveDate> = complete_rows.iter().map(|&t| dates[t]).collect();

  let (ret_dates, mut returns) = prices_to_returns(&price_dates, &prices, config.log_returns);
  if config.threshold > 0.0 {
    let th = config.threshold;
    returns.mapv_inplace(|r| r.clamp(-th, th));
  }
  let (ret_dates, returns) = resample(&ret_dates, &returns, config.frequency, config.log_returns);

  let n_assets = symbols.len();
  let min_periods = config.min_periods.unwrap_or(n_assets + 1).max(2);
  if ret_dates.len() < min_periods {
    return Err(PortfolioError::insufficient(format!(
      "{} return period(s) for {n_assets} asset(s), at least {min_periods} required",
      ret_dates.len()
    )));
  }

  debug!(
    assets = n_assets,
    periods = ret_dates.len(),
    frequency = %config.frequency,
    "prepared return matrix"
  );
  ReturnMatrix::new(
    ret_dates,
    symbols,
    returns,
    config.frequency,
    config.log_returns,
  )
}

fn align_to_calendar(dates: &[NaiveDate], points: &[PricePoint]) -> Vec<Option<f64>> {
  let mut column = vec![None; dates.len()];
  for p in points {
    // Duplicate dates keep the last observation.
    if let Ok(idx) = dates.binary_search(&p.date) {
      column[idx] = Some(p.close);
    }
  }
  column
}

fn fill_gaps(dates: &[NaiveDate], mut column: Vec<Option<f64>>, method: FillMethod) -> Vec<Option<f64>> {
  let known: Vec<usize> = (0..column.len()).filter(|&i| column[i].is_some()).collect();
  if known.is_empty() {
    return column;
  }

  match method {
    FillMethod::ForwardFill => {
      let mut last = None;
      for v in column.iter_mut() {
        match v {
          Some(x) => last = Some(*x),
          None => *v = last,
        }
      }
    }
    FillMethod::BackwardFill => {
      let mut next = None;
      for v in column.iter_mut().rev() {
        match v {
          Some(x) => next = Some(*x),
          None => *v = next,
        }
      }
    }
    FillMethod::Time | FillMethod::Linear | FillMethod::Nearest => {
      for pair in known.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b - a < 2 {
          continue;
        }
        let (va, vb) = match (column[a], column[b]) {
          (Some(va), Some(vb)) => (va, vb),
          _ => continue,
        };
        for i in (a + 1)..b {
          column[i] = Some(match method {
            FillMethod::Time => {
              let span = (dates[b] - dates[a]).num_days() as f64;
              let step = (dates[i] - dates[a]).num_days() as f64;
              va + (vb - va) * step / span
            }
            FillMethod::Nearest => {
              if i - a <= b - i {
                va
              } else {
                vb
              }
            }
            _ => va + (vb - va) * (i - a) as f64 / (b - a) as f64,
          });
        }
      }
    }
  }

  column
}

fn prices_to_returns(
  dates: &[NaiveDate],
  prices: &Array2<f64>,
  log_returns: bool,
) -> (Vec<NaiveDate>, Array2<f64>) {
  let rows = prices.nrows().saturating_sub(1);
  let returns = Array2::from_shape_fn((rows, prices.ncols()), |(t, j)| {
    let (p0, p1) = (prices[[t, j]], prices[[t + 1, j]]);
    if log_returns {
      (p1 / p0).ln()
    } else {
      p1 / p0 - 1.0
    }
  });
  (dates.iter().skip(1).copied().collect(), returns)
}

fn bucket_key(date: NaiveDate, frequency: Frequency) -> (i32, u32) {
  match frequency {
    Frequency::Daily => (date.year(), date.ordinal()),
    Frequency::Weekly => {
      let week = date.iso_week();
      (week.year(), week.week())
    }
    Frequency::Monthly => (date.year(), date.month()),
  }
}

fn resample(
  dates: &[NaiveDate],
  returns: &Array2<f64>,
  frequency: Frequency,
  log_returns: bool,
) -> (Vec<NaiveDate>, Array2<f64>) {
  if frequency == Frequency::Daily || dates.is_empty() {
    return (dates.to_vec(), returns.clone());
  }

  let n = returns.ncols();
  let mut out_dates = Vec::new();
  let mut rows: Vec<Array1<f64>> = Vec::new();
  let mut current_key = None;

  for (t, &date) in dates.iter().enumerate() {
    let key = bucket_key(date, frequency);
    let row = returns.row(t);
    if current_key != Some(key) {
      current_key = Some(key);
      out_dates.push(date);
      rows.push(if log_returns {
        Array1::zeros(n)
      } else {
        Array1::ones(n)
      });
    }
    if let (Some(acc), Some(last)) = (rows.last_mut(), out_dates.last_mut()) {
      if log_returns {
        *acc += &row;
      } else {
        acc.zip_mut_with(&row, |a, &r| *a *= 1.0 + r);
      }
      *last = date;
    }
  }

  let mut values = Array2::zeros((rows.len(), n));
  for (t, row) in rows.into_iter().enumerate() {
    let row = if log_returns { row } else { row - 1.0 };
    values.row_mut(t).assign(&row);
  }
  (out_dates, values)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use tracing_test::traced_test;

  use super::*;
  use crate::provider::InMemoryProvider;

  fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn range(start: NaiveDate, end: NaiveDate) -> Window {
    Window::Range { start, end }
  }

  #[test]
  fn universe_rejects_duplicates_and_empty_lists() {
    assert!(matches!(
      AssetUniverse::new(["A", "B", "A"]),
      Err(PortfolioError::InvalidParameter(_))
    ));
    assert!(matches!(
      AssetUniverse::new(Vec::<String>::new()),
      Err(PortfolioError::EmptyUniverse)
    ));
    let u: AssetUniverse = "AAPL, MSFT".parse().unwrap();
    assert_eq!(u.symbols(), &["AAPL".to_string(), "MSFT".to_string()]);
  }

  #[test]
  fn interval_tags_parse_and_resolve() {
    let as_of = day(2024, 6, 15);
    assert_eq!("1y".parse::<Interval>().unwrap().start_from(as_of), day(2023, 6, 15));
    assert_eq!("ytd".parse::<Interval>().unwrap().start_from(as_of), day(2024, 1, 1));
    assert!("2w".parse::<Interval>().is_err());
  }

  #[test]
  fn arithmetic_and_log_returns() {
    let start = day(2024, 1, 1);
    let provider = InMemoryProvider::new()
      .with_closes("A", start, &[100.0, 110.0, 99.0, 99.0])
      .with_closes("B", start, &[50.0, 50.0, 55.0, 60.5]);
    let universe = AssetUniverse::new(["A", "B"]).unwrap();
    let window = range(start, day(2024, 1, 31));

    let config = ReturnsConfig {
      min_periods: Some(2),
      ..Default::default()
    };
    let r = prepare_returns(&provider, &universe, &window, &config).unwrap();
    assert_eq!(r.n_periods(), 3);
    assert_abs_diff_eq!(r.values()[[0, 0]], 0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(r.values()[[1, 0]], -0.1, epsilon = 1e-12);
    assert_abs_diff_eq!(r.values()[[2, 1]], 0.1, epsilon = 1e-12);

    let log_config = ReturnsConfig {
      log_returns: true,
      ..config
    };
    let r = prepare_returns(&provider, &universe, &window, &log_config).unwrap();
    assert_abs_diff_eq!(r.values()[[0, 0]], 1.1f64.ln(), epsilon = 1e-12);
  }

  #[traced_test]
  #[test]
  fn missing_symbols_are_dropped_with_warning() {
    let start = day(2024, 1, 1);
    let provider = InMemoryProvider::new()
      .with_closes("A", start, &[1.0, 1.1, 1.2, 1.1, 1.3])
      .with_closes("B", start, &[2.0, 2.1, 2.0, 2.2, 2.1]);
    let universe = AssetUniverse::new(["A", "GHOST", "B"]).unwrap();

    let r = prepare_returns(
      &provider,
      &universe,
      &range(start, day(2024, 2, 1)),
      &ReturnsConfig::default(),
    )
    .unwrap();

    assert_eq!(r.symbols(), &["A".to_string(), "B".to_string()]);
    assert!(logs_contain("excluding symbol from universe"));
  }

  #[test]
  fn sparse_assets_are_dropped_and_gaps_interpolated_by_time() {
    let provider = InMemoryProvider::new()
      .with_prices(
        "A",
        vec![
          PricePoint::new(day(2024, 1, 1), 100.0),
          PricePoint::new(day(2024, 1, 2), 101.0),
          PricePoint::new(day(2024, 1, 3), 102.0),
          PricePoint::new(day(2024, 1, 4), 103.0),
          PricePoint::new(day(2024, 1, 8), 104.0),
        ],
      )
      .with_prices(
        "B",
        vec![
          PricePoint::new(day(2024, 1, 1), 10.0),
          PricePoint::new(day(2024, 1, 2), 10.0),
          PricePoint::new(day(2024, 1, 3), 10.0),
          PricePoint::new(day(2024, 1, 4), 10.0),
          PricePoint::new(day(2024, 1, 8), 10.0),
        ],
      )
      .with_prices(
        "C",
        vec![
          PricePoint::new(day(2024, 1, 1), 10.0),
          PricePoint::new(day(2024, 1, 8), 12.0),
        ],
      );
    let universe = AssetUniverse::new(["A", "B", "C"]).unwrap();
    let config = ReturnsConfig {
      maxnan: 0.2,
      min_periods: Some(2),
      ..Default::default()
    };

    let r = prepare_returns(&provider, &universe, &range(day(2024, 1, 1), day(2024, 1, 31)), &config)
      .unwrap();
    assert_eq!(r.symbols(), &["A".to_string(), "B".to_string()]);
    assert_eq!(r.n_periods(), 4);
  }

  #[test]
  fn time_interpolation_uses_calendar_distance() {
    let dates = vec![day(2024, 1, 1), day(2024, 1, 2), day(2024, 1, 5)];
    let column = vec![Some(1.0), None, Some(5.0)];
    let filled = fill_gaps(&dates, column.clone(), FillMethod::Time);
    assert_abs_diff_eq!(filled[1].unwrap(), 2.0, epsilon = 1e-12);
    let filled = fill_gaps(&dates, column, FillMethod::Linear);
    assert_abs_diff_eq!(filled[1].unwrap(), 3.0, epsilon = 1e-12);
  }

  #[test]
  fn interpolation_does_not_extrapolate_edges() {
    let dates = vec![day(2024, 1, 1), day(2024, 1, 2), day(2024, 1, 3)];
    let filled = fill_gaps(&dates, vec![None, Some(2.0), None], FillMethod::Time);
    assert_eq!(filled, vec![None, Some(2.0), None]);
    let filled = fill_gaps(&dates, vec![None, Some(2.0), None], FillMethod::ForwardFill);
    assert_eq!(filled, vec![None, Some(2.0), Some(2.0)]);
  }

  #[test]
  fn outliers_are_clipped_to_threshold() {
    let start = day(2024, 1, 1);
    let provider = InMemoryProvider::new()
      .with_closes("A", start, &[1.0, 2.0, 2.0, 2.0])
      .with_closes("B", start, &[1.0, 1.0, 0.5, 0.5]);
    let universe = AssetUniverse::new(["A", "B"]).unwrap();
    let config = ReturnsConfig {
      threshold: 0.3,
      ..Default::default()
    };

    let r = prepare_returns(&provider, &universe, &range(start, day(2024, 1, 9)), &config).unwrap();
    assert_abs_diff_eq!(r.values()[[0, 0]], 0.3, epsilon = 1e-12);
    assert_abs_diff_eq!(r.values()[[1, 1]], -0.3, epsilon = 1e-12);
  }

  #[test]
  fn monthly_resampling_compounds_arithmetic_returns() {
    let dates = vec![day(2024, 1, 30), day(2024, 1, 31), day(2024, 2, 1)];
    let returns = Array2::from_shape_vec((3, 1), vec![0.1, 0.1, 0.05]).unwrap();

    let (d, r) = resample(&dates, &returns, Frequency::Monthly, false);
    assert_eq!(d, vec![day(2024, 1, 31), day(2024, 2, 1)]);
    assert_abs_diff_eq!(r[[0, 0]], 0.21, epsilon = 1e-12);
    assert_abs_diff_eq!(r[[1, 0]], 0.05, epsilon = 1e-12);

    let (_, r) = resample(&dates, &returns, Frequency::Monthly, true);
    assert_abs_diff_eq!(r[[0, 0]], 0.2, epsilon = 1e-12);
  }

  #[test]
  fn single_asset_is_insufficient_unless_naive() {
    let start = day(2024, 1, 1);
    let provider = InMemoryProvider::new().with_closes("A", start, &[1.0, 1.1, 1.2, 1.3]);
    let universe = AssetUniverse::new(["A"]).unwrap();
    let window = range(start, day(2024, 1, 31));

    let config = ReturnsConfig::default();
    assert!(matches!(
      prepare_returns(&provider, &universe, &window, &config),
      Err(PortfolioError::InsufficientData(_))
    ));
    let r = prepare_returns(&provider, &universe, &window, &config.for_naive()).unwrap();
    assert_eq!(r.n_assets(), 1);
  }

  #[test]
  fn too_few_periods_for_covariance() {
    let start = day(2024, 1, 1);
    let provider = InMemoryProvider::new()
      .with_closes("A", start, &[1.0, 1.1, 1.2])
      .with_closes("B", start, &[1.0, 0.9, 1.0])
      .with_closes("C", start, &[1.0, 1.0, 1.1]);
    let universe = AssetUniverse::new(["A", "B", "C"]).unwrap();

    let err = prepare_returns(
      &provider,
      &universe,
      &range(start, day(2024, 1, 31)),
      &ReturnsConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PortfolioError::InsufficientData(_)));
  }

  #[test]
  fn invalid_config_fails_before_fetch() {
    struct Panicking;
    impl MarketDataProvider for Panicking {
      fn get_prices(
        &self,
        _: &str,
        _: NaiveDate,
        _: NaiveDate,
      ) -> std::result::Result<Vec<PricePoint>, crate::error::ProviderError> {
        panic!("must not be called");
      }
      fn get_property(&self, _: &str, _: &str) -> std::result::Result<f64, crate::error::ProviderError> {
        panic!("must not be called");
      }
    }

    let config = ReturnsConfig {
      maxnan: 1.5,
      ..Default::default()
    };
    let universe = AssetUniverse::new(["A", "B"]).unwrap();
    let window = range(day(2024, 1, 1), day(2024, 2, 1));
    assert!(matches!(
      prepare_returns(&Panicking, &universe, &window, &config),
      Err(PortfolioError::InvalidParameter(_))
    ));
  }
}
