//! # Reporting
//!
//! $$
//! \bar r_a = \mu^\top\mathbf{w}\,t_f,\qquad
//! \sigma_a = \sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}\,\sqrt{t_f},\qquad
//! SR = \frac{\bar r_a - r_f}{\sigma_a}
//! $$
//!
//! Performance summary and weight tables of a constructed portfolio.

use std::fmt;

use prettytable::format;
use prettytable::row;
use prettytable::Table;

use crate::error::Result;
use crate::optimizers::Method;
use crate::optimizers::Portfolio;
use crate::risk;
use crate::risk::RiskMeasure;
use crate::risk::RiskParams;

/// Annualised performance of a portfolio on the data it was built from.
#[derive(Clone, Debug, PartialEq)]
pub struct PerformanceSummary {
  pub method: Method,
  pub measure: RiskMeasure,
  pub annual_return: f64,
  pub annual_volatility: f64,
  /// `NaN` when the volatility is zero.
  pub sharpe: f64,
  /// Degree-one value of `measure` per period.
  pub risk: f64,
}

impl PerformanceSummary {
  pub fn compute(
    portfolio: &Portfolio,
    measure: RiskMeasure,
    params: &RiskParams,
    annual_risk_free: f64,
  ) -> Result<Self> {
    params.validate()?;
    let w = portfolio.weights().to_array();
    let moments = portfolio.moments();
    let returns = portfolio.returns();
    let tf = returns.frequency().periods_per_year();

    let annual_return = moments.mean.dot(&w) * tf;
    let annual_volatility = w.dot(&moments.cov.dot(&w)).max(0.0).sqrt() * tf.sqrt();
    let sharpe = if annual_volatility > 0.0 {
      (annual_return - annual_risk_free) / annual_volatility
    } else {
      f64::NAN
    };
    let risk = risk::risk_linear(&w, &moments.cov, returns.values(), measure, params)?;
    Ok(Self {
      method: portfolio.method(),
      measure,
      annual_return,
      annual_volatility,
      sharpe,
      risk,
    })
  }

  pub fn table(&self) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(row![self.method.to_string(), ""]);
    table.add_row(row!["Annual return", format!("{:.2}%", self.annual_return * 100.0)]);
    table.add_row(row!["Annual volatility", format!("{:.2}%", self.annual_volatility * 100.0)]);
    table.add_row(row!["Sharpe ratio", format!("{:.3}", self.sharpe)]);
    table.add_row(row![format!("{} (per period)", self.measure), format!("{:.6}", self.risk)]);
    table
  }
}

impl fmt::Display for PerformanceSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.table())
  }
}

/// Weights and their share of the `measure` risk, one row per symbol.
pub fn weights_table(portfolio: &Portfolio, measure: RiskMeasure, params: &RiskParams) -> Result<Table> {
  let w = portfolio.weights().to_array();
  let contributions = risk::risk_contributions(
    &w,
    &portfolio.moments().cov,
    portfolio.returns().values(),
    measure,
    params,
  )?;
  let total = contributions.sum();

  let mut table = Table::new();
  table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
  table.set_titles(row!["Symbol", "Weight", "Risk share"]);
  for ((symbol, weight), rc) in portfolio.weights().iter().zip(contributions.iter()) {
    let share = if total != 0.0 { rc / total } else { f64::NAN };
    table.add_row(row![
      symbol,
      format!("{:.2}%", weight * 100.0),
      format!("{:.2}%", share * 100.0)
    ]);
  }
  Ok(table)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;
  use crate::optimizers;
  use crate::optimizers::fixtures::three_assets;

  fn equal_portfolio() -> Portfolio {
    let (returns, moments) = three_assets();
    let weights = optimizers::equal_weighting(returns.symbols(), 1.0).unwrap();
    Portfolio::new(returns, moments, weights, Method::EqualWeight).unwrap()
  }

  #[test]
  fn summary_annualises_daily_moments() {
    let p = equal_portfolio();
    let params = RiskParams::default();
    let s = PerformanceSummary::compute(&p, RiskMeasure::MV, &params, 0.0).unwrap();
    let w = p.weights().to_array();
    let mean = p.moments().mean.dot(&w);
    let std = w.dot(&p.moments().cov.dot(&w)).sqrt();
    assert_abs_diff_eq!(s.annual_return, mean * 252.0, epsilon = 1e-12);
    assert_abs_diff_eq!(s.annual_volatility, std * 252f64.sqrt(), epsilon = 1e-12);
    assert_abs_diff_eq!(s.risk, std, epsilon = 1e-12);
    assert_abs_diff_eq!(s.sharpe, s.annual_return / s.annual_volatility, epsilon = 1e-12);
  }

  #[test]
  fn tables_render_every_symbol() {
    let p = equal_portfolio();
    let params = RiskParams::default();
    let summary = PerformanceSummary::compute(&p, RiskMeasure::CVaR, &params, 0.02).unwrap();
    let text = summary.to_string();
    assert!(text.contains("Equal Weight"));
    assert!(text.contains("Sharpe ratio"));

    let table = weights_table(&p, RiskMeasure::MV, &params).unwrap().to_string();
    for symbol in ["A", "B", "C"] {
      assert!(table.contains(symbol));
    }
    assert!(table.contains("33.33%"));
  }
}
