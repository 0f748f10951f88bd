//! # Risk Measures
//!
//! $$
//! \mathcal{R}:\ \mathbb{R}^T \to \mathbb{R},\qquad x = \mathbf{R}\mathbf{w}
//! $$
//!
//! Historical estimators of dispersion, downside, tail and drawdown risk of a
//! portfolio return series.

use std::fmt;
use std::str::FromStr;

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;

use crate::error::PortfolioError;
use crate::error::Result;

pub mod contribution;
pub mod dispersion;
pub mod drawdown;
pub mod quantile;

pub use contribution::risk_contributions;

/// Closed set of supported risk measures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RiskMeasure {
  /// Variance `wᵀΣw`.
  MV,
  /// Mean absolute deviation.
  MAD,
  /// Gini mean difference.
  GMD,
  /// Semi standard deviation.
  MSV,
  /// First lower partial moment (Omega ratio denominator).
  FLPM,
  /// Second lower partial moment (Sortino ratio denominator).
  SLPM,
  VaR,
  CVaR,
  /// Tail Gini.
  TG,
  /// Entropic value at risk.
  EVaR,
  /// Worst realisation.
  WR,
  /// Range.
  RG,
  /// CVaR range.
  CVRG,
  /// Tail Gini range.
  TGRG,
  MDD,
  ADD,
  DaR,
  CDaR,
  EDaR,
  /// Ulcer index.
  UCI,
  MDDRel,
  ADDRel,
  DaRRel,
  CDaRRel,
  EDaRRel,
  UCIRel,
}

impl RiskMeasure {
  pub const ALL: [RiskMeasure; 26] = [
    RiskMeasure::MV,
    RiskMeasure::MAD,
    RiskMeasure::GMD,
    RiskMeasure::MSV,
    RiskMeasure::FLPM,
    RiskMeasure::SLPM,
    RiskMeasure::VaR,
    RiskMeasure::CVaR,
    RiskMeasure::TG,
    RiskMeasure::EVaR,
    RiskMeasure::WR,
    RiskMeasure::RG,
    RiskMeasure::CVRG,
    RiskMeasure::TGRG,
    RiskMeasure::MDD,
    RiskMeasure::ADD,
    RiskMeasure::DaR,
    RiskMeasure::CDaR,
    RiskMeasure::EDaR,
    RiskMeasure::UCI,
    RiskMeasure::MDDRel,
    RiskMeasure::ADDRel,
    RiskMeasure::DaRRel,
    RiskMeasure::CDaRRel,
    RiskMeasure::EDaRRel,
    RiskMeasure::UCIRel,
  ];

  pub const fn tag(self) -> &'static str {
    match self {
      RiskMeasure::MV => "MV",
      RiskMeasure::MAD => "MAD",
      RiskMeasure::GMD => "GMD",
      RiskMeasure::MSV => "MSV",
      RiskMeasure::FLPM => "FLPM",
      RiskMeasure::SLPM => "SLPM",
      RiskMeasure::VaR => "VaR",
      RiskMeasure::CVaR => "CVaR",
      RiskMeasure::TG => "TG",
      RiskMeasure::EVaR => "EVaR",
      RiskMeasure::WR => "WR",
      RiskMeasure::RG => "RG",
      RiskMeasure::CVRG => "CVRG",
      RiskMeasure::TGRG => "TGRG",
      RiskMeasure::MDD => "MDD",
      RiskMeasure::ADD => "ADD",
      RiskMeasure::DaR => "DaR",
      RiskMeasure::CDaR => "CDaR",
      RiskMeasure::EDaR => "EDaR",
      RiskMeasure::UCI => "UCI",
      RiskMeasure::MDDRel => "MDD_Rel",
      RiskMeasure::ADDRel => "ADD_Rel",
      RiskMeasure::DaRRel => "DaR_Rel",
      RiskMeasure::CDaRRel => "CDaR_Rel",
      RiskMeasure::EDaRRel => "EDaR_Rel",
      RiskMeasure::UCIRel => "UCI_Rel",
    }
  }

  /// Drawdown measures computed on the cumulative return path.
  pub const fn is_drawdown(self) -> bool {
    matches!(
      self,
      RiskMeasure::MDD
        | RiskMeasure::ADD
        | RiskMeasure::DaR
        | RiskMeasure::CDaR
        | RiskMeasure::EDaR
        | RiskMeasure::UCI
        | RiskMeasure::MDDRel
        | RiskMeasure::ADDRel
        | RiskMeasure::DaRRel
        | RiskMeasure::CDaRRel
        | RiskMeasure::EDaRRel
        | RiskMeasure::UCIRel
    )
  }

  /// Drawdowns measured on the compounded path.
  pub const fn is_relative(self) -> bool {
    matches!(
      self,
      RiskMeasure::MDDRel
        | RiskMeasure::ADDRel
        | RiskMeasure::DaRRel
        | RiskMeasure::CDaRRel
        | RiskMeasure::EDaRRel
        | RiskMeasure::UCIRel
    )
  }

  /// Measures accepted by the risk parity optimizer.
  pub const fn supports_risk_parity(self) -> bool {
    matches!(
      self,
      RiskMeasure::MV
        | RiskMeasure::MAD
        | RiskMeasure::GMD
        | RiskMeasure::MSV
        | RiskMeasure::FLPM
        | RiskMeasure::SLPM
        | RiskMeasure::CVaR
        | RiskMeasure::EVaR
        | RiskMeasure::TG
        | RiskMeasure::CVRG
        | RiskMeasure::TGRG
        | RiskMeasure::CDaR
        | RiskMeasure::EDaR
        | RiskMeasure::UCI
    )
  }
}

impl fmt::Display for RiskMeasure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.tag())
  }
}

impl FromStr for RiskMeasure {
  type Err = PortfolioError;

  fn from_str(s: &str) -> Result<Self> {
    let s = s.trim();
    RiskMeasure::ALL
      .iter()
      .copied()
      .find(|m| m.tag().eq_ignore_ascii_case(s))
      .ok_or_else(|| PortfolioError::invalid(format!("unknown risk measure '{s}'")))
  }
}

/// Parameters of the tail and partial-moment measures.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RiskParams {
  /// Significance level of VaR, CVaR, EVaR, TG and the drawdown quantiles.
  pub alpha: f64,
  /// Number of CVaR levels averaged by Tail Gini.
  pub a_sim: usize,
  /// Significance level of the right tail of range measures; `None` uses `alpha`.
  pub beta: Option<f64>,
  /// Right-tail Tail Gini levels; `None` uses `a_sim`.
  pub b_sim: Option<usize>,
  /// Minimum acceptable return of FLPM and SLPM, per period.
  pub mar: f64,
}

impl Default for RiskParams {
  fn default() -> Self {
    Self {
      alpha: 0.05,
      a_sim: 100,
      beta: None,
      b_sim: None,
      mar: 0.0,
    }
  }
}

impl RiskParams {
  pub fn beta(&self) -> f64 {
    self.beta.unwrap_or(self.alpha)
  }

  pub fn b_sim(&self) -> usize {
    self.b_sim.unwrap_or(self.a_sim)
  }

  pub fn validate(&self) -> Result<()> {
    let level_ok = |v: f64| v > 0.0 && v < 1.0;
    if !level_ok(self.alpha) {
      return Err(PortfolioError::invalid(format!(
        "alpha must lie in (0, 1), got {}",
        self.alpha
      )));
    }
    if !level_ok(self.beta()) {
      return Err(PortfolioError::invalid(format!(
        "beta must lie in (0, 1), got {}",
        self.beta()
      )));
    }
    if self.a_sim == 0 || self.b_sim() == 0 {
      return Err(PortfolioError::invalid("a_sim and b_sim must be positive"));
    }
    if !self.mar.is_finite() {
      return Err(PortfolioError::invalid("mar must be finite"));
    }
    Ok(())
  }
}

/// Risk of the portfolio `weights` under `measure`.
///
/// `MV` is evaluated as `wᵀΣw` from `cov`; every other measure is computed on
/// the portfolio return series `returns · weights`.
pub fn risk(
  weights: &Array1<f64>,
  cov: &Array2<f64>,
  returns: &Array2<f64>,
  measure: RiskMeasure,
  params: &RiskParams,
) -> Result<f64> {
  let n = weights.len();
  if measure == RiskMeasure::MV {
    if cov.nrows() != n || cov.ncols() != n {
      return Err(PortfolioError::degenerate(
        measure,
        format!("{n} weights against a {}x{} covariance", cov.nrows(), cov.ncols()),
      ));
    }
    let value = weights.dot(&cov.dot(weights));
    return finite(measure, value);
  }

  if returns.ncols() != n {
    return Err(PortfolioError::degenerate(
      measure,
      format!("{n} weights against {} return columns", returns.ncols()),
    ));
  }
  let x = returns.dot(weights);
  risk_of_series(x.view(), measure, params)
}

/// Risk of a single return series. `MV` is the sample variance (ddof = 1).
pub fn risk_of_series(x: ArrayView1<f64>, measure: RiskMeasure, params: &RiskParams) -> Result<f64> {
  if x.len() < 2 {
    return Err(PortfolioError::degenerate(
      measure,
      format!("{} observation(s), at least 2 required", x.len()),
    ));
  }
  if x.iter().any(|v| !v.is_finite()) {
    return Err(PortfolioError::degenerate(measure, "non-finite returns"));
  }

  let xs = x.to_vec();
  let value = if measure.is_drawdown() {
    let path = if measure.is_relative() {
      drawdown::relative_drawdowns(&xs)
    } else {
      drawdown::absolute_drawdowns(&xs)
    };
    drawdown::evaluate(&path, measure, params)
  } else {
    match measure {
      RiskMeasure::MV => dispersion::variance(&xs),
      RiskMeasure::MAD => dispersion::mad(&xs),
      RiskMeasure::GMD => dispersion::gmd(&xs),
      RiskMeasure::MSV => dispersion::semi_deviation(&xs),
      RiskMeasure::FLPM => dispersion::flpm(&xs, params.mar),
      RiskMeasure::SLPM => dispersion::slpm(&xs, params.mar),
      RiskMeasure::VaR => quantile::var(&xs, params.alpha),
      RiskMeasure::CVaR => quantile::cvar(&xs, params.alpha),
      RiskMeasure::TG => quantile::tail_gini(&xs, params.alpha, params.a_sim),
      RiskMeasure::EVaR => quantile::evar(&xs, params.alpha),
      RiskMeasure::WR => quantile::worst_realization(&xs),
      RiskMeasure::RG => quantile::range(&xs),
      RiskMeasure::CVRG => quantile::cvar_range(&xs, params.alpha, params.beta()),
      RiskMeasure::TGRG => quantile::tail_gini_range(
        &xs,
        params.alpha,
        params.a_sim,
        params.beta(),
        params.b_sim(),
      ),
      _ => f64::NAN,
    }
  };

  finite(measure, value)
}

/// Degree-one version of the risk: the standard deviation for `MV`.
pub(crate) fn risk_linear(
  weights: &Array1<f64>,
  cov: &Array2<f64>,
  returns: &Array2<f64>,
  measure: RiskMeasure,
  params: &RiskParams,
) -> Result<f64> {
  let value = risk(weights, cov, returns, measure, params)?;
  Ok(if measure == RiskMeasure::MV {
    value.max(0.0).sqrt()
  } else {
    value
  })
}

fn finite(measure: RiskMeasure, value: f64) -> Result<f64> {
  if value.is_finite() {
    Ok(value)
  } else {
    Err(PortfolioError::degenerate(measure, "risk evaluated to a non-finite value"))
  }
}
