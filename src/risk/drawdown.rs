//! # Drawdowns
//!
//! $$
//! DD_t = \max_{s\le t} C_s - C_t,\qquad
//! DD^{rel}_t = 1 - \frac{NAV_t}{\max_{s\le t} NAV_s}
//! $$
//!
//! Drawdown magnitudes include the starting point, so a path of `T` returns
//! yields `T + 1` non-negative drawdowns.

use super::quantile;
use super::RiskMeasure;
use super::RiskParams;

/// Drawdowns of the uncompounded path `C_t = Σ_{s≤t} x_s`, `C_0 = 0`.
pub fn absolute_drawdowns(x: &[f64]) -> Vec<f64> {
  let mut out = Vec::with_capacity(x.len() + 1);
  let mut level = 0.0;
  let mut peak = 0.0f64;
  out.push(0.0);
  for &r in x {
    level += r;
    peak = peak.max(level);
    out.push(peak - level);
  }
  out
}

/// Drawdowns of the compounded path `NAV_t = Π_{s≤t}(1 + x_s)`, `NAV_0 = 1`.
pub fn relative_drawdowns(x: &[f64]) -> Vec<f64> {
  let mut out = Vec::with_capacity(x.len() + 1);
  let mut nav = 1.0;
  let mut peak = 1.0f64;
  out.push(0.0);
  for &r in x {
    nav *= 1.0 + r;
    peak = peak.max(nav);
    out.push(if peak > 0.0 { 1.0 - nav / peak } else { f64::NAN });
  }
  out
}

/// Evaluate a drawdown measure on a drawdown magnitude path.
pub(crate) fn evaluate(dd: &[f64], measure: RiskMeasure, params: &RiskParams) -> f64 {
  if dd.is_empty() {
    return f64::NAN;
  }
  // Tail measures read drawdowns as losses of the series -DD.
  let losses: Vec<f64> = dd.iter().map(|d| -d).collect();
  let n = dd.len() as f64;

  match measure {
    RiskMeasure::MDD | RiskMeasure::MDDRel => dd.iter().copied().fold(0.0, f64::max),
    RiskMeasure::ADD | RiskMeasure::ADDRel => dd.iter().sum::<f64>() / n,
    RiskMeasure::DaR | RiskMeasure::DaRRel => quantile::var(&losses, params.alpha),
    RiskMeasure::CDaR | RiskMeasure::CDaRRel => quantile::cvar(&losses, params.alpha),
    RiskMeasure::EDaR | RiskMeasure::EDaRRel => quantile::evar(&losses, params.alpha),
    RiskMeasure::UCI | RiskMeasure::UCIRel => (dd.iter().map(|d| d * d).sum::<f64>() / n).sqrt(),
    _ => f64::NAN,
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  const X: [f64; 5] = [0.10, -0.05, -0.10, 0.05, 0.20];

  #[test]
  fn absolute_path_tracks_running_peak() {
    let dd = absolute_drawdowns(&X);
    let expected = [0.0, 0.0, 0.05, 0.15, 0.10, 0.0];
    for (a, b) in dd.iter().zip(expected) {
      assert_abs_diff_eq!(*a, b, epsilon = 1e-12);
    }
  }

  #[test]
  fn relative_path_compounds() {
    let dd = relative_drawdowns(&X);
    // NAV: 1, 1.1, 1.045, 0.9405, 0.987525, 1.18503
    assert_abs_diff_eq!(dd[3], 1.0 - 0.9405 / 1.1, epsilon = 1e-12);
    assert_abs_diff_eq!(dd[5], 0.0, epsilon = 1e-12);
  }

  #[test]
  fn summary_measures() {
    let dd = absolute_drawdowns(&X);
    let params = RiskParams::default();
    assert_abs_diff_eq!(evaluate(&dd, RiskMeasure::MDD, &params), 0.15, epsilon = 1e-12);
    assert_abs_diff_eq!(evaluate(&dd, RiskMeasure::ADD, &params), 0.30 / 6.0, epsilon = 1e-12);
    let uci = ((0.05f64.powi(2) + 0.15f64.powi(2) + 0.10f64.powi(2)) / 6.0).sqrt();
    assert_abs_diff_eq!(evaluate(&dd, RiskMeasure::UCI, &params), uci, epsilon = 1e-12);
    // α T = 0.3 -> the single worst drawdown
    assert_abs_diff_eq!(evaluate(&dd, RiskMeasure::DaR, &params), 0.15, epsilon = 1e-12);
    assert_abs_diff_eq!(evaluate(&dd, RiskMeasure::CDaR, &params), 0.15, epsilon = 1e-12);
  }

  #[test]
  fn monotone_gains_have_no_drawdown() {
    let dd = absolute_drawdowns(&[0.01, 0.02, 0.03]);
    assert!(dd.iter().all(|&d| d == 0.0));
  }
}
