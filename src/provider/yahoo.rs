use std::time::Duration;
use std::time::Instant;

use anyhow::anyhow;
use anyhow::Context;
use chrono::DateTime;
use chrono::NaiveDate;
use time::OffsetDateTime;
use tokio::runtime::Builder;
use tokio::runtime::Runtime;
use tracing::debug;
use yahoo_finance_api as yahoo;

use super::MarketDataProvider;
use super::PricePoint;
use crate::error::ProviderError;

/// Yahoo Finance price source with a bounded wait per request.
///
/// Properties are not served by the chart endpoint; every property lookup
/// reports [`ProviderError::PropertyNotFound`].
pub struct YahooProvider {
  connector: yahoo::YahooConnector,
  runtime: Runtime,
  timeout: Duration,
}

impl YahooProvider {
  pub fn new(timeout: Duration) -> anyhow::Result<Self> {
    let runtime = Builder::new_current_thread()
      .enable_all()
      .build()
      .context("failed to build tokio runtime")?;
    let connector =
      yahoo::YahooConnector::new().map_err(|e| anyhow!("failed to create yahoo connector: {e}"))?;

    Ok(Self {
      connector,
      runtime,
      timeout,
    })
  }

  fn to_offset(date: NaiveDate) -> anyhow::Result<OffsetDateTime> {
    let secs = date
      .and_hms_opt(0, 0, 0)
      .ok_or_else(|| anyhow!("invalid date {date}"))?
      .and_utc()
      .timestamp();
    OffsetDateTime::from_unix_timestamp(secs).context("date out of range")
  }
}

impl MarketDataProvider for YahooProvider {
  fn get_prices(
    &self,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
  ) -> Result<Vec<PricePoint>, ProviderError> {
    let start_ts = Self::to_offset(start)?;
    let end_ts = Self::to_offset(end.succ_opt().unwrap_or(end))?;
    let started = Instant::now();

    let response = self.runtime.block_on(async {
      tokio::time::timeout(
        self.timeout,
        self.connector.get_quote_history(symbol, start_ts, end_ts),
      )
      .await
    });

    let response = match response {
      Err(_) => {
        return Err(ProviderError::Timeout {
          symbol: symbol.to_string(),
          elapsed: started.elapsed(),
        })
      }
      Ok(Err(err)) => {
        debug!(symbol, error = %err, "yahoo request failed");
        return Err(ProviderError::SymbolNotFound(symbol.to_string()));
      }
      Ok(Ok(response)) => response,
    };

    let quotes = response
      .quotes()
      .map_err(|_| ProviderError::SymbolNotFound(symbol.to_string()))?;

    let mut points = Vec::with_capacity(quotes.len());
    for quote in quotes {
      let Some(ts) = DateTime::from_timestamp(quote.timestamp as i64, 0) else {
        continue;
      };
      points.push(PricePoint::new(ts.date_naive(), quote.adjclose));
    }
    points.sort_by_key(|p| p.date);
    Ok(points)
  }

  fn get_property(&self, symbol: &str, property: &str) -> Result<f64, ProviderError> {
    Err(ProviderError::PropertyNotFound {
      symbol: symbol.to_string(),
      property: property.to_string(),
    })
  }
}
