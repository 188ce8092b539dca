use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

use super::traits::PriceProvider;
use crate::errors::CoreError;
use crate::models::holding::AssetType;

const PROVIDER: &str = "Yahoo Finance";

/// Days of daily quotes scanned when the latest-quote endpoint returns nothing
/// (weekends, holidays, thinly traded tickers).
const LOOKBACK_DAYS: i64 = 7;

/// Yahoo Finance provider for stock/ETF prices.
///
/// No API key; wraps Yahoo's public endpoints through `yahoo_finance_api`.
/// Prices come back in the listing currency, which is USD for US tickers.
/// Not WASM-compatible.
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooFinanceProvider {
    pub fn new() -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new().map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to create connector: {e}"),
        })?;
        Ok(Self { connector })
    }

    /// Close of the most recent daily bar within the lookback window.
    async fn recent_close(&self, symbol: &str) -> Result<f64, CoreError> {
        let end = OffsetDateTime::now_utc();
        let start = end - Duration::days(LOOKBACK_DAYS);

        let resp = self
            .connector
            .get_quote_history(symbol, start, end)
            .await
            .map_err(|e| CoreError::Api {
                provider: PROVIDER.into(),
                message: format!("Failed to fetch recent history for {symbol}: {e}"),
            })?;

        let quotes = resp.quotes().map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to parse quotes for {symbol}: {e}"),
        })?;

        quotes
            .iter()
            .max_by_key(|q| q.timestamp)
            .map(|q| q.close)
            .ok_or_else(|| CoreError::PriceSourceUnavailable(format!("no recent quotes for {symbol}")))
    }
}

#[async_trait]
impl PriceProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        vec![AssetType::Stock]
    }

    async fn get_current_price(&self, symbol: &str) -> Result<f64, CoreError> {
        let latest = self
            .connector
            .get_latest_quotes(symbol, "1d")
            .await
            .map_err(|e| e.to_string())
            .and_then(|resp| resp.last_quote().map_err(|e| e.to_string()));

        match latest {
            Ok(quote) => Ok(quote.close),
            Err(e) => {
                log::debug!("Latest quote for {symbol} unavailable ({e}), scanning recent history");
                self.recent_close(symbol).await
            }
        }
    }
}
