use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

use super::traits::PriceProvider;
use crate::errors::CoreError;
use crate::models::holding::AssetType;

const BASE_URL: &str = "https://api.coincap.io/v2";
const PROVIDER: &str = "CoinCap";

/// Ticker → CoinCap asset id for the coins users pick most often.
const KNOWN_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("SOL", "solana"),
    ("XRP", "xrp"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("DOT", "polkadot"),
    ("MATIC", "polygon"),
    ("LINK", "chainlink"),
    ("AVAX", "avalanche"),
    ("ATOM", "cosmos"),
    ("LTC", "litecoin"),
    ("UNI", "uniswap"),
    ("SHIB", "shiba-inu"),
    ("CRO", "crypto-com-coin"),
    ("NEAR", "near-protocol"),
    ("APT", "aptos"),
    ("ARB", "arbitrum"),
    ("OP", "optimism"),
    ("SUI", "sui"),
    ("PEPE", "pepe"),
    ("BONK", "bonk"),
    ("WIF", "dogwifhat"),
    ("RENDER", "render-token"),
    ("FET", "fetch"),
    ("INJ", "injective-protocol"),
    ("IMX", "immutable-x"),
    ("SEI", "sei"),
    ("TIA", "celestia"),
    ("JUP", "jupiter"),
    ("USDT", "tether"),
    ("USDC", "usd-coin"),
];

/// CoinCap API provider for cryptocurrency prices (USD, no API key).
///
/// CoinCap addresses assets by lowercase ids ("bitcoin"). Common tickers are
/// mapped up front; anything else is looked up once via `/assets?search=`
/// and remembered.
pub struct CoinCapProvider {
    client: Client,
    base_url: String,
    symbol_map: Mutex<HashMap<String, String>>,
}

impl CoinCapProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Point the provider at another CoinCap-compatible endpoint.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let symbol_map = KNOWN_IDS
            .iter()
            .map(|(sym, id)| (sym.to_string(), id.to_string()))
            .collect();

        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(15));
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            symbol_map: Mutex::new(symbol_map),
        }
    }

    /// Id for a ticker from the local map; `None` if it needs a search.
    pub fn known_id(&self, symbol: &str) -> Option<String> {
        let map = self.symbol_map.lock().unwrap_or_else(|e| e.into_inner());
        map.get(&symbol.to_uppercase()).cloned()
    }

    async fn resolve_id(&self, symbol: &str) -> Result<String, CoreError> {
        if let Some(id) = self.known_id(symbol) {
            return Ok(id);
        }

        let upper = symbol.to_uppercase();
        let url = format!("{}/assets?search={upper}&limit=5", self.base_url);
        let resp: SearchResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| api_error(format!("Failed to search for {upper}: {e}")))?;

        let id = resp
            .data
            .into_iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(&upper))
            .map(|a| a.id)
            .ok_or_else(|| api_error(format!("No CoinCap asset found for symbol {upper}")))?;

        log::debug!("Resolved {upper} to CoinCap id {id}");
        let mut map = self.symbol_map.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(upper, id.clone());
        Ok(id)
    }
}

impl Default for CoinCapProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn api_error(message: String) -> CoreError {
    CoreError::Api {
        provider: PROVIDER.into(),
        message,
    }
}

// ── CoinCap API response types ──────────────────────────────────────

#[derive(Deserialize)]
struct AssetResponse {
    data: AssetData,
}

#[derive(Deserialize)]
struct AssetData {
    #[serde(rename = "priceUsd")]
    price_usd: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    data: Vec<SearchEntry>,
}

#[derive(Deserialize)]
struct SearchEntry {
    id: String,
    symbol: String,
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl PriceProvider for CoinCapProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        vec![AssetType::Crypto]
    }

    async fn get_current_price(&self, symbol: &str) -> Result<f64, CoreError> {
        let id = self.resolve_id(symbol).await?;
        let url = format!("{}/assets/{id}", self.base_url);

        let resp: AssetResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| api_error(format!("Failed to parse response for {symbol}: {e}")))?;

        resp.data
            .price_usd
            .ok_or_else(|| api_error(format!("No price data for {symbol}")))?
            .parse()
            .map_err(|e| api_error(format!("Invalid price format for {symbol}: {e}")))
    }
}
