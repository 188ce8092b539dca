use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::holding::AssetType;

/// A source of current market prices.
///
/// Each API (CoinCap, Yahoo Finance) implements this trait; the price service
/// only ever talks to the trait, so a broken API is swapped out in one place.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Which asset types this provider can price.
    fn supported_asset_types(&self) -> Vec<AssetType>;

    /// Latest USD price of `symbol`.
    async fn get_current_price(&self, symbol: &str) -> Result<f64, CoreError>;
}
