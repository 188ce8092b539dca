use chrono::Utc;
use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::HashMap;

use crate::errors::CoreError;
use crate::models::holding::{AssetType, Holding};
use crate::models::price::{PriceCache, PriceRequest, RefreshOutcome, RefreshTicket};
use crate::providers::registry::PriceProviderRegistry;
use crate::services::analytics_service::AnalyticsService;

/// Result of asking the providers for a batch of symbols.
/// A symbol that could not be priced lands in `failures`, never aborts the batch.
#[derive(Debug, Default)]
pub struct PriceFetch {
    pub prices: HashMap<String, f64>,
    pub failures: HashMap<String, String>,
}

impl PriceFetch {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && !self.prices.is_empty()
    }
}

/// Fetches current prices from the provider registry and applies finished
/// refreshes to the price cache.
///
/// Prices are stored as `f64` USD values; no currency conversion happens.
pub struct PriceService {
    registry: PriceProviderRegistry,
    analytics: AnalyticsService,
}

impl PriceService {
    pub fn new(registry: PriceProviderRegistry) -> Self {
        Self {
            registry,
            analytics: AnalyticsService::new(),
        }
    }

    /// Check if at least one provider is available for a given asset type.
    pub fn has_provider_for(&self, asset_type: &AssetType) -> bool {
        !self.registry.get_providers_for(asset_type).is_empty()
    }

    /// Names of the providers for an asset type, in fallback order.
    pub fn get_provider_names(&self, asset_type: &AssetType) -> Vec<String> {
        self.registry
            .get_providers_for(asset_type)
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Price every request concurrently.
    pub async fn fetch_prices(&self, requests: &[PriceRequest]) -> PriceFetch {
        let results = join_all(
            requests
                .iter()
                .map(|req| async move { (req.symbol.clone(), self.fetch_price(req).await) }),
        )
        .await;

        let mut fetch = PriceFetch::default();
        for (symbol, result) in results {
            match result {
                Ok(price) => {
                    fetch.prices.insert(symbol, price);
                }
                Err(e) => {
                    warn!("Price for {symbol} unavailable: {e}");
                    fetch.failures.insert(symbol, e.to_string());
                }
            }
        }
        fetch
    }

    /// Apply a finished fetch to the cache.
    ///
    /// - superseded ticket: nothing applied
    /// - every symbol priced: snapshot replaced, one value sample appended
    /// - some symbols priced: previous snapshot kept, marked stale
    /// - nothing priced: previous snapshot kept, marked stale
    ///
    /// The in-flight marker is released in every case.
    pub fn complete_refresh(
        &self,
        cache: &mut PriceCache,
        ticket: &RefreshTicket,
        fetch: PriceFetch,
        holdings: &[Holding],
    ) -> RefreshOutcome {
        if !cache.is_current(ticket) {
            debug!("Discarding superseded refresh #{}", ticket.generation);
            cache.release(ticket);
            return RefreshOutcome::Discarded;
        }
        cache.release(ticket);

        let missing: Vec<&str> = ticket
            .requests
            .iter()
            .map(|r| r.symbol.as_str())
            .filter(|s| !fetch.prices.contains_key(*s))
            .collect();

        if fetch.prices.is_empty() {
            warn!("Price refresh failed for all {} symbol(s)", ticket.requests.len());
            cache.mark_stale();
            return RefreshOutcome::Failed;
        }

        if !missing.is_empty() {
            warn!("Price refresh incomplete, missing: {}", missing.join(", "));
            cache.mark_stale();
            return RefreshOutcome::Partial;
        }

        let now = Utc::now();
        let total_value = self.analytics.total_value(holdings, &fetch.prices);
        cache.replace_snapshot(fetch.prices, now);
        cache.record_sample(total_value, now);
        info!(
            "Prices refreshed for {} symbol(s); portfolio value {:.2}",
            ticket.requests.len(),
            total_value
        );
        RefreshOutcome::Updated
    }

    /// Give up on a refresh that errored or timed out. A current ticket marks
    /// the snapshot stale; a superseded one changes nothing.
    pub fn abort_refresh(&self, cache: &mut PriceCache, ticket: &RefreshTicket) -> RefreshOutcome {
        if !cache.is_current(ticket) {
            cache.release(ticket);
            return RefreshOutcome::Discarded;
        }
        cache.release(ticket);
        cache.mark_stale();
        warn!("Price refresh #{} aborted", ticket.generation);
        RefreshOutcome::Failed
    }

    /// Ask each provider for the asset type in turn until one returns a
    /// finite, positive price. A zero price means "unavailable".
    async fn fetch_price(&self, request: &PriceRequest) -> Result<f64, CoreError> {
        let providers = self.registry.get_providers_for(&request.asset_type);
        if providers.is_empty() {
            return Err(CoreError::NoProvider(request.asset_type.to_string()));
        }

        let mut last_error = None;
        for provider in &providers {
            match provider.get_current_price(&request.symbol).await {
                Ok(price) if price.is_finite() && price > 0.0 => return Ok(price),
                Ok(price) => {
                    last_error = Some(CoreError::Api {
                        provider: provider.name().to_string(),
                        message: format!(
                            "Invalid price returned for {}: {price} (must be finite and positive)",
                            request.symbol
                        ),
                    });
                }
                Err(e) => {
                    debug!("{} failed for {}: {e}", provider.name(), request.symbol);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| CoreError::PriceSourceUnavailable(request.symbol.clone())))
    }
}
