use std::collections::HashMap;

use crate::constants::RISK_FREE_RATE_PER_PERIOD;
use crate::models::analytics::{AllocationEntry, HoldingMetrics, PortfolioMetrics};
use crate::models::holding::Holding;
use crate::models::price::{PriceSnapshot, ValueHistory};

/// Computes portfolio metrics: value, cost basis, gain/loss, allocation and a
/// Sharpe-like risk ratio.
///
/// Holds no state; every call is a fresh snapshot of its inputs.
pub struct AnalyticsService;

impl AnalyticsService {
    pub fn new() -> Self {
        Self
    }

    /// Combine holdings with the latest prices and the value history.
    pub fn aggregate(
        &self,
        holdings: &[Holding],
        snapshot: &PriceSnapshot,
        history: &ValueHistory,
    ) -> PortfolioMetrics {
        let total_value = self.total_value(holdings, &snapshot.prices);
        let total_cost_basis: f64 = holdings.iter().map(|h| h.cost_basis).sum();
        let total_gain_loss = total_value - total_cost_basis;

        let holding_metrics = holdings
            .iter()
            .map(|h| {
                let price = snapshot.get(&h.symbol);
                let value = h.quantity * price.unwrap_or(0.0);
                let gain_loss = value - h.cost_basis;
                HoldingMetrics {
                    holding_id: h.id,
                    symbol: h.symbol.clone(),
                    name: h.name.clone(),
                    quantity: h.quantity,
                    price,
                    value,
                    cost_basis: h.cost_basis,
                    average_cost: h.average_cost(),
                    gain_loss,
                    gain_loss_percent: percent_of(gain_loss, h.cost_basis),
                    allocation_pct: if total_value > 0.0 {
                        value / total_value * 100.0
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        PortfolioMetrics {
            total_value,
            total_cost_basis,
            total_gain_loss,
            gain_loss_percent: percent_of(total_gain_loss, total_cost_basis),
            allocation: self.allocation(holdings, &snapshot.prices),
            sharpe_like_ratio: self.sharpe_like_ratio(&history.values()),
            holdings: holding_metrics,
            prices_stale: snapshot.stale,
            prices_refreshed_at: snapshot.refreshed_at,
        }
    }

    /// Σ quantity × price; a symbol without a price contributes 0.
    pub fn total_value(&self, holdings: &[Holding], prices: &HashMap<String, f64>) -> f64 {
        holdings
            .iter()
            .map(|h| h.quantity * prices.get(&h.symbol).copied().unwrap_or(0.0))
            .sum()
    }

    /// Share of total value per symbol, largest first.
    ///
    /// Holdings worth 0 (including unpriced ones) get no entry, and the whole
    /// breakdown is empty when the portfolio is worth 0.
    pub fn allocation(
        &self,
        holdings: &[Holding],
        prices: &HashMap<String, f64>,
    ) -> Vec<AllocationEntry> {
        let total = self.total_value(holdings, prices);
        if total <= 0.0 {
            return Vec::new();
        }

        let mut entries: Vec<AllocationEntry> = holdings
            .iter()
            .filter_map(|h| {
                let value = h.quantity * prices.get(&h.symbol).copied().unwrap_or(0.0);
                (value > 0.0).then(|| AllocationEntry {
                    symbol: h.symbol.clone(),
                    value,
                    percentage: value / total * 100.0,
                })
            })
            .collect();

        entries.sort_by(|a, b| {
            b.value
                .partial_cmp(&a.value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        entries
    }

    /// Unannualized Sharpe-like ratio over consecutive value samples.
    ///
    /// Period returns skip steps whose previous value is 0. Uses the
    /// population standard deviation. Returns 0 with fewer than two samples,
    /// no usable returns, or zero volatility.
    pub fn sharpe_like_ratio(&self, values: &[f64]) -> f64 {
        if values.len() < 2 {
            return 0.0;
        }

        let returns: Vec<f64> = values
            .windows(2)
            .filter(|w| w[0] != 0.0)
            .map(|w| (w[1] - w[0]) / w[0])
            .collect();
        if returns.is_empty() {
            return 0.0;
        }

        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        if std_dev > 0.0 {
            (mean - RISK_FREE_RATE_PER_PERIOD) / std_dev
        } else {
            0.0
        }
    }
}

impl Default for AnalyticsService {
    fn default() -> Self {
        Self::new()
    }
}

/// part / whole × 100, or exactly 0 when there is nothing to divide by.
fn percent_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}
