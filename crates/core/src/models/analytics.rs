use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Portfolio-wide figures derived from holdings and the latest prices.
/// A pure snapshot: recomputed on every read, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    /// Σ quantity × latest price (missing prices count as 0)
    pub total_value: f64,

    /// Σ holding cost basis
    pub total_cost_basis: f64,

    /// total_value - total_cost_basis
    pub total_gain_loss: f64,

    /// total_gain_loss / total_cost_basis × 100, exactly 0 without cost basis
    pub gain_loss_percent: f64,

    /// Value share per symbol, largest first. Empty when the portfolio is worth 0.
    pub allocation: Vec<AllocationEntry>,

    /// Per-sample-period (mean return - risk-free) / stddev over the value
    /// history. Not annualized.
    pub sharpe_like_ratio: f64,

    /// Per-holding breakdown, in ledger order
    pub holdings: Vec<HoldingMetrics>,

    /// True when the last refresh could not price every symbol
    pub prices_stale: bool,

    pub prices_refreshed_at: Option<DateTime<Utc>>,
}

/// One wedge of the allocation chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub symbol: String,
    pub value: f64,
    pub percentage: f64,
}

/// Figures for a single holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingMetrics {
    pub holding_id: Uuid,
    pub symbol: String,
    pub name: String,
    pub quantity: f64,

    /// Latest price, `None` when the symbol has never been priced
    pub price: Option<f64>,

    pub value: f64,
    pub cost_basis: f64,
    pub average_cost: f64,
    pub gain_loss: f64,
    pub gain_loss_percent: f64,

    /// Share of total value (0 when the portfolio is worth 0)
    pub allocation_pct: f64,
}
