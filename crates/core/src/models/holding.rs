use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::position::Position;

/// Market the asset trades on. Decides which price provider is asked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    /// Cryptocurrencies (BTC, ETH, SOL, ...) — CoinCap
    #[default]
    Crypto,
    /// Stocks / ETFs (AAPL, VOO, ...) — Yahoo Finance
    Stock,
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetType::Crypto => write!(f, "Crypto"),
            AssetType::Stock => write!(f, "Stock"),
        }
    }
}

/// A position in one asset.
///
/// `quantity` and `cost_basis` are derived: they always equal the replay of
/// the holding's transactions and are only ever written by the ledger service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Unique identifier, assigned at creation
    pub id: Uuid,

    /// Ticker symbol, uppercased (e.g., "BTC", "AAPL")
    pub symbol: String,

    /// Display name; the symbol when none was given
    pub name: String,

    #[serde(default)]
    pub asset_type: AssetType,

    /// Units currently held (never negative)
    pub quantity: f64,

    /// Total USD cost attributed to the held quantity (not per unit)
    pub cost_basis: f64,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Holding {
    /// Create an empty holding. The symbol is trimmed and uppercased and an
    /// empty name falls back to the symbol.
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, asset_type: AssetType) -> Self {
        let symbol = normalize_symbol(&symbol.into());
        let name = name.into().trim().to_string();
        let name = if name.is_empty() { symbol.clone() } else { name };
        Self {
            id: Uuid::new_v4(),
            symbol,
            name,
            asset_type,
            quantity: 0.0,
            cost_basis: 0.0,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn crypto(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(symbol, name, AssetType::Crypto)
    }

    pub fn stock(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(symbol, name, AssetType::Stock)
    }

    /// Average USD cost per held unit (0 when nothing is held).
    pub fn average_cost(&self) -> f64 {
        if self.quantity > 0.0 {
            self.cost_basis / self.quantity
        } else {
            0.0
        }
    }

    /// Current position as a value type.
    pub fn position(&self) -> Position {
        Position {
            quantity: self.quantity,
            cost_basis: self.cost_basis,
        }
    }

    /// Overwrite the derived fields with a freshly computed position.
    pub(crate) fn apply_position(&mut self, position: Position) {
        self.quantity = position.quantity;
        self.cost_basis = position.cost_basis;
        self.updated_at = Some(Utc::now());
    }
}

/// Canonical form of a ticker: trimmed and uppercased.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}
