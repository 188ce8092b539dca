use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::traits::KeyValueStore;
use crate::constants::{DATA_KEY, PRICES_KEY};
use crate::errors::CoreError;
use crate::models::holding::Holding;
use crate::models::ledger::Ledger;
use crate::models::price::PriceCache;
use crate::models::settings::Settings;
use crate::models::transaction::Transaction;

/// Everything the user entered, as stored under one key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioData {
    #[serde(flatten)]
    pub ledger: Ledger,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Serialize)]
struct PortfolioDataRef<'a> {
    holdings: &'a [Holding],
    transactions: &'a [Transaction],
    settings: &'a Settings,
}

/// Reads and writes the portfolio through a [`KeyValueStore`] as JSON.
///
/// - `portfolio_data`: holdings, transactions and settings in one record
/// - `portfolio_prices`: last price snapshot and value history
pub struct StorageManager {
    store: Box<dyn KeyValueStore>,
}

impl StorageManager {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Load the stored portfolio. Missing keys give defaults.
    ///
    /// A corrupt data record is an error; a corrupt price record only loses
    /// the cached prices and is logged.
    pub fn load(&self) -> Result<(PortfolioData, PriceCache), CoreError> {
        let data = match self.store.get(DATA_KEY)? {
            Some(bytes) => serde_json::from_slice::<PortfolioData>(&bytes).map_err(|e| {
                CoreError::Persistence(format!("Stored portfolio data is corrupt: {e}"))
            })?,
            None => {
                debug!("No stored portfolio data, starting empty");
                PortfolioData::default()
            }
        };

        let prices = match self.store.get(PRICES_KEY)? {
            Some(bytes) => serde_json::from_slice::<PriceCache>(&bytes).unwrap_or_else(|e| {
                warn!("Ignoring corrupt price cache: {e}");
                PriceCache::default()
            }),
            None => PriceCache::default(),
        };

        Ok((data, prices))
    }

    /// Write holdings, transactions and settings in a single `put`.
    pub fn save_data(&mut self, ledger: &Ledger, settings: &Settings) -> Result<(), CoreError> {
        let record = PortfolioDataRef {
            holdings: &ledger.holdings,
            transactions: &ledger.transactions,
            settings,
        };
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize portfolio: {e}")))?;
        self.store.put(DATA_KEY, &bytes)
    }

    pub fn save_prices(&mut self, cache: &PriceCache) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec(cache)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize prices: {e}")))?;
        self.store.put(PRICES_KEY, &bytes)
    }

    /// Delete everything this manager wrote. The price record goes first, so
    /// a failure part-way leaves the portfolio data in place.
    pub fn clear(&mut self) -> Result<(), CoreError> {
        self.clear_prices()?;
        self.clear_data()
    }

    pub fn clear_prices(&mut self) -> Result<(), CoreError> {
        self.store.remove(PRICES_KEY)
    }

    pub fn clear_data(&mut self) -> Result<(), CoreError> {
        self.store.remove(DATA_KEY)
    }
}
