use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::holding::{normalize_symbol, Holding};
use super::ledger::Ledger;
use super::settings::Settings;
use super::transaction::Transaction;
use crate::constants::SNAPSHOT_VERSION;
use crate::errors::CoreError;

/// Portable copy of everything the user entered: holdings, transactions and
/// settings. Prices are not included; they are refetched after import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub version: u16,
    pub holdings: Vec<Holding>,
    pub transactions: Vec<Transaction>,
    pub settings: Settings,
    pub exported_at: DateTime<Utc>,
}

impl PortfolioSnapshot {
    pub fn new(ledger: &Ledger, settings: &Settings) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            holdings: ledger.holdings.clone(),
            transactions: ledger.transactions.clone(),
            settings: settings.clone(),
            exported_at: Utc::now(),
        }
    }

    /// Structural checks that do not need a replay: version, unique ids and
    /// symbols, numbers in range, and no transaction pointing at a missing holding.
    pub fn validate_structure(&self) -> Result<(), CoreError> {
        if self.version == 0 || self.version > SNAPSHOT_VERSION {
            return Err(CoreError::ImportValidation(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }

        self.settings
            .validate()
            .map_err(|e| CoreError::ImportValidation(format!("settings: {e}")))?;

        let mut holding_ids = HashSet::new();
        let mut symbols = HashSet::new();
        for holding in &self.holdings {
            let symbol = normalize_symbol(&holding.symbol);
            if symbol.is_empty() {
                return Err(CoreError::ImportValidation(format!(
                    "holding {} has an empty symbol",
                    holding.id
                )));
            }
            if !holding_ids.insert(holding.id) {
                return Err(CoreError::ImportValidation(format!(
                    "duplicate holding id {}",
                    holding.id
                )));
            }
            if !symbols.insert(symbol) {
                return Err(CoreError::ImportValidation(format!(
                    "duplicate holding symbol {}",
                    holding.symbol
                )));
            }
        }

        let mut tx_ids = HashSet::new();
        for tx in &self.transactions {
            if !tx_ids.insert(tx.id) {
                return Err(CoreError::ImportValidation(format!(
                    "duplicate transaction id {}",
                    tx.id
                )));
            }
            if !holding_ids.contains(&tx.holding_id) {
                return Err(CoreError::ImportValidation(format!(
                    "transaction {} references unknown holding {}",
                    tx.id, tx.holding_id
                )));
            }
            tx.validate().map_err(|e| {
                CoreError::ImportValidation(format!("transaction {}: {e}", tx.id))
            })?;
        }

        Ok(())
    }

    pub fn into_parts(self) -> (Ledger, Settings) {
        (
            Ledger {
                holdings: self.holdings,
                transactions: self.transactions,
            },
            self.settings,
        )
    }
}
