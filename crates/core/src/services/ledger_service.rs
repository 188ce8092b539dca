use log::debug;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::holding::{normalize_symbol, AssetType, Holding};
use crate::models::ledger::Ledger;
use crate::models::transaction::{clean_notes, NewTransaction, Transaction, TransactionType};
use crate::services::position_service::PositionCalculator;

/// The write path for holdings and transactions.
///
/// Every change that can move a position ends with a full recompute of the
/// affected holding from its remaining history. Nothing is patched
/// incrementally. Persistence is the caller's job.
pub struct LedgerService {
    calculator: PositionCalculator,
}

impl LedgerService {
    pub fn new() -> Self {
        Self {
            calculator: PositionCalculator::new(),
        }
    }

    /// Create an empty holding. Symbols are unique, compared case-insensitively.
    pub fn add_holding(
        &self,
        ledger: &mut Ledger,
        symbol: &str,
        name: &str,
        asset_type: AssetType,
    ) -> Result<Uuid, CoreError> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(CoreError::InvalidInput("Symbol must not be empty".into()));
        }
        if ledger.holding_by_symbol(&symbol).is_some() {
            return Err(CoreError::DuplicateSymbol(symbol));
        }

        let holding = Holding::new(symbol, name, asset_type);
        let id = holding.id;
        debug!("Adding holding {} ({})", holding.symbol, id);
        ledger.push_holding(holding);
        Ok(id)
    }

    /// Record a buy or sell.
    ///
    /// Sells are checked by replaying the holding's history plus the candidate
    /// in date order; the candidate is rejected if any sell would then exceed
    /// the running quantity.
    pub fn add_transaction(
        &self,
        ledger: &mut Ledger,
        new: NewTransaction,
    ) -> Result<Uuid, CoreError> {
        let transaction = new.into_transaction()?;
        let symbol = ledger
            .holding(transaction.holding_id)
            .map(|h| h.symbol.clone())
            .ok_or_else(|| CoreError::HoldingNotFound(transaction.holding_id.to_string()))?;

        if transaction.tx_type == TransactionType::Sell {
            let mut candidate = ledger.transactions_for(transaction.holding_id);
            candidate.push(&transaction);
            if let Some(shortfall) = self.calculator.first_shortfall(&candidate) {
                return Err(CoreError::InsufficientQuantity {
                    symbol,
                    requested: shortfall.requested,
                    available: shortfall.available,
                    date: shortfall.date.to_string(),
                });
            }
        }

        let id = transaction.id;
        let holding_id = transaction.holding_id;
        debug!(
            "Recording {} of {} {} @ {} on {}",
            transaction.tx_type, transaction.amount, symbol, transaction.price, transaction.date
        );
        ledger.push_transaction(transaction);
        self.recompute_holding(ledger, holding_id)?;
        Ok(id)
    }

    /// Remove a transaction and rebuild its holding from what remains.
    ///
    /// Removing a buy that a later sell depends on is rejected with
    /// `InsufficientQuantity`; the ledger is left untouched.
    pub fn delete_transaction(
        &self,
        ledger: &mut Ledger,
        transaction_id: Uuid,
    ) -> Result<Transaction, CoreError> {
        let target = ledger
            .transaction(transaction_id)
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()))?;
        let holding_id = target.holding_id;

        // The holding may already be gone if the data was edited by hand.
        if let Some(holding) = ledger.holding(holding_id) {
            let remaining: Vec<&Transaction> = ledger
                .transactions_for(holding_id)
                .into_iter()
                .filter(|t| t.id != transaction_id)
                .collect();
            if let Some(shortfall) = self.calculator.first_shortfall(&remaining) {
                return Err(CoreError::InsufficientQuantity {
                    symbol: holding.symbol.clone(),
                    requested: shortfall.requested,
                    available: shortfall.available,
                    date: shortfall.date.to_string(),
                });
            }
        }

        let removed = ledger
            .remove_transaction(transaction_id)
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()))?;
        if ledger.holding(removed.holding_id).is_some() {
            self.recompute_holding(ledger, removed.holding_id)?;
        }
        Ok(removed)
    }

    /// Remove a holding and every transaction that references it.
    pub fn delete_holding(
        &self,
        ledger: &mut Ledger,
        holding_id: Uuid,
    ) -> Result<(Holding, usize), CoreError> {
        let (holding, dropped) = ledger
            .remove_holding(holding_id)
            .ok_or_else(|| CoreError::HoldingNotFound(holding_id.to_string()))?;
        debug!(
            "Deleted holding {} with {} transaction(s)",
            holding.symbol, dropped
        );
        Ok((holding, dropped))
    }

    /// Rename a holding. An empty name falls back to the symbol.
    pub fn rename_holding(
        &self,
        ledger: &mut Ledger,
        holding_id: Uuid,
        name: &str,
    ) -> Result<(), CoreError> {
        let holding = ledger
            .holding_mut(holding_id)
            .ok_or_else(|| CoreError::HoldingNotFound(holding_id.to_string()))?;
        let name = name.trim();
        holding.name = if name.is_empty() {
            holding.symbol.clone()
        } else {
            name.to_string()
        };
        holding.updated_at = Some(chrono::Utc::now());
        Ok(())
    }

    /// Set or clear the notes of a transaction. Positions are unaffected.
    pub fn set_notes(
        &self,
        ledger: &mut Ledger,
        transaction_id: Uuid,
        notes: Option<String>,
    ) -> Result<(), CoreError> {
        let tx = ledger
            .transaction_mut(transaction_id)
            .ok_or_else(|| CoreError::TransactionNotFound(transaction_id.to_string()))?;
        tx.notes = clean_notes(notes);
        Ok(())
    }

    /// Overwrite one holding's quantity and cost basis with a full replay.
    pub fn recompute_holding(&self, ledger: &mut Ledger, holding_id: Uuid) -> Result<(), CoreError> {
        let position = {
            let history = ledger.transactions_for(holding_id);
            self.calculator.compute_position(&history)
        };
        let holding = ledger
            .holding_mut(holding_id)
            .ok_or_else(|| CoreError::HoldingNotFound(holding_id.to_string()))?;
        holding.apply_position(position);
        Ok(())
    }

    /// Rebuild every holding from its history (after load or import).
    pub fn recompute_all(&self, ledger: &mut Ledger) {
        let ids: Vec<Uuid> = ledger.holdings.iter().map(|h| h.id).collect();
        for id in ids {
            let position = self.calculator.compute_position(&ledger.transactions_for(id));
            if let Some(holding) = ledger.holding_mut(id) {
                if holding.position() != position {
                    holding.apply_position(position);
                }
            }
        }
    }

    /// Check that no holding's history sells more than it holds.
    pub fn validate_history(&self, ledger: &Ledger) -> Result<(), CoreError> {
        for holding in &ledger.holdings {
            let history = ledger.transactions_for(holding.id);
            if let Some(shortfall) = self.calculator.first_shortfall(&history) {
                return Err(CoreError::InsufficientQuantity {
                    symbol: holding.symbol.clone(),
                    requested: shortfall.requested,
                    available: shortfall.available,
                    date: shortfall.date.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Default for LedgerService {
    fn default() -> Self {
        Self::new()
    }
}
