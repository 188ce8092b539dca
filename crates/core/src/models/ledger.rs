use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::holding::{normalize_symbol, Holding};
use super::transaction::Transaction;

/// Holdings plus their transaction history.
///
/// Persisted as a single record so that a holding and its transactions are
/// always written together. Transactions are kept in insertion order; the
/// position calculator sorts by date itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub holdings: Vec<Holding>,
    pub transactions: Vec<Transaction>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holding(&self, id: Uuid) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.id == id)
    }

    pub fn holding_mut(&mut self, id: Uuid) -> Option<&mut Holding> {
        self.holdings.iter_mut().find(|h| h.id == id)
    }

    /// Case-insensitive lookup by ticker.
    pub fn holding_by_symbol(&self, symbol: &str) -> Option<&Holding> {
        let symbol = normalize_symbol(symbol);
        self.holdings.iter().find(|h| h.symbol == symbol)
    }

    pub fn transaction(&self, id: Uuid) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    pub fn transaction_mut(&mut self, id: Uuid) -> Option<&mut Transaction> {
        self.transactions.iter_mut().find(|t| t.id == id)
    }

    /// Transactions of one holding, in insertion order.
    pub fn transactions_for(&self, holding_id: Uuid) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|t| t.holding_id == holding_id)
            .collect()
    }

    pub fn push_holding(&mut self, holding: Holding) {
        self.holdings.push(holding);
    }

    pub fn push_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    pub fn remove_transaction(&mut self, id: Uuid) -> Option<Transaction> {
        let idx = self.transactions.iter().position(|t| t.id == id)?;
        Some(self.transactions.remove(idx))
    }

    /// Remove a holding together with every transaction referencing it.
    /// Returns the holding and the number of transactions dropped.
    pub fn remove_holding(&mut self, id: Uuid) -> Option<(Holding, usize)> {
        let idx = self.holdings.iter().position(|h| h.id == id)?;
        let holding = self.holdings.remove(idx);
        let before = self.transactions.len();
        self.transactions.retain(|t| t.holding_id != id);
        Some((holding, before - self.transactions.len()))
    }

    /// Symbols of all holdings, sorted and de-duplicated.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.holdings.iter().map(|h| h.symbol.clone()).collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty() && self.transactions.is_empty()
    }
}
