use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CoreError;

/// Side of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Buy => write!(f, "buy"),
            TransactionType::Sell => write!(f, "sell"),
        }
    }
}

/// Sort order for transaction listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionSortOrder {
    /// Newest date first (default for display)
    DateDesc,
    DateAsc,
    /// Largest gross value (amount × price) first
    ValueDesc,
    ValueAsc,
}

/// One immutable buy or sell record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,

    /// Owning holding
    pub holding_id: Uuid,

    #[serde(rename = "type")]
    pub tx_type: TransactionType,

    /// Units transacted (always positive)
    pub amount: f64,

    /// USD per unit at transaction time
    pub price: f64,

    /// USD fee (never negative)
    #[serde(default)]
    pub fee: f64,

    /// Calendar date, daily granularity
    pub date: NaiveDate,

    #[serde(default)]
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// amount × price, without the fee.
    pub fn gross_value(&self) -> f64 {
        self.amount * self.price
    }

    /// What the user paid (buy) or received (sell) including the fee.
    pub fn net_value(&self) -> f64 {
        match self.tx_type {
            TransactionType::Buy => self.gross_value() + self.fee,
            TransactionType::Sell => self.gross_value() - self.fee,
        }
    }

    /// Check the numeric fields of an already-built record (used on import).
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_numbers(self.amount, self.price, self.fee)
    }
}

/// Input for recording a transaction. Turned into a [`Transaction`] only
/// after it passes validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub holding_id: Uuid,
    pub tx_type: TransactionType,
    pub amount: f64,
    pub price: f64,
    pub fee: f64,
    pub date: NaiveDate,
    pub notes: Option<String>,
}

impl NewTransaction {
    pub fn buy(holding_id: Uuid, amount: f64, price: f64, fee: f64, date: NaiveDate) -> Self {
        Self {
            holding_id,
            tx_type: TransactionType::Buy,
            amount,
            price,
            fee,
            date,
            notes: None,
        }
    }

    pub fn sell(holding_id: Uuid, amount: f64, price: f64, fee: f64, date: NaiveDate) -> Self {
        Self {
            tx_type: TransactionType::Sell,
            ..Self::buy(holding_id, amount, price, fee, date)
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Validate the numbers and build the record with a fresh id.
    pub fn into_transaction(self) -> Result<Transaction, CoreError> {
        validate_numbers(self.amount, self.price, self.fee)?;
        Ok(Transaction {
            id: Uuid::new_v4(),
            holding_id: self.holding_id,
            tx_type: self.tx_type,
            amount: self.amount,
            price: self.price,
            fee: self.fee,
            date: self.date,
            notes: clean_notes(self.notes),
            created_at: Utc::now(),
        })
    }
}

/// Trim notes; blank notes are stored as `None`.
pub fn clean_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

fn validate_numbers(amount: f64, price: f64, fee: f64) -> Result<(), CoreError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(CoreError::InvalidInput(format!(
            "Amount must be a positive number, got {amount}"
        )));
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(CoreError::InvalidInput(format!(
            "Price must be a positive number, got {price}"
        )));
    }
    if !fee.is_finite() || fee < 0.0 {
        return Err(CoreError::InvalidInput(format!(
            "Fee must be zero or positive, got {fee}"
        )));
    }
    Ok(())
}

/// Parse a `YYYY-MM-DD` calendar date as entered by the user.
pub fn parse_date(input: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| CoreError::InvalidInput(format!("Invalid date '{input}': {e}")))
}
