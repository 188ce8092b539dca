use crate::constants::QUANTITY_EPSILON;
use crate::models::position::{Position, Shortfall};
use crate::models::transaction::{Transaction, TransactionType};

/// Derives a holding's quantity and cost basis from its transactions
/// (average-cost method).
///
/// Pure business logic — no I/O, no state. Calling it twice on the same
/// transactions gives the same result.
pub struct PositionCalculator;

impl PositionCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Replay `transactions` in ascending date order and return the position.
    ///
    /// - buy: quantity += amount, cost += amount × price + fee
    /// - sell: cost shrinks by the sold fraction of quantity, then the fee is added
    ///
    /// A sell that exceeds the running quantity is not an error here; both
    /// outputs are clamped to zero so bad stored data still displays.
    pub fn compute_position(&self, transactions: &[&Transaction]) -> Position {
        let mut quantity = 0.0_f64;
        let mut cost_basis = 0.0_f64;

        for tx in Self::date_ordered(transactions) {
            match tx.tx_type {
                TransactionType::Buy => {
                    quantity += tx.amount;
                    cost_basis += tx.amount * tx.price + tx.fee;
                }
                TransactionType::Sell => {
                    let sell_ratio = if quantity != 0.0 {
                        tx.amount / quantity
                    } else {
                        0.0
                    };
                    quantity -= tx.amount;
                    cost_basis -= cost_basis * sell_ratio;
                    // Sell fees count as extra cost, not reduced proceeds.
                    cost_basis += tx.fee;
                }
            }
        }

        Position {
            quantity: quantity.max(0.0),
            cost_basis: cost_basis.max(0.0),
        }
    }

    /// Replay in the same order as [`compute_position`](Self::compute_position)
    /// and report the first sell that asks for more than is held at that point.
    pub fn first_shortfall(&self, transactions: &[&Transaction]) -> Option<Shortfall> {
        let mut quantity = 0.0_f64;

        for tx in Self::date_ordered(transactions) {
            match tx.tx_type {
                TransactionType::Buy => quantity += tx.amount,
                TransactionType::Sell => {
                    if tx.amount > quantity + QUANTITY_EPSILON {
                        return Some(Shortfall {
                            transaction_id: tx.id,
                            date: tx.date,
                            requested: tx.amount,
                            available: quantity.max(0.0),
                        });
                    }
                    quantity -= tx.amount;
                }
            }
        }
        None
    }

    /// Stable sort by date: same-day transactions keep their input order.
    fn date_ordered<'a>(transactions: &[&'a Transaction]) -> Vec<&'a Transaction> {
        let mut ordered = transactions.to_vec();
        ordered.sort_by_key(|t| t.date);
        ordered
    }
}

impl Default for PositionCalculator {
    fn default() -> Self {
        Self::new()
    }
}
