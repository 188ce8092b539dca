use serde::{Deserialize, Serialize};

/// Quantity and total cost of a holding, as produced by replaying its transactions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: f64,
    pub cost_basis: f64,
}

/// First sell in a replay that asks for more than is held at that point.
#[derive(Debug, Clone, PartialEq)]
pub struct Shortfall {
    pub transaction_id: uuid::Uuid,
    pub date: chrono::NaiveDate,
    pub requested: f64,
    pub available: f64,
}
