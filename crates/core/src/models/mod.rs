pub mod analytics;
pub mod holding;
pub mod ledger;
pub mod position;
pub mod price;
pub mod settings;
pub mod snapshot;
pub mod transaction;
