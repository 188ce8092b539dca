pub mod analytics_service;
pub mod ledger_service;
pub mod position_service;
pub mod price_service;
#[cfg(not(target_arch = "wasm32"))]
pub mod refresh_scheduler;
