/// Risk-free return per sampling period used by the Sharpe-like ratio.
pub const RISK_FREE_RATE_PER_PERIOD: f64 = 0.0001;

/// Number of value samples kept for the performance chart and risk ratio.
pub const DEFAULT_HISTORY_WINDOW: usize = 20;
pub const MIN_HISTORY_WINDOW: usize = 20;
pub const MAX_HISTORY_WINDOW: usize = 50;

/// Price refresh cadence in seconds.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 30;
pub const MAX_REFRESH_INTERVAL_SECS: u64 = 3600;

/// Upper bound on a single price fetch before the refresh is abandoned.
pub const FETCH_TIMEOUT_SECS: u64 = 20;

/// Slack when comparing running quantities, to absorb float drift.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// Version written into exported snapshots.
pub const SNAPSHOT_VERSION: u16 = 1;

// Key-value store keys. Holdings, transactions and settings share one record
// so that every ledger change is a single write.
pub const DATA_KEY: &str = "portfolio_data";
pub const PRICES_KEY: &str = "portfolio_prices";
