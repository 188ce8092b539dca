use thiserror::Error;

/// Unified error type for the portfolio-tracker-core library.
/// Every public fallible function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Ledger / Business Logic ─────────────────────────────────────
    #[error("A holding with symbol {0} already exists")]
    DuplicateSymbol(String),

    #[error("Cannot sell {requested} {symbol} on {date} — only {available} would be held")]
    InsufficientQuantity {
        symbol: String,
        requested: f64,
        available: f64,
        date: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Holding not found: {0}")]
    HoldingNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    // ── Persistence ─────────────────────────────────────────────────
    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Import rejected: {0}")]
    ImportValidation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ── Encrypted backup ────────────────────────────────────────────
    #[error("Invalid backup format: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported backup version: {0}")]
    UnsupportedVersion(u16),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed — wrong password or corrupted backup")]
    Decryption,

    // ── Price source / Network ──────────────────────────────────────
    #[error("Price source unavailable: {0}")]
    PriceSourceUnavailable(String),

    #[error("API error ({provider}): {message}")]
    Api {
        provider: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No provider available for asset type: {0}")]
    NoProvider(String),
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Persistence(e.to_string())
    }
}

impl From<bincode::Error> for CoreError {
    fn from(e: bincode::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors may carry the full URL; drop the query string.
        let msg = e.to_string();
        let sanitized = match msg.find('?') {
            Some(idx) => format!("{}?<query redacted>", &msg[..idx]),
            None => msg,
        };
        CoreError::Network(sanitized)
    }
}

impl From<aes_gcm::Error> for CoreError {
    fn from(_: aes_gcm::Error) -> Self {
        CoreError::Decryption
    }
}
