use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_HISTORY_WINDOW, DEFAULT_REFRESH_INTERVAL_SECS, MAX_HISTORY_WINDOW,
    MAX_REFRESH_INTERVAL_SECS, MIN_HISTORY_WINDOW, MIN_REFRESH_INTERVAL_SECS,
};
use crate::errors::CoreError;

/// Colour scheme preferred by the user interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// User-configurable settings, persisted next to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Display currency label. All amounts are USD; no conversion happens.
    pub currency: String,

    #[serde(default)]
    pub theme: Theme,

    /// Seconds between scheduled price refreshes.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Number of value samples kept for the chart and risk ratio.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_refresh_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

fn default_history_window() -> usize {
    DEFAULT_HISTORY_WINDOW
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            theme: Theme::default(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

impl Settings {
    /// Reject values the rest of the core cannot work with.
    pub fn validate(&self) -> Result<(), CoreError> {
        let currency = self.currency.trim();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(CoreError::InvalidInput(format!(
                "Invalid currency code '{}': must be exactly 3 ASCII letters (e.g., USD)",
                self.currency
            )));
        }
        if !(MIN_REFRESH_INTERVAL_SECS..=MAX_REFRESH_INTERVAL_SECS)
            .contains(&self.refresh_interval_secs)
        {
            return Err(CoreError::InvalidInput(format!(
                "Refresh interval {}s out of range ({MIN_REFRESH_INTERVAL_SECS}..={MAX_REFRESH_INTERVAL_SECS})",
                self.refresh_interval_secs
            )));
        }
        if !(MIN_HISTORY_WINDOW..=MAX_HISTORY_WINDOW).contains(&self.history_window) {
            return Err(CoreError::InvalidInput(format!(
                "History window {} out of range ({MIN_HISTORY_WINDOW}..={MAX_HISTORY_WINDOW})",
                self.history_window
            )));
        }
        Ok(())
    }
}
