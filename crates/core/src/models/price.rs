use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use super::holding::{normalize_symbol, AssetType};
use crate::constants::{DEFAULT_HISTORY_WINDOW, MAX_HISTORY_WINDOW, MIN_HISTORY_WINDOW};

/// Latest known USD price per symbol.
///
/// Replaced wholesale when a refresh prices every held symbol. When a refresh
/// fails, the previous prices stay in place and `stale` is raised instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub prices: HashMap<String, f64>,
    pub refreshed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stale: bool,
}

impl PriceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Price for a symbol, if one was ever fetched.
    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.prices.get(&normalize_symbol(symbol)).copied()
    }

    /// Manually set a price (offline use and tests). Does not touch `refreshed_at`.
    pub fn set(&mut self, symbol: &str, price: f64) {
        self.prices.insert(normalize_symbol(symbol), price);
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Total portfolio value at one refresh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueSample {
    pub timestamp: DateTime<Utc>,
    pub total_value: f64,
}

/// Bounded, time-ordered series of value samples. Oldest samples are dropped
/// once `capacity` is exceeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueHistory {
    samples: VecDeque<ValueSample>,
    capacity: usize,
}

impl Default for ValueHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_WINDOW)
    }
}

impl ValueHistory {
    /// Capacity is clamped into the supported window range.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.clamp(MIN_HISTORY_WINDOW, MAX_HISTORY_WINDOW);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: ValueSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Change the window, dropping the oldest samples if it shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.clamp(MIN_HISTORY_WINDOW, MAX_HISTORY_WINDOW);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&ValueSample> {
        self.samples.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ValueSample> {
        self.samples.iter()
    }

    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.total_value).collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// One symbol to price, with the market that decides the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceRequest {
    pub symbol: String,
    pub asset_type: AssetType,
}

/// Handle for one in-flight refresh. Its result is only applied if the
/// generation is still current when the fetch resolves.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshTicket {
    pub generation: u64,
    pub requests: Vec<PriceRequest>,
}

/// What a completed refresh did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Every symbol priced; snapshot replaced and a sample appended.
    Updated,
    /// Some symbols failed; previous snapshot kept and marked stale, no sample.
    Partial,
    /// Nothing priced; previous snapshot kept and marked stale, no sample.
    Failed,
    /// The symbol set changed while fetching; the result was thrown away.
    Discarded,
    /// Another refresh was already running, or nothing is held.
    Skipped,
}

/// Price snapshot, value history and the bookkeeping for in-flight refreshes.
///
/// Saved alongside the ledger so the last prices and chart survive restarts.
/// The generation and in-flight marker are runtime-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceCache {
    pub snapshot: PriceSnapshot,
    pub history: ValueHistory,
    #[serde(skip)]
    generation: u64,
    #[serde(skip)]
    in_flight: Option<u64>,
}

impl PriceCache {
    pub fn new(history_window: usize) -> Self {
        Self {
            history: ValueHistory::with_capacity(history_window),
            ..Self::default()
        }
    }

    /// Start a refresh for `requests`. Returns `None` when another refresh is
    /// still in flight or there is nothing to price.
    pub fn begin_refresh(&mut self, requests: Vec<PriceRequest>) -> Option<RefreshTicket> {
        if self.in_flight.is_some() || requests.is_empty() {
            return None;
        }
        self.generation += 1;
        self.in_flight = Some(self.generation);
        Some(RefreshTicket {
            generation: self.generation,
            requests,
        })
    }

    /// Whether `ticket` still belongs to the latest refresh.
    pub fn is_current(&self, ticket: &RefreshTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Supersede any in-flight refresh; its result will be discarded.
    pub fn invalidate_in_flight(&mut self) {
        self.generation += 1;
        self.in_flight = None;
    }

    /// Release the in-flight marker held by `ticket` (no-op if superseded).
    pub fn release(&mut self, ticket: &RefreshTicket) {
        if self.in_flight == Some(ticket.generation) {
            self.in_flight = None;
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Replace the snapshot wholesale with a complete set of fresh prices.
    pub fn replace_snapshot(&mut self, prices: HashMap<String, f64>, at: DateTime<Utc>) {
        self.snapshot = PriceSnapshot {
            prices,
            refreshed_at: Some(at),
            stale: false,
        };
    }

    pub fn mark_stale(&mut self) {
        self.snapshot.stale = true;
    }

    pub fn record_sample(&mut self, total_value: f64, at: DateTime<Utc>) {
        self.history.push(ValueSample {
            timestamp: at,
            total_value,
        });
    }
}
