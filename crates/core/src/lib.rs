pub mod constants;
pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use chrono::NaiveDate;
use log::{debug, info, warn};
use std::sync::Arc;
use uuid::Uuid;

use errors::CoreError;
use models::{
    analytics::PortfolioMetrics,
    holding::{normalize_symbol, AssetType, Holding},
    ledger::Ledger,
    price::{PriceCache, PriceRequest, PriceSnapshot, RefreshOutcome, RefreshTicket, ValueHistory},
    settings::{Settings, Theme},
    snapshot::PortfolioSnapshot,
    transaction::{NewTransaction, Transaction, TransactionSortOrder, TransactionType},
};
use providers::registry::PriceProviderRegistry;
use services::{
    analytics_service::AnalyticsService,
    ledger_service::LedgerService,
    price_service::{PriceFetch, PriceService},
};
use storage::{
    backup::BackupManager, encryption::KdfParams, manager::StorageManager,
    traits::KeyValueStore,
};

/// Called when the portfolio goes from holding nothing to holding at least
/// one symbol, so a scheduler can refresh prices right away.
pub type RefreshHook = Arc<dyn Fn() + Send + Sync>;

/// Main entry point for the portfolio tracker core library.
/// Owns the ledger, settings and price cache, plus the services that operate on them.
///
/// Every ledger or settings change is applied to a copy, written to the store
/// in one `put`, and only then swapped in. A failed write leaves both memory
/// and storage as they were.
#[must_use]
pub struct PortfolioTracker {
    ledger: Ledger,
    settings: Settings,
    prices: PriceCache,
    storage: StorageManager,
    ledger_service: LedgerService,
    price_service: Arc<PriceService>,
    analytics_service: AnalyticsService,
    refresh_hook: Option<RefreshHook>,
}

impl std::fmt::Debug for PortfolioTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioTracker")
            .field("holdings", &self.ledger.holdings.len())
            .field("transactions", &self.ledger.transactions.len())
            .field("settings", &self.settings)
            .field("cached_prices", &self.prices.snapshot.prices.len())
            .field("history_samples", &self.prices.history.len())
            .finish()
    }
}

impl PortfolioTracker {
    /// Open the portfolio kept in `store` with the default price providers.
    pub fn open(store: impl KeyValueStore + 'static) -> Result<Self, CoreError> {
        Self::open_with_registry(store, PriceProviderRegistry::new_with_defaults())
    }

    /// Open the portfolio kept in `store`, pricing through `registry`.
    ///
    /// Positions are rebuilt from the stored transactions rather than trusted.
    pub fn open_with_registry(
        store: impl KeyValueStore + 'static,
        registry: PriceProviderRegistry,
    ) -> Result<Self, CoreError> {
        let storage = StorageManager::new(store);
        let (data, mut prices) = storage.load()?;
        let ledger_service = LedgerService::new();

        let mut ledger = data.ledger;
        ledger_service.recompute_all(&mut ledger);

        let settings = match data.settings.validate() {
            Ok(()) => data.settings,
            Err(e) => {
                warn!("Stored settings rejected ({e}), using defaults");
                Settings::default()
            }
        };
        prices.history.set_capacity(settings.history_window);

        info!(
            "Opened portfolio: {} holding(s), {} transaction(s)",
            ledger.holdings.len(),
            ledger.transactions.len()
        );

        Ok(Self {
            ledger,
            settings,
            prices,
            storage,
            ledger_service,
            price_service: Arc::new(PriceService::new(registry)),
            analytics_service: AnalyticsService::new(),
            refresh_hook: None,
        })
    }

    /// Install the callback fired when the first symbol is added.
    pub fn set_refresh_hook(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.refresh_hook = Some(Arc::new(hook));
    }

    pub fn clear_refresh_hook(&mut self) {
        self.refresh_hook = None;
    }

    // ── Holdings ────────────────────────────────────────────────────

    /// Create a holding with zero quantity and cost basis.
    pub fn add_holding(
        &mut self,
        symbol: &str,
        name: &str,
        asset_type: AssetType,
    ) -> Result<Uuid, CoreError> {
        self.commit(|service, ledger| service.add_holding(ledger, symbol, name, asset_type))
    }

    /// Delete a holding together with all of its transactions.
    /// Returns the number of transactions removed.
    pub fn delete_holding(&mut self, holding_id: Uuid) -> Result<usize, CoreError> {
        self.commit(|service, ledger| service.delete_holding(ledger, holding_id))
            .map(|(_, dropped)| dropped)
    }

    /// Change a holding's display name. The symbol is immutable.
    pub fn rename_holding(&mut self, holding_id: Uuid, name: &str) -> Result<(), CoreError> {
        self.commit(|service, ledger| service.rename_holding(ledger, holding_id, name))
    }

    #[must_use]
    pub fn get_holdings(&self) -> &[Holding] {
        &self.ledger.holdings
    }

    #[must_use]
    pub fn get_holding(&self, holding_id: Uuid) -> Option<&Holding> {
        self.ledger.holding(holding_id)
    }

    /// Case-insensitive symbol lookup.
    #[must_use]
    pub fn get_holding_by_symbol(&self, symbol: &str) -> Option<&Holding> {
        self.ledger.holding_by_symbol(symbol)
    }

    /// Symbols the refresh cycle will ask prices for.
    #[must_use]
    pub fn held_symbols(&self) -> Vec<String> {
        self.ledger.symbols()
    }

    // ── Transactions ────────────────────────────────────────────────

    /// Record a buy or sell. Sells that would take the holding below zero at
    /// any point of its history are rejected with `InsufficientQuantity`.
    pub fn add_transaction(&mut self, new: NewTransaction) -> Result<Uuid, CoreError> {
        self.commit(|service, ledger| service.add_transaction(ledger, new))
    }

    /// Delete a transaction and rebuild its holding from the remaining history.
    pub fn delete_transaction(&mut self, transaction_id: Uuid) -> Result<(), CoreError> {
        self.commit(|service, ledger| service.delete_transaction(ledger, transaction_id))
            .map(|_| ())
    }

    /// Set or clear the notes of a transaction.
    pub fn set_transaction_notes(
        &mut self,
        transaction_id: Uuid,
        notes: Option<String>,
    ) -> Result<(), CoreError> {
        self.commit(|service, ledger| service.set_notes(ledger, transaction_id, notes))
    }

    #[must_use]
    pub fn get_transaction(&self, transaction_id: Uuid) -> Option<&Transaction> {
        self.ledger.transaction(transaction_id)
    }

    /// All transactions, newest first.
    #[must_use]
    pub fn get_transactions(&self) -> Vec<&Transaction> {
        self.get_transactions_sorted(&TransactionSortOrder::DateDesc)
    }

    /// Transactions of one holding, newest first.
    #[must_use]
    pub fn get_transactions_for_holding(&self, holding_id: Uuid) -> Vec<&Transaction> {
        let mut transactions = self.ledger.transactions_for(holding_id);
        transactions.sort_by(|a, b| b.date.cmp(&a.date));
        transactions
    }

    /// Buys or sells only, newest first.
    #[must_use]
    pub fn get_transactions_by_type(&self, tx_type: TransactionType) -> Vec<&Transaction> {
        self.get_transactions()
            .into_iter()
            .filter(|t| t.tx_type == tx_type)
            .collect()
    }

    /// Transactions dated within `from..=to`, newest first.
    #[must_use]
    pub fn get_transactions_in_range(&self, from: NaiveDate, to: NaiveDate) -> Vec<&Transaction> {
        self.get_transactions()
            .into_iter()
            .filter(|t| t.date >= from && t.date <= to)
            .collect()
    }

    /// Match `query` against the holding's symbol and name and the
    /// transaction notes (case-insensitive). Newest first.
    #[must_use]
    pub fn search_transactions(&self, query: &str) -> Vec<&Transaction> {
        let q = query.trim().to_lowercase();
        self.get_transactions()
            .into_iter()
            .filter(|t| {
                let holding_matches = self.ledger.holding(t.holding_id).is_some_and(|h| {
                    h.symbol.to_lowercase().contains(&q) || h.name.to_lowercase().contains(&q)
                });
                holding_matches || t.notes.as_deref().unwrap_or("").to_lowercase().contains(&q)
            })
            .collect()
    }

    #[must_use]
    pub fn get_transactions_sorted(&self, order: &TransactionSortOrder) -> Vec<&Transaction> {
        let mut transactions: Vec<&Transaction> = self.ledger.transactions.iter().collect();
        match order {
            TransactionSortOrder::DateDesc => transactions.sort_by(|a, b| b.date.cmp(&a.date)),
            TransactionSortOrder::DateAsc => transactions.sort_by(|a, b| a.date.cmp(&b.date)),
            TransactionSortOrder::ValueDesc => {
                transactions.sort_by(|a, b| b.gross_value().total_cmp(&a.gross_value()))
            }
            TransactionSortOrder::ValueAsc => {
                transactions.sort_by(|a, b| a.gross_value().total_cmp(&b.gross_value()))
            }
        }
        transactions
    }

    #[must_use]
    pub fn transaction_count(&self) -> usize {
        self.ledger.transactions.len()
    }

    // ── Metrics & Prices ────────────────────────────────────────────

    /// Value, cost, gain/loss, allocation and risk ratio from the current
    /// holdings and the last known prices.
    #[must_use]
    pub fn metrics(&self) -> PortfolioMetrics {
        self.analytics_service.aggregate(
            &self.ledger.holdings,
            &self.prices.snapshot,
            &self.prices.history,
        )
    }

    #[must_use]
    pub fn price_snapshot(&self) -> &PriceSnapshot {
        &self.prices.snapshot
    }

    #[must_use]
    pub fn value_history(&self) -> &ValueHistory {
        &self.prices.history
    }

    /// Enter a price by hand (offline use). Does not append a value sample.
    pub fn set_manual_price(&mut self, symbol: &str, price: f64) -> Result<(), CoreError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "Price must be a positive number, got {price}"
            )));
        }
        self.prices.snapshot.set(symbol, price);
        self.persist_prices();
        Ok(())
    }

    // ── Price Refresh ───────────────────────────────────────────────

    /// Start a refresh for every held symbol. `None` when one is already
    /// running or nothing is held.
    pub fn begin_refresh(&mut self) -> Option<RefreshTicket> {
        let requests: Vec<PriceRequest> = self
            .ledger
            .symbols()
            .into_iter()
            .filter_map(|symbol| {
                self.ledger.holding_by_symbol(&symbol).map(|h| PriceRequest {
                    symbol,
                    asset_type: h.asset_type,
                })
            })
            .collect();
        let ticket = self.prices.begin_refresh(requests);
        if let Some(ticket) = &ticket {
            debug!(
                "Refresh #{} started for {} symbol(s)",
                ticket.generation,
                ticket.requests.len()
            );
        }
        ticket
    }

    /// Apply a finished fetch. Price persistence failures are logged, not
    /// returned: the in-memory prices are still correct.
    pub fn complete_refresh(&mut self, ticket: &RefreshTicket, fetch: PriceFetch) -> RefreshOutcome {
        let outcome = self.price_service.complete_refresh(
            &mut self.prices,
            ticket,
            fetch,
            &self.ledger.holdings,
        );
        if outcome != RefreshOutcome::Discarded {
            self.persist_prices();
        }
        outcome
    }

    /// Release a refresh that errored or timed out.
    pub fn abort_refresh(&mut self, ticket: &RefreshTicket) -> RefreshOutcome {
        self.price_service.abort_refresh(&mut self.prices, ticket)
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.prices.is_refreshing()
    }

    /// Shared handle to the price service, so a fetch can run without
    /// borrowing the tracker.
    #[must_use]
    pub fn price_service(&self) -> Arc<PriceService> {
        Arc::clone(&self.price_service)
    }

    /// Refresh all held prices now (manual trigger).
    pub async fn refresh_prices(&mut self) -> RefreshOutcome {
        let Some(ticket) = self.begin_refresh() else {
            return RefreshOutcome::Skipped;
        };
        let service = self.price_service();
        let fetch = service.fetch_prices(&ticket.requests).await;
        self.complete_refresh(&ticket, fetch)
    }

    // ── Settings ────────────────────────────────────────────────────

    #[must_use]
    pub fn get_settings(&self) -> &Settings {
        &self.settings
    }

    /// Set the display currency label (3 ASCII letters, stored uppercase).
    pub fn set_currency(&mut self, currency: &str) -> Result<(), CoreError> {
        let code = currency.trim().to_uppercase();
        self.update_settings(|s| s.currency = code)
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<(), CoreError> {
        self.update_settings(|s| s.theme = theme)
    }

    /// Seconds between scheduled refreshes. A running scheduler picks the
    /// new value up after its next cycle.
    pub fn set_refresh_interval(&mut self, secs: u64) -> Result<(), CoreError> {
        self.update_settings(|s| s.refresh_interval_secs = secs)
    }

    /// Number of value samples to keep; shrinking drops the oldest.
    pub fn set_history_window(&mut self, window: usize) -> Result<(), CoreError> {
        self.update_settings(|s| s.history_window = window)?;
        self.prices.history.set_capacity(window);
        self.persist_prices();
        Ok(())
    }

    // ── Import / Export ─────────────────────────────────────────────

    /// Holdings, transactions and settings as pretty-printed JSON.
    pub fn export_snapshot(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(&PortfolioSnapshot::new(&self.ledger, &self.settings))
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize snapshot: {e}")))
    }

    /// Replace everything with the contents of a JSON snapshot.
    ///
    /// The snapshot is parsed, validated and replayed before anything is
    /// touched; any problem is an `ImportValidation` error and the current
    /// data stays as it was.
    pub fn import_snapshot(&mut self, json: &str) -> Result<(), CoreError> {
        let snapshot: PortfolioSnapshot = serde_json::from_str(json)
            .map_err(|e| CoreError::ImportValidation(format!("not a portfolio snapshot: {e}")))?;
        self.replace_with(snapshot)
    }

    /// Password-protected binary backup of the same data as `export_snapshot`.
    pub fn export_encrypted(&self, password: &str) -> Result<Vec<u8>, CoreError> {
        self.export_encrypted_with_params(password, KdfParams::default())
    }

    pub fn export_encrypted_with_params(
        &self,
        password: &str,
        kdf_params: KdfParams,
    ) -> Result<Vec<u8>, CoreError> {
        let snapshot = PortfolioSnapshot::new(&self.ledger, &self.settings);
        BackupManager::export_with_params(&snapshot, password, kdf_params)
    }

    /// Restore from an encrypted backup. A wrong password is `Decryption`;
    /// the decrypted data then goes through the same checks as a JSON import.
    pub fn import_encrypted(&mut self, data: &[u8], password: &str) -> Result<(), CoreError> {
        let snapshot = BackupManager::import(data, password)?;
        self.replace_with(snapshot)
    }

    /// Remove everything from the store and start over with defaults.
    ///
    /// Cached prices are dropped first, the ledger and settings last. If the
    /// second removal fails the ledger is kept, in memory and in the store.
    pub fn clear_all_data(&mut self) -> Result<(), CoreError> {
        self.storage.clear_prices()?;
        self.prices.invalidate_in_flight();
        self.prices.snapshot = PriceSnapshot::default();
        self.prices.history = ValueHistory::with_capacity(self.settings.history_window);

        self.storage.clear_data()?;
        self.ledger = Ledger::default();
        self.settings = Settings::default();
        self.prices.history.set_capacity(self.settings.history_window);
        info!("Cleared all portfolio data");
        Ok(())
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Apply `change` to a copy of the ledger, persist the copy, then swap it in.
    fn commit<T>(
        &mut self,
        change: impl FnOnce(&LedgerService, &mut Ledger) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut draft = self.ledger.clone();
        let result = change(&self.ledger_service, &mut draft)?;
        self.storage.save_data(&draft, &self.settings)?;
        self.swap_ledger(draft);
        Ok(result)
    }

    fn update_settings(&mut self, change: impl FnOnce(&mut Settings)) -> Result<(), CoreError> {
        let mut draft = self.settings.clone();
        change(&mut draft);
        draft.validate()?;
        self.storage.save_data(&self.ledger, &draft)?;
        self.settings = draft;
        Ok(())
    }

    fn replace_with(&mut self, snapshot: PortfolioSnapshot) -> Result<(), CoreError> {
        snapshot.validate_structure()?;
        let (mut ledger, settings) = snapshot.into_parts();
        for holding in &mut ledger.holdings {
            holding.symbol = normalize_symbol(&holding.symbol);
            if holding.name.trim().is_empty() {
                holding.name = holding.symbol.clone();
            }
        }
        self.ledger_service
            .validate_history(&ledger)
            .map_err(|e| CoreError::ImportValidation(e.to_string()))?;
        self.ledger_service.recompute_all(&mut ledger);

        self.storage.save_data(&ledger, &settings)?;

        info!(
            "Imported {} holding(s) and {} transaction(s)",
            ledger.holdings.len(),
            ledger.transactions.len()
        );
        self.settings = settings;
        self.prices.history.clear();
        self.prices.history.set_capacity(self.settings.history_window);
        self.swap_ledger(ledger);
        self.persist_prices();
        Ok(())
    }

    /// Install a committed ledger. A change in the held-symbol set supersedes
    /// any in-flight refresh; going from none to some fires the refresh hook.
    fn swap_ledger(&mut self, ledger: Ledger) {
        let before = self.ledger.symbols();
        self.ledger = ledger;
        let after = self.ledger.symbols();
        if before == after {
            return;
        }

        self.prices.invalidate_in_flight();
        if before.is_empty() && !after.is_empty() {
            if let Some(hook) = &self.refresh_hook {
                (hook.as_ref())();
            }
        }
    }

    fn persist_prices(&mut self) {
        if let Err(e) = self.storage.save_prices(&self.prices) {
            warn!("Failed to persist price cache: {e}");
        }
    }
}
