// ═══════════════════════════════════════════════════════════════════
// Service Tests: PositionCalculator, LedgerService, AnalyticsService,
// PriceService refresh completion
// ═══════════════════════════════════════════════════════════════════

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use portfolio_tracker_core::errors::CoreError;
use portfolio_tracker_core::models::holding::{AssetType, Holding};
use portfolio_tracker_core::models::ledger::Ledger;
use portfolio_tracker_core::models::position::Position;
use portfolio_tracker_core::models::price::{
    PriceCache, PriceRequest, PriceSnapshot, RefreshOutcome, ValueHistory, ValueSample,
};
use portfolio_tracker_core::models::transaction::{NewTransaction, Transaction};
use portfolio_tracker_core::providers::registry::PriceProviderRegistry;
use portfolio_tracker_core::services::analytics_service::AnalyticsService;
use portfolio_tracker_core::services::ledger_service::LedgerService;
use portfolio_tracker_core::services::position_service::PositionCalculator;
use portfolio_tracker_core::services::price_service::{PriceFetch, PriceService};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn buy(holding_id: Uuid, amount: f64, price: f64, fee: f64, date: NaiveDate) -> Transaction {
    NewTransaction::buy(holding_id, amount, price, fee, date)
        .into_transaction()
        .unwrap()
}

fn sell(holding_id: Uuid, amount: f64, price: f64, fee: f64, date: NaiveDate) -> Transaction {
    NewTransaction::sell(holding_id, amount, price, fee, date)
        .into_transaction()
        .unwrap()
}

fn refs(transactions: &[Transaction]) -> Vec<&Transaction> {
    transactions.iter().collect()
}

fn holding_with(symbol: &str, quantity: f64, cost_basis: f64) -> Holding {
    let mut h = Holding::crypto(symbol, "");
    h.quantity = quantity;
    h.cost_basis = cost_basis;
    h
}

fn prices(entries: &[(&str, f64)]) -> HashMap<String, f64> {
    entries.iter().map(|(s, p)| (s.to_string(), *p)).collect()
}

// ═══════════════════════════════════════════════════════════════════
// PositionCalculator
// ═══════════════════════════════════════════════════════════════════

mod position_calculator {
    use super::*;

    #[test]
    fn empty_history_is_zero() {
        let calc = PositionCalculator::new();
        assert_eq!(calc.compute_position(&[]), Position::default());
    }

    #[test]
    fn buy_then_partial_sell() {
        let calc = PositionCalculator::new();
        let id = Uuid::new_v4();
        let txs = vec![
            buy(id, 0.5, 42_000.0, 10.0, d(2025, 1, 15)),
            sell(id, 0.2, 45_000.0, 5.0, d(2025, 2, 1)),
        ];

        let after_buy = calc.compute_position(&refs(&txs[..1]));
        assert!(approx(after_buy.quantity, 0.5));
        assert!(approx(after_buy.cost_basis, 21_010.0));

        let after_sell = calc.compute_position(&refs(&txs));
        assert!(approx(after_sell.quantity, 0.3));
        assert!(approx(after_sell.cost_basis, 12_611.0));
    }

    #[test]
    fn buys_only_sum_amounts_and_costs() {
        let calc = PositionCalculator::new();
        let id = Uuid::new_v4();
        let txs = vec![
            buy(id, 1.0, 100.0, 1.0, d(2025, 1, 1)),
            buy(id, 2.0, 150.0, 2.0, d(2025, 1, 2)),
            buy(id, 0.5, 200.0, 0.0, d(2025, 1, 3)),
        ];
        let pos = calc.compute_position(&refs(&txs));
        assert!(approx(pos.quantity, 3.5));
        assert!(approx(pos.cost_basis, 100.0 + 1.0 + 300.0 + 2.0 + 100.0));
    }

    #[test]
    fn full_liquidation_leaves_only_sell_fee() {
        let calc = PositionCalculator::new();
        let id = Uuid::new_v4();
        let txs = vec![
            buy(id, 2.0, 100.0, 0.0, d(2025, 1, 1)),
            sell(id, 2.0, 120.0, 3.0, d(2025, 1, 2)),
        ];
        let pos = calc.compute_position(&refs(&txs));
        assert_eq!(pos.quantity, 0.0);
        assert!(approx(pos.cost_basis, 3.0));
    }

    #[test]
    fn replays_in_date_order_not_input_order() {
        let calc = PositionCalculator::new();
        let id = Uuid::new_v4();
        let txs = vec![
            sell(id, 1.0, 150.0, 0.0, d(2025, 3, 1)),
            buy(id, 2.0, 100.0, 0.0, d(2025, 1, 1)),
        ];
        let pos = calc.compute_position(&refs(&txs));
        assert!(approx(pos.quantity, 1.0));
        assert!(approx(pos.cost_basis, 100.0));
    }

    #[test]
    fn idempotent() {
        let calc = PositionCalculator::new();
        let id = Uuid::new_v4();
        let txs = vec![
            buy(id, 1.5, 30.0, 0.5, d(2025, 1, 1)),
            sell(id, 0.7, 40.0, 0.1, d(2025, 1, 5)),
            buy(id, 0.2, 35.0, 0.0, d(2025, 1, 9)),
        ];
        let first = calc.compute_position(&refs(&txs));
        let second = calc.compute_position(&refs(&txs));
        assert_eq!(first, second);
    }

    #[test]
    fn oversell_is_clamped_not_negative() {
        let calc = PositionCalculator::new();
        let id = Uuid::new_v4();
        let txs = vec![
            buy(id, 1.0, 100.0, 0.0, d(2025, 1, 1)),
            sell(id, 3.0, 100.0, 0.0, d(2025, 1, 2)),
        ];
        let pos = calc.compute_position(&refs(&txs));
        assert!(pos.quantity >= 0.0);
        assert!(pos.cost_basis >= 0.0);
    }

    #[test]
    fn sell_from_nothing_keeps_cost() {
        let calc = PositionCalculator::new();
        let id = Uuid::new_v4();
        let txs = vec![sell(id, 1.0, 100.0, 2.0, d(2025, 1, 1))];
        let pos = calc.compute_position(&refs(&txs));
        assert_eq!(pos.quantity, 0.0);
        assert!(approx(pos.cost_basis, 2.0));
    }

    #[test]
    fn first_shortfall_none_when_covered() {
        let calc = PositionCalculator::new();
        let id = Uuid::new_v4();
        let txs = vec![
            buy(id, 1.0, 100.0, 0.0, d(2025, 1, 1)),
            sell(id, 1.0, 100.0, 0.0, d(2025, 1, 2)),
        ];
        assert!(calc.first_shortfall(&refs(&txs)).is_none());
    }

    #[test]
    fn first_shortfall_reports_the_sell() {
        let calc = PositionCalculator::new();
        let id = Uuid::new_v4();
        let txs = vec![
            buy(id, 5.0, 100.0, 0.0, d(2025, 1, 1)),
            sell(id, 10.0, 100.0, 0.0, d(2025, 1, 2)),
        ];
        let shortfall = calc.first_shortfall(&refs(&txs)).unwrap();
        assert_eq!(shortfall.transaction_id, txs[1].id);
        assert_eq!(shortfall.date, d(2025, 1, 2));
        assert_eq!(shortfall.requested, 10.0);
        assert_eq!(shortfall.available, 5.0);
    }

    #[test]
    fn backdated_sell_before_buy_is_a_shortfall() {
        let calc = PositionCalculator::new();
        let id = Uuid::new_v4();
        let txs = vec![
            buy(id, 5.0, 100.0, 0.0, d(2025, 2, 1)),
            sell(id, 1.0, 100.0, 0.0, d(2025, 1, 1)),
        ];
        assert!(calc.first_shortfall(&refs(&txs)).is_some());
    }

    #[test]
    fn float_drift_tolerated() {
        let calc = PositionCalculator::new();
        let id = Uuid::new_v4();
        let txs = vec![
            buy(id, 0.1, 1.0, 0.0, d(2025, 1, 1)),
            buy(id, 0.2, 1.0, 0.0, d(2025, 1, 1)),
            sell(id, 0.3, 1.0, 0.0, d(2025, 1, 2)),
        ];
        assert!(calc.first_shortfall(&refs(&txs)).is_none());
    }
}

// ═══════════════════════════════════════════════════════════════════
// LedgerService
// ═══════════════════════════════════════════════════════════════════

mod ledger_service {
    use super::*;

    fn setup() -> (LedgerService, Ledger, Uuid) {
        let service = LedgerService::new();
        let mut ledger = Ledger::new();
        let id = service
            .add_holding(&mut ledger, "btc", "Bitcoin", AssetType::Crypto)
            .unwrap();
        (service, ledger, id)
    }

    #[test]
    fn add_holding_starts_at_zero() {
        let (_, ledger, id) = setup();
        let h = ledger.holding(id).unwrap();
        assert_eq!(h.symbol, "BTC");
        assert_eq!(h.position(), Position::default());
    }

    #[test]
    fn duplicate_symbol_rejected_case_insensitive() {
        let (service, mut ledger, _) = setup();
        let err = service
            .add_holding(&mut ledger, " Btc ", "Again", AssetType::Crypto)
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateSymbol(ref s) if s == "BTC"));
        assert_eq!(ledger.holdings.len(), 1);
    }

    #[test]
    fn empty_symbol_rejected() {
        let service = LedgerService::new();
        let mut ledger = Ledger::new();
        assert!(matches!(
            service.add_holding(&mut ledger, "  ", "", AssetType::Stock),
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn add_transaction_recomputes_holding() {
        let (service, mut ledger, id) = setup();
        service
            .add_transaction(
                &mut ledger,
                NewTransaction::buy(id, 0.5, 42_000.0, 10.0, d(2025, 1, 15)),
            )
            .unwrap();
        let h = ledger.holding(id).unwrap();
        assert!(approx(h.quantity, 0.5));
        assert!(approx(h.cost_basis, 21_010.0));
        assert!(h.updated_at.is_some());
    }

    #[test]
    fn add_transaction_unknown_holding() {
        let (service, mut ledger, _) = setup();
        let err = service
            .add_transaction(
                &mut ledger,
                NewTransaction::buy(Uuid::new_v4(), 1.0, 1.0, 0.0, d(2025, 1, 1)),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::HoldingNotFound(_)));
    }

    #[test]
    fn invalid_numbers_rejected_before_lookup() {
        let (service, mut ledger, id) = setup();
        let err = service
            .add_transaction(&mut ledger, NewTransaction::buy(id, -1.0, 1.0, 0.0, d(2025, 1, 1)))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)));
        assert!(ledger.transactions.is_empty());
    }

    #[test]
    fn oversell_rejected_and_holding_unchanged() {
        let (service, mut ledger, id) = setup();
        service
            .add_transaction(&mut ledger, NewTransaction::buy(id, 5.0, 100.0, 0.0, d(2025, 1, 1)))
            .unwrap();
        let before = ledger.clone();

        let err = service
            .add_transaction(&mut ledger, NewTransaction::sell(id, 10.0, 100.0, 0.0, d(2025, 1, 2)))
            .unwrap_err();

        match err {
            CoreError::InsufficientQuantity {
                symbol,
                requested,
                available,
                date,
            } => {
                assert_eq!(symbol, "BTC");
                assert_eq!(requested, 10.0);
                assert_eq!(available, 5.0);
                assert_eq!(date, "2025-01-02");
            }
            other => panic!("expected InsufficientQuantity, got {other:?}"),
        }
        assert_eq!(ledger, before);
    }

    #[test]
    fn backdated_sell_checked_against_history_at_that_date() {
        let (service, mut ledger, id) = setup();
        service
            .add_transaction(&mut ledger, NewTransaction::buy(id, 5.0, 100.0, 0.0, d(2025, 3, 1)))
            .unwrap();
        let err = service
            .add_transaction(&mut ledger, NewTransaction::sell(id, 1.0, 100.0, 0.0, d(2025, 1, 1)))
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientQuantity { .. }));
    }

    #[test]
    fn backdated_sell_that_breaks_a_later_sell_rejected() {
        let (service, mut ledger, id) = setup();
        service
            .add_transaction(&mut ledger, NewTransaction::buy(id, 5.0, 100.0, 0.0, d(2025, 1, 1)))
            .unwrap();
        service
            .add_transaction(&mut ledger, NewTransaction::sell(id, 4.0, 100.0, 0.0, d(2025, 3, 1)))
            .unwrap();
        let err = service
            .add_transaction(&mut ledger, NewTransaction::sell(id, 2.0, 100.0, 0.0, d(2025, 2, 1)))
            .unwrap_err();
        assert!(matches!(err, CoreError::InsufficientQuantity { .. }));
    }

    #[test]
    fn delete_transaction_recomputes_from_remaining() {
        let (service, mut ledger, id) = setup();
        let first = service
            .add_transaction(&mut ledger, NewTransaction::buy(id, 1.0, 100.0, 0.0, d(2025, 1, 1)))
            .unwrap();
        service
            .add_transaction(&mut ledger, NewTransaction::buy(id, 1.0, 200.0, 0.0, d(2025, 1, 2)))
            .unwrap();

        service.delete_transaction(&mut ledger, first).unwrap();

        let h = ledger.holding(id).unwrap();
        assert!(approx(h.quantity, 1.0));
        assert!(approx(h.cost_basis, 200.0));
    }

    #[test]
    fn delete_buy_backing_a_later_sell_rejected() {
        let (service, mut ledger, id) = setup();
        let buy = service
            .add_transaction(&mut ledger, NewTransaction::buy(id, 1.0, 100.0, 0.0, d(2024, 1, 1)))
            .unwrap();
        service
            .add_transaction(&mut ledger, NewTransaction::sell(id, 1.0, 150.0, 0.0, d(2024, 1, 2)))
            .unwrap();
        let before = ledger.clone();

        let err = service.delete_transaction(&mut ledger, buy).unwrap_err();
        match err {
            CoreError::InsufficientQuantity { date, .. } => assert_eq!(date, "2024-01-02"),
            other => panic!("Expected InsufficientQuantity, got {:?}", other),
        }
        assert_eq!(ledger, before);
        assert!(service.validate_history(&ledger).is_ok());
    }

    #[test]
    fn delete_unknown_transaction() {
        let (service, mut ledger, _) = setup();
        assert!(matches!(
            service.delete_transaction(&mut ledger, Uuid::new_v4()),
            Err(CoreError::TransactionNotFound(_))
        ));
    }

    #[test]
    fn delete_holding_cascades() {
        let (service, mut ledger, id) = setup();
        service
            .add_transaction(&mut ledger, NewTransaction::buy(id, 1.0, 100.0, 0.0, d(2025, 1, 1)))
            .unwrap();
        let (holding, dropped) = service.delete_holding(&mut ledger, id).unwrap();
        assert_eq!(holding.symbol, "BTC");
        assert_eq!(dropped, 1);
        assert!(ledger.is_empty());
    }

    #[test]
    fn rename_and_blank_name() {
        let (service, mut ledger, id) = setup();
        service.rename_holding(&mut ledger, id, "Digital Gold").unwrap();
        assert_eq!(ledger.holding(id).unwrap().name, "Digital Gold");
        service.rename_holding(&mut ledger, id, "  ").unwrap();
        assert_eq!(ledger.holding(id).unwrap().name, "BTC");
    }

    #[test]
    fn set_notes_does_not_move_position() {
        let (service, mut ledger, id) = setup();
        let tx = service
            .add_transaction(&mut ledger, NewTransaction::buy(id, 1.0, 100.0, 0.0, d(2025, 1, 1)))
            .unwrap();
        let before = ledger.holding(id).unwrap().position();
        service
            .set_notes(&mut ledger, tx, Some("  DCA  ".into()))
            .unwrap();
        assert_eq!(ledger.transaction(tx).unwrap().notes.as_deref(), Some("DCA"));
        assert_eq!(ledger.holding(id).unwrap().position(), before);
    }

    #[test]
    fn recompute_all_repairs_tampered_positions() {
        let (service, mut ledger, id) = setup();
        service
            .add_transaction(&mut ledger, NewTransaction::buy(id, 2.0, 50.0, 0.0, d(2025, 1, 1)))
            .unwrap();
        let h = ledger.holding_mut(id).unwrap();
        h.quantity = 999.0;
        h.cost_basis = 1.0;

        service.recompute_all(&mut ledger);
        let h = ledger.holding(id).unwrap();
        assert!(approx(h.quantity, 2.0));
        assert!(approx(h.cost_basis, 100.0));
    }

    #[test]
    fn validate_history_detects_shortfall() {
        let (service, mut ledger, id) = setup();
        ledger.push_transaction(sell(id, 1.0, 1.0, 0.0, d(2025, 1, 1)));
        assert!(matches!(
            service.validate_history(&ledger),
            Err(CoreError::InsufficientQuantity { .. })
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// AnalyticsService
// ═══════════════════════════════════════════════════════════════════

mod analytics_service {
    use super::*;

    fn snapshot(entries: &[(&str, f64)]) -> PriceSnapshot {
        PriceSnapshot {
            prices: prices(entries),
            refreshed_at: Some(Utc::now()),
            stale: false,
        }
    }

    #[test]
    fn totals_and_gain_loss() {
        let analytics = AnalyticsService::new();
        let holdings = vec![holding_with("BTC", 0.3, 12_611.0), holding_with("ETH", 2.0, 4_000.0)];
        let metrics = analytics.aggregate(
            &holdings,
            &snapshot(&[("BTC", 50_000.0), ("ETH", 2_500.0)]),
            &ValueHistory::default(),
        );
        assert!(approx(metrics.total_value, 15_000.0 + 5_000.0));
        assert!(approx(metrics.total_cost_basis, 16_611.0));
        assert!(approx(metrics.total_gain_loss, 20_000.0 - 16_611.0));
        assert!(approx(
            metrics.gain_loss_percent,
            (20_000.0 - 16_611.0) / 16_611.0 * 100.0
        ));
    }

    #[test]
    fn missing_price_contributes_zero() {
        let analytics = AnalyticsService::new();
        let holdings = vec![holding_with("BTC", 1.0, 100.0), holding_with("XYZ", 5.0, 50.0)];
        let metrics =
            analytics.aggregate(&holdings, &snapshot(&[("BTC", 200.0)]), &ValueHistory::default());
        assert!(approx(metrics.total_value, 200.0));
        let xyz = metrics.holdings.iter().find(|h| h.symbol == "XYZ").unwrap();
        assert_eq!(xyz.price, None);
        assert_eq!(xyz.value, 0.0);
    }

    #[test]
    fn zero_cost_basis_gives_zero_percent() {
        let analytics = AnalyticsService::new();
        let metrics = analytics.aggregate(&[], &PriceSnapshot::new(), &ValueHistory::default());
        assert_eq!(metrics.gain_loss_percent, 0.0);
        assert!(metrics.gain_loss_percent.is_finite());
        assert!(metrics.allocation.is_empty());
        assert_eq!(metrics.sharpe_like_ratio, 0.0);
    }

    #[test]
    fn allocation_sums_to_hundred_largest_first() {
        let analytics = AnalyticsService::new();
        let holdings = vec![
            holding_with("ETH", 1.0, 0.0),
            holding_with("BTC", 1.0, 0.0),
            holding_with("DOGE", 0.0, 0.0),
        ];
        let allocation =
            analytics.allocation(&holdings, &prices(&[("BTC", 300.0), ("ETH", 100.0), ("DOGE", 1.0)]));
        assert_eq!(allocation.len(), 2);
        assert_eq!(allocation[0].symbol, "BTC");
        assert!(approx(allocation[0].percentage, 75.0));
        assert!(approx(allocation[1].percentage, 25.0));
        let sum: f64 = allocation.iter().map(|a| a.percentage).sum();
        assert!(approx(sum, 100.0));
    }

    #[test]
    fn allocation_empty_when_worth_nothing() {
        let analytics = AnalyticsService::new();
        let holdings = vec![holding_with("BTC", 1.0, 100.0)];
        assert!(analytics.allocation(&holdings, &HashMap::new()).is_empty());
    }

    #[test]
    fn stale_flag_passed_through() {
        let analytics = AnalyticsService::new();
        let mut snap = snapshot(&[]);
        snap.stale = true;
        let metrics = analytics.aggregate(&[], &snap, &ValueHistory::default());
        assert!(metrics.prices_stale);
    }

    #[test]
    fn sharpe_needs_two_samples() {
        let analytics = AnalyticsService::new();
        assert_eq!(analytics.sharpe_like_ratio(&[]), 0.0);
        assert_eq!(analytics.sharpe_like_ratio(&[100.0]), 0.0);
    }

    #[test]
    fn sharpe_zero_volatility_is_zero() {
        let analytics = AnalyticsService::new();
        assert_eq!(analytics.sharpe_like_ratio(&[100.0, 100.0, 100.0]), 0.0);
    }

    #[test]
    fn sharpe_uses_population_stddev() {
        let analytics = AnalyticsService::new();
        // returns +10%, -10%: mean 0, population stddev 0.1
        let ratio = analytics.sharpe_like_ratio(&[100.0, 110.0, 99.0]);
        assert!(approx(ratio, (0.0 - 0.0001) / 0.1));
    }

    #[test]
    fn sharpe_skips_steps_from_zero() {
        let analytics = AnalyticsService::new();
        // 0 → 100 skipped; single remaining return has no volatility
        assert_eq!(analytics.sharpe_like_ratio(&[0.0, 100.0, 110.0]), 0.0);
        assert_eq!(analytics.sharpe_like_ratio(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn sharpe_from_history() {
        let analytics = AnalyticsService::new();
        let mut history = ValueHistory::default();
        for (i, v) in [100.0, 110.0, 99.0].into_iter().enumerate() {
            history.push(ValueSample {
                timestamp: Utc::now() + chrono::Duration::seconds(i as i64),
                total_value: v,
            });
        }
        let metrics = analytics.aggregate(&[], &PriceSnapshot::new(), &history);
        assert!(approx(metrics.sharpe_like_ratio, -0.001));
    }
}

// ═══════════════════════════════════════════════════════════════════
// PriceService::complete_refresh
// ═══════════════════════════════════════════════════════════════════

mod refresh_completion {
    use super::*;

    fn requests(symbols: &[&str]) -> Vec<PriceRequest> {
        symbols
            .iter()
            .map(|s| PriceRequest {
                symbol: s.to_string(),
                asset_type: AssetType::Crypto,
            })
            .collect()
    }

    fn fetch(ok: &[(&str, f64)], failed: &[&str]) -> PriceFetch {
        PriceFetch {
            prices: prices(ok),
            failures: failed
                .iter()
                .map(|s| (s.to_string(), "boom".to_string()))
                .collect(),
        }
    }

    fn seeded_cache() -> PriceCache {
        let mut cache = PriceCache::default();
        cache.replace_snapshot(prices(&[("BTC", 40_000.0), ("ETH", 2_000.0)]), Utc::now());
        cache.record_sample(42_000.0, Utc::now());
        cache
    }

    fn holdings() -> Vec<Holding> {
        vec![holding_with("BTC", 1.0, 0.0), holding_with("ETH", 1.0, 0.0)]
    }

    #[test]
    fn full_success_replaces_and_samples() {
        let service = PriceService::new(PriceProviderRegistry::new());
        let mut cache = seeded_cache();
        let ticket = cache.begin_refresh(requests(&["BTC", "ETH"])).unwrap();

        let outcome = service.complete_refresh(
            &mut cache,
            &ticket,
            fetch(&[("BTC", 50_000.0), ("ETH", 3_000.0)], &[]),
            &holdings(),
        );

        assert_eq!(outcome, RefreshOutcome::Updated);
        assert_eq!(cache.snapshot.get("BTC"), Some(50_000.0));
        assert!(!cache.snapshot.stale);
        assert_eq!(cache.history.len(), 2);
        assert!(approx(cache.history.latest().unwrap().total_value, 53_000.0));
        assert!(!cache.is_refreshing());
    }

    #[test]
    fn total_failure_keeps_snapshot_and_history() {
        let service = PriceService::new(PriceProviderRegistry::new());
        let mut cache = seeded_cache();
        let before_prices = cache.snapshot.prices.clone();
        let ticket = cache.begin_refresh(requests(&["BTC", "ETH"])).unwrap();

        let outcome =
            service.complete_refresh(&mut cache, &ticket, fetch(&[], &["BTC", "ETH"]), &holdings());

        assert_eq!(outcome, RefreshOutcome::Failed);
        assert_eq!(cache.snapshot.prices, before_prices);
        assert!(cache.snapshot.stale);
        assert_eq!(cache.history.len(), 1);
        assert!(!cache.is_refreshing());
    }

    #[test]
    fn partial_failure_keeps_previous_prices() {
        let service = PriceService::new(PriceProviderRegistry::new());
        let mut cache = seeded_cache();
        let before_prices = cache.snapshot.prices.clone();
        let ticket = cache.begin_refresh(requests(&["BTC", "ETH"])).unwrap();

        let outcome = service.complete_refresh(
            &mut cache,
            &ticket,
            fetch(&[("BTC", 45_000.0)], &["ETH"]),
            &holdings(),
        );

        assert_eq!(outcome, RefreshOutcome::Partial);
        assert_eq!(cache.snapshot.prices, before_prices);
        assert_eq!(cache.snapshot.get("BTC"), Some(40_000.0));
        assert!(cache.snapshot.stale);
        assert_eq!(cache.history.len(), 1);
        assert!(!cache.is_refreshing());
    }

    #[test]
    fn superseded_ticket_discarded() {
        let service = PriceService::new(PriceProviderRegistry::new());
        let mut cache = seeded_cache();
        let ticket = cache.begin_refresh(requests(&["BTC", "ETH"])).unwrap();
        cache.invalidate_in_flight();

        let outcome = service.complete_refresh(
            &mut cache,
            &ticket,
            fetch(&[("BTC", 1.0), ("ETH", 1.0)], &[]),
            &holdings(),
        );

        assert_eq!(outcome, RefreshOutcome::Discarded);
        assert_eq!(cache.snapshot.get("BTC"), Some(40_000.0));
        assert_eq!(cache.history.len(), 1);
    }

    #[test]
    fn abort_marks_stale_and_releases() {
        let service = PriceService::new(PriceProviderRegistry::new());
        let mut cache = seeded_cache();
        let ticket = cache.begin_refresh(requests(&["BTC"])).unwrap();

        assert_eq!(service.abort_refresh(&mut cache, &ticket), RefreshOutcome::Failed);
        assert!(cache.snapshot.stale);
        assert!(!cache.is_refreshing());
    }

    #[test]
    fn history_bounded_by_window() {
        let service = PriceService::new(PriceProviderRegistry::new());
        let mut cache = PriceCache::new(20);
        for i in 0..25 {
            let ticket = cache.begin_refresh(requests(&["BTC"])).unwrap();
            service.complete_refresh(
                &mut cache,
                &ticket,
                fetch(&[("BTC", 100.0 + i as f64)], &[]),
                &[holding_with("BTC", 1.0, 0.0)],
            );
        }
        assert_eq!(cache.history.len(), 20);
        assert!(approx(cache.history.latest().unwrap().total_value, 124.0));
    }
}
