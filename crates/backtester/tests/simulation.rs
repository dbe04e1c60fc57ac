use backtester::{BacktestError, Backtester, run_sweep};
use chrono::NaiveDate;
use configuration::{
    AssetConfig, Backtest, Config, Costs, EngineSettings, Output, SkippedDayPolicy, StrategyConfig,
    StrategyParams,
};
use core_types::{AssetType, FundamentalSnapshot, OrderSide, StrategyId};
use executor::SimulatedCostModel;
use market_data::{InMemoryProvider, MarketDataProvider};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn strategy(strategy_type: StrategyId, params: StrategyParams) -> StrategyConfig {
    StrategyConfig { strategy_type, name: String::new(), params }
}

fn sixty_forty() -> StrategyParams {
    StrategyParams::with_weights([("A", dec!(0.6)), ("B", dec!(0.4))])
}

fn config(strategy: StrategyConfig, days: u32) -> Config {
    Config {
        backtest: Backtest {
            start_date: day(1),
            end_date: day(days),
            initial_capital: dec!(100000),
            benchmark: None,
            data_dir: PathBuf::from("unused"),
        },
        assets: ["A", "B"]
            .iter()
            .map(|s| AssetConfig { symbol: s.to_string(), name: String::new() })
            .collect(),
        strategy,
        costs: Costs::default(),
        engine: EngineSettings::default(),
        output: Output::default(),
        sweep: None,
    }
}

/// A and B priced every day from `a` and `b`; a zero price means no observation.
fn provider(a: &[Decimal], b: &[Decimal]) -> InMemoryProvider {
    let series = |prices: &[Decimal]| -> Vec<(NaiveDate, Decimal)> {
        prices.iter().enumerate().map(|(i, p)| (day(i as u32 + 1), *p)).collect()
    };
    InMemoryProvider::new().with_prices("A", series(a)).with_prices("B", series(b))
}

fn flat(price: Decimal, days: usize) -> Vec<Decimal> {
    vec![price; days]
}

fn run(config: Config, provider: InMemoryProvider) -> Result<backtester::BacktestResult, BacktestError> {
    Backtester::from_config_with_provider(config, Box::new(provider))?.run()
}

#[test]
fn fixed_weight_buys_exact_allocation_on_day_one() {
    let result = run(
        config(strategy(StrategyId::FixedWeight, sixty_forty()), 3),
        provider(&flat(dec!(100), 3), &flat(dec!(50), 3)),
    )
    .unwrap();

    assert_eq!(result.total_trades, 2);
    let a = &result.trades[0];
    assert_eq!((a.symbol.as_str(), a.side, a.price, a.value), ("A", OrderSide::Buy, dec!(100), dec!(60000)));
    let b = &result.trades[1];
    assert_eq!((b.symbol.as_str(), b.side, b.price, b.value), ("B", OrderSide::Buy, dec!(50), dec!(40000)));
    assert!(result.trades.iter().all(|t| t.timestamp == day(1)));

    let first = &result.snapshots[0];
    assert_eq!(first.cash, Decimal::ZERO);
    assert_eq!(first.total_value, dec!(100000));
    assert_eq!(first.weights["A"], dec!(0.6));

    assert_eq!(result.final_value, dec!(100000));
    assert_eq!(result.total_return, Decimal::ZERO);
    assert_eq!(result.total_fees, Decimal::ZERO);
    assert_eq!(result.start_date, Some(day(1)));
    assert_eq!(result.end_date, Some(day(3)));
    assert!(result.rejections.is_empty());
}

#[test]
fn cool_down_suppresses_rebalancing_for_seven_days() {
    let mut params = sixty_forty();
    params.min_rebalance_interval = 7;
    let rising: Vec<Decimal> = (0..10).map(|i| dec!(100) + Decimal::from(i)).collect();

    let result = run(
        config(strategy(StrategyId::FixedWeight, params), 10),
        provider(&rising, &flat(dec!(50), 10)),
    )
    .unwrap();

    // Day 1 bootstrap, days 2-7 cooling down, day 8 rebalances again.
    assert_eq!(result.rebalance_count, 2);
    let trade_days: Vec<NaiveDate> = result.trades.iter().map(|t| t.timestamp).collect();
    assert!(trade_days.iter().all(|d| *d == day(1) || *d == day(8)));
    assert!(trade_days.contains(&day(8)));
    assert_eq!(result.snapshots.len(), 10);
}

#[test]
fn sells_are_applied_before_buys() {
    let mut params = StrategyParams::with_weights([("A", dec!(0.5)), ("B", dec!(0.5))]);
    params.threshold = dec!(0.05);

    let result = run(
        config(strategy(StrategyId::Threshold, params), 2),
        provider(&[dec!(100), dec!(200)], &[dec!(100), dec!(100)]),
    )
    .unwrap();

    let day_two: Vec<_> = result.trades.iter().filter(|t| t.timestamp == day(2)).collect();
    assert_eq!(day_two.len(), 2);
    assert_eq!((day_two[0].symbol.as_str(), day_two[0].side), ("A", OrderSide::Sell));
    assert_eq!((day_two[1].symbol.as_str(), day_two[1].side), ("B", OrderSide::Buy));

    let last = result.snapshots.last().unwrap();
    assert_eq!(last.total_value, dec!(150000));
    assert_eq!(last.weights["A"], dec!(0.5));
}

#[test]
fn unaffordable_orders_are_rejected_without_stopping_the_run() {
    let mut config = config(strategy(StrategyId::FixedWeight, sixty_forty()), 1);
    config.costs = Costs {
        commission_rate: dec!(0.001),
        min_commission: dec!(5),
        slippage_rate: Decimal::ZERO,
        tax_rate: Decimal::ZERO,
    };

    let result = run(config, provider(&[dec!(100)], &[dec!(50)])).unwrap();

    // A costs 60,060 with its fee, leaving too little for B's 40,040.
    assert_eq!(result.total_trades, 1);
    assert_eq!(result.total_fees, dec!(60));
    assert_eq!(result.rejections.len(), 1);
    let rejection = &result.rejections[0];
    assert_eq!(rejection.order.symbol, "B");
    assert_eq!(rejection.date, day(1));
    assert!(rejection.reason.contains("Not enough cash"));
    assert_eq!(result.snapshots[0].cash, dec!(39940));
    assert_eq!(result.summary().rejected_orders, 1);
}

#[test]
fn ledger_invariants_hold_for_every_snapshot() {
    let mut config = config(strategy(StrategyId::FixedWeight, sixty_forty()), 6);
    config.costs = Costs {
        commission_rate: dec!(0.0003),
        min_commission: dec!(5),
        slippage_rate: dec!(0.001),
        tax_rate: dec!(0.001),
    };
    let a = [dec!(100), dec!(120), dec!(90), dec!(95), dec!(130), dec!(80)];
    let b = [dec!(50), dec!(45), dec!(55), dec!(52), dec!(40), dec!(60)];

    let result = run(config, provider(&a, &b)).unwrap();

    for snapshot in &result.snapshots {
        let invested: Decimal = snapshot.positions.values().map(|p| p.value).sum();
        assert_eq!(snapshot.total_value, snapshot.cash + invested);
        assert!(snapshot.cash >= Decimal::ZERO);
        let weight_sum: Decimal = snapshot.weights.values().copied().sum();
        assert!(weight_sum <= Decimal::ONE + dec!(0.000000001));
    }
    assert!(result.total_fees > Decimal::ZERO);
}

fn gap_run(policy: SkippedDayPolicy) -> backtester::BacktestResult {
    let mut params = sixty_forty();
    params.min_rebalance_interval = 3;
    let mut config = config(strategy(StrategyId::FixedWeight, params), 5);
    config.engine.skipped_day_policy = policy;

    // Days 2 and 3 carry no observations.
    let a = [dec!(100), Decimal::ZERO, Decimal::ZERO, dec!(110), dec!(120)];
    let b = [dec!(50), Decimal::ZERO, Decimal::ZERO, dec!(50), dec!(50)];
    run(config, provider(&a, &b)).unwrap()
}

#[test]
fn gap_days_are_skipped_and_ignored_by_default() {
    let result = gap_run(SkippedDayPolicy::Ignore);

    assert_eq!(result.skipped_days, 2);
    assert_eq!(result.snapshots.len(), 3);
    assert!(result.snapshots.iter().all(|s| s.timestamp != day(2) && s.timestamp != day(3)));
    // Days 4 and 5 are only the first and second evaluated days of the cool-down.
    assert_eq!(result.rebalance_count, 1);
}

#[test]
fn gap_days_can_advance_the_cool_down() {
    let result = gap_run(SkippedDayPolicy::AdvanceCooldown);

    assert_eq!(result.skipped_days, 2);
    assert_eq!(result.rebalance_count, 2);
    assert!(result.trades.iter().any(|t| t.timestamp == day(4)));
}

#[test]
fn time_based_rebalances_on_its_interval() {
    let mut params = sixty_forty();
    params.rebalance_interval = 3;
    let rising: Vec<Decimal> = (0..10).map(|i| dec!(100) + Decimal::from(i * 5)).collect();

    let result = run(
        config(strategy(StrategyId::TimeBased, params), 10),
        provider(&rising, &flat(dec!(50), 10)),
    )
    .unwrap();

    assert_eq!(result.rebalance_count, 4);
    assert_eq!(result.strategy_name, "TimeBased");
    let mut trade_days: Vec<NaiveDate> = result.trades.iter().map(|t| t.timestamp).collect();
    trade_days.dedup();
    assert_eq!(trade_days, vec![day(1), day(4), day(7), day(10)]);
}

#[test]
fn weighted_valuation_runs_against_fundamentals() {
    let params = StrategyParams::with_weights([("A", dec!(0.5)), ("B", dec!(0.5))]);
    let config = config(strategy(StrategyId::WeightedValuation, params), 3);
    let expensive = |d: u32| FundamentalSnapshot {
        date: day(d),
        pe: dec!(30),
        pe_rank: dec!(85),
        asset_type: AssetType::Etf,
        ..Default::default()
    };
    let provider = provider(&[dec!(100), dec!(150), dec!(150)], &flat(dec!(100), 3))
        .with_fundamentals("A", (1..=3).map(expensive).collect());

    let result = run(config, provider).unwrap();

    // A ran up and is expensive: its weight is cut below target on day 2.
    let day_two = result.snapshots.iter().find(|s| s.timestamp == day(2)).unwrap();
    assert!(day_two.weights["A"] < dec!(0.5));
    assert!(result.trades.iter().any(|t| t.timestamp == day(2) && t.symbol == "A" && t.side == OrderSide::Sell));
}

#[test]
fn runs_are_deterministic() {
    let make = || {
        run(
            config(strategy(StrategyId::FixedWeight, sixty_forty()), 4),
            provider(&[dec!(100), dec!(101), dec!(99), dec!(103)], &[dec!(50), dec!(49), dec!(51), dec!(50)]),
        )
        .unwrap()
    };
    let (first, second) = (make(), make());
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(first.trades, second.trades);
    assert_eq!(first.snapshots, second.snapshots);
}

#[test]
fn invalid_setups_fail_before_simulating() {
    let base = config(strategy(StrategyId::FixedWeight, sixty_forty()), 3);

    let no_provider = Backtester::new(base.clone())
        .with_strategy(strategies::create_strategy(&base.strategy).unwrap())
        .with_cost_model(Box::new(SimulatedCostModel::zero()));
    assert!(matches!(no_provider.run(), Err(BacktestError::Validation(_))));

    let mut broke = base.clone();
    broke.backtest.initial_capital = Decimal::ZERO;
    assert!(matches!(run(broke, provider(&[dec!(1)], &[dec!(1)])), Err(BacktestError::Validation(_))));

    let mut empty = base.clone();
    empty.assets.clear();
    assert!(matches!(run(empty, provider(&[dec!(1)], &[dec!(1)])), Err(BacktestError::Validation(_))));

    let mut inverted = base;
    inverted.backtest.start_date = day(5);
    assert!(matches!(run(inverted, provider(&[dec!(1)], &[dec!(1)])), Err(BacktestError::Validation(_))));
}

#[test]
fn missing_symbol_data_is_fatal() {
    let provider = InMemoryProvider::new().with_prices("A", [(day(1), dec!(1))]);
    let err = run(config(strategy(StrategyId::FixedWeight, sixty_forty()), 1), provider).unwrap_err();
    assert!(matches!(err, BacktestError::Data(_)));
}

#[test]
fn export_writes_a_single_document() {
    let mut config = config(strategy(StrategyId::FixedWeight, sixty_forty()), 2);
    config.backtest.benchmark = Some("SPY".to_string());
    let result = run(config, provider(&flat(dec!(100), 2), &flat(dec!(50), 2))).unwrap();
    assert_eq!(result.summary().benchmark.as_deref(), Some("SPY"));

    let dir = std::env::temp_dir().join(format!("rebalancer-export-{}", std::process::id()));
    let path = dir.join("nested").join("result.json");
    result.export_json(&path).unwrap();

    let document: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    for key in ["summary", "trades", "snapshots", "rejections", "config"] {
        assert!(document.get(key).is_some(), "missing {key}");
    }
    assert_eq!(document["trades"].as_array().unwrap().len(), 2);
    assert_eq!(document["summary"]["strategy_name"], "FixedWeight");
    assert_eq!(document["summary"]["benchmark"], "SPY");
    assert_eq!(document["trades"][0]["side"], "BUY");

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn sweep_runs_each_configuration_independently() {
    let base = config(strategy(StrategyId::FixedWeight, sixty_forty()), 5);
    let mut periodic_config = strategy(StrategyId::TimeBased, sixty_forty());
    periodic_config.name = "Every other day".to_string();
    periodic_config.params.rebalance_interval = 2;
    let mut broken = strategy(StrategyId::Valuation, sixty_forty());
    broken.params.target_weights.clear();

    let variants = vec![base.strategy.clone(), periodic_config, broken];
    let make_provider = || -> Box<dyn MarketDataProvider> {
        Box::new(provider(
            &[dec!(100), dec!(110), dec!(105), dec!(120), dec!(115)],
            &flat(dec!(50), 5),
        ))
    };

    let runs = run_sweep(&base, &variants, make_provider);

    assert_eq!(runs.len(), 3);
    assert_eq!(runs[0].label, "FixedWeight");
    assert_eq!(runs[1].label, "Every other day");
    assert_eq!(runs[2].label, "ValuationDriven");

    let fixed = runs[0].outcome.as_ref().unwrap();
    let periodic = runs[1].outcome.as_ref().unwrap();
    assert_eq!(fixed.rebalance_count, 5);
    assert_eq!(periodic.rebalance_count, 3);
    assert_eq!(periodic.config.strategy.params.rebalance_interval, 2);
    assert!(matches!(runs[2].outcome, Err(BacktestError::Strategy(_))));
}
