//! # Backtester Crate
//!
//! The day-by-day simulation engine. For every trading day it marks the ledger
//! to market, asks the strategy whether and how to rebalance, applies the
//! resulting orders, and records a snapshot.

use configuration::{Config, SkippedDayPolicy};
use executor::{CostModel, Portfolio, SimulatedCostModel};
use indicatif::{ProgressBar, ProgressStyle};
use market_data::{CsvProvider, MarketDataProvider};
use rust_decimal::Decimal;
use strategies::{Strategy, create_strategy, normalize_weights};
use uuid::Uuid;

pub mod error;
pub mod result;
pub mod sweep;

pub use error::BacktestError;
pub use result::{BacktestResult, OrderRejection, ResultSummary};
pub use sweep::{SweepRun, run_sweep};

/// The main backtesting engine.
///
/// One engine drives exactly one run: it owns its provider, strategy and cost
/// model, and `run` consumes it.
pub struct Backtester {
    run_id: Uuid,
    config: Config,
    provider: Option<Box<dyn MarketDataProvider>>,
    strategy: Option<Box<dyn Strategy>>,
    cost_model: Option<Box<dyn CostModel>>,
}

impl Backtester {
    /// An engine with no components attached yet.
    pub fn new(config: Config) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            config,
            provider: None,
            strategy: None,
            cost_model: None,
        }
    }

    /// Wires the standard components: CSV files from `backtest.data_dir`, the
    /// configured strategy and the configured costs.
    pub fn from_config(config: Config) -> Result<Self, BacktestError> {
        let provider = CsvProvider::new(config.backtest.data_dir.clone());
        Self::from_config_with_provider(config, Box::new(provider))
    }

    /// Like `from_config`, reading market data from `provider` instead.
    pub fn from_config_with_provider(
        config: Config,
        provider: Box<dyn MarketDataProvider>,
    ) -> Result<Self, BacktestError> {
        let strategy = create_strategy(&config.strategy)?;
        let cost_model = SimulatedCostModel::new(config.costs.clone());
        Ok(Self::new(config)
            .with_provider(provider)
            .with_strategy(strategy)
            .with_cost_model(Box::new(cost_model)))
    }

    pub fn with_provider(mut self, provider: Box<dyn MarketDataProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_cost_model(mut self, cost_model: Box<dyn CostModel>) -> Self {
        self.cost_model = Some(cost_model);
        self
    }

    /// Checks everything a run needs before any data is touched.
    pub fn validate(&self) -> Result<(), BacktestError> {
        let missing = [
            (self.provider.is_none(), "market data provider"),
            (self.strategy.is_none(), "strategy"),
            (self.cost_model.is_none(), "cost model"),
        ];
        if let Some((_, component)) = missing.iter().find(|(absent, _)| *absent) {
            return Err(BacktestError::Validation(format!("no {component} attached")));
        }

        let backtest = &self.config.backtest;
        if self.config.assets.is_empty() {
            return Err(BacktestError::Validation("the asset universe is empty".to_string()));
        }
        if backtest.initial_capital <= Decimal::ZERO {
            return Err(BacktestError::Validation(format!(
                "initial capital must be positive, got {}",
                backtest.initial_capital
            )));
        }
        if backtest.start_date > backtest.end_date {
            return Err(BacktestError::Validation(format!(
                "start date {} is after end date {}",
                backtest.start_date, backtest.end_date
            )));
        }
        Ok(())
    }

    /// Runs the simulation from the first to the last trading date.
    pub fn run(self) -> Result<BacktestResult, BacktestError> {
        self.validate()?;

        let Backtester { run_id, config, provider, strategy, cost_model } = self;
        let (Some(mut provider), Some(mut strategy), Some(cost_model)) = (provider, strategy, cost_model) else {
            return Err(BacktestError::Validation("engine components missing".to_string()));
        };

        let backtest = &config.backtest;
        let symbols = config.symbols();
        let policy = config.engine.skipped_day_policy;

        tracing::info!(
            %run_id,
            strategy = strategy.name(),
            symbols = symbols.len(),
            start = %backtest.start_date,
            end = %backtest.end_date,
            "Starting backtest."
        );

        provider.load(&symbols, backtest.start_date, backtest.end_date)?;
        let dates = provider.trading_dates().to_vec();

        let progress_bar = if config.engine.show_progress {
            let bar = ProgressBar::new(dates.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                    .progress_chars("=>-"),
            );
            Some(bar)
        } else {
            None
        };

        let initial_capital = backtest.initial_capital;
        let mut portfolio = Portfolio::new(initial_capital, cost_model);
        let mut snapshots = Vec::with_capacity(dates.len());
        let mut rejections = Vec::new();
        let mut rebalance_count = 0usize;
        let mut skipped_days = 0usize;

        for date in dates {
            if let Some(bar) = &progress_bar {
                bar.inc(1);
            }

            let prices = provider.prices_on(date);
            if prices.is_empty() {
                skipped_days += 1;
                if policy == SkippedDayPolicy::AdvanceCooldown {
                    strategy.on_skipped_day();
                }
                tracing::debug!("No prices observed on {}, day skipped", date);
                continue;
            }

            portfolio.update_prices(&prices, date);
            portfolio.update_fundamentals(&provider.fundamentals_on(date));

            if strategy.should_rebalance(&portfolio, &prices) {
                let targets = normalize_weights(&strategy.target_weights(&portfolio, &prices));
                let orders = strategy.generate_orders(&portfolio, &targets, &prices);
                tracing::debug!("Rebalancing on {} with {} orders", date, orders.len());

                for order in orders {
                    if let Err(e) = portfolio.apply_order(&order, date) {
                        tracing::warn!(
                            %date,
                            symbol = %order.symbol,
                            side = %order.side,
                            quantity = %order.quantity,
                            error = %e,
                            "Order rejected."
                        );
                        rejections.push(OrderRejection { date, order, reason: e.to_string() });
                    }
                }

                portfolio.update_prices(&prices, date);
                strategy.on_rebalance();
                rebalance_count += 1;
            }

            snapshots.push(portfolio.snapshot());
        }

        if let Some(bar) = &progress_bar {
            bar.finish_with_message("Simulation complete.");
        }

        let final_value = snapshots
            .last()
            .map(|snapshot| snapshot.total_value)
            .unwrap_or(initial_capital);
        let total_return = (final_value - initial_capital) / initial_capital;
        let start_date = snapshots.first().map(|snapshot| snapshot.timestamp);
        let end_date = snapshots.last().map(|snapshot| snapshot.timestamp);
        let strategy_name = strategy.name().to_string();

        let trades = portfolio.into_trades();
        let total_fees: Decimal = trades.iter().map(|trade| trade.fee).sum();

        tracing::info!(
            %run_id,
            strategy = %strategy_name,
            %final_value,
            %total_return,
            trades = trades.len(),
            rejected = rejections.len(),
            "Backtest finished."
        );

        Ok(BacktestResult {
            run_id,
            strategy_name,
            initial_capital,
            final_value,
            total_return,
            total_trades: trades.len(),
            total_fees,
            rebalance_count,
            skipped_days,
            start_date,
            end_date,
            trades,
            snapshots,
            rejections,
            config,
        })
    }
}
