use crate::clock::RebalanceClock;
use crate::error::StrategyError;
use crate::Strategy;
use configuration::StrategyParams;
use core_types::{PriceMap, Weights};
use executor::Portfolio;
use rust_decimal::Decimal;

/// Interval used when none is configured.
pub const DEFAULT_REBALANCE_INTERVAL: u32 = 30;

/// Calendar rebalancing: back to the static targets every `interval` evaluated
/// days, regardless of drift.
#[derive(Debug, Clone)]
pub struct TimeBased {
    name: String,
    targets: Weights,
    interval: u32,
    min_trade_value: Decimal,
    clock: RebalanceClock,
}

impl TimeBased {
    pub fn new(name: impl Into<String>, params: &StrategyParams) -> Result<Self, StrategyError> {
        let targets = params.weights();
        if targets.is_empty() {
            return Err(StrategyError::InvalidParameters(
                "TimeBased requires at least one target weight".to_string(),
            ));
        }

        let interval = match params.rebalance_interval {
            0 => DEFAULT_REBALANCE_INTERVAL,
            days => days,
        };

        Ok(Self {
            name: name.into(),
            targets,
            interval,
            min_trade_value: params.min_trade_value,
            clock: RebalanceClock::new(0),
        })
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }
}

impl Strategy for TimeBased {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_weights(&self, _portfolio: &Portfolio, _prices: &PriceMap) -> Weights {
        self.targets.clone()
    }

    fn should_rebalance(&mut self, _portfolio: &Portfolio, _prices: &PriceMap) -> bool {
        if self.clock.is_first_day() {
            return true;
        }
        self.clock.tick();
        self.clock.days_since_rebalance() >= self.interval
    }

    fn min_trade_value(&self) -> Decimal {
        self.min_trade_value
    }

    fn on_rebalance(&mut self) {
        self.clock.reset();
    }

    fn on_skipped_day(&mut self) {
        self.clock.tick();
    }
}
