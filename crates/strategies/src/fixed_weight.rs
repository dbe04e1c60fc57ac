use crate::clock::RebalanceClock;
use crate::error::StrategyError;
use crate::Strategy;
use configuration::StrategyParams;
use core_types::{PriceMap, Weights};
use executor::Portfolio;
use rust_decimal::Decimal;

/// Static target weights.
///
/// With a zero threshold the policy rebalances on every evaluated day once the
/// cool-down has elapsed. With a positive threshold it only rebalances when some
/// target drifts further than the threshold, in absolute weight.
#[derive(Debug, Clone)]
pub struct FixedWeight {
    name: String,
    targets: Weights,
    threshold: Decimal,
    min_trade_value: Decimal,
    clock: RebalanceClock,
}

impl FixedWeight {
    pub fn new(name: impl Into<String>, params: &StrategyParams) -> Result<Self, StrategyError> {
        let targets = params.weights();
        if targets.is_empty() {
            return Err(StrategyError::InvalidParameters(
                "FixedWeight requires at least one target weight".to_string(),
            ));
        }
        if params.threshold < Decimal::ZERO {
            return Err(StrategyError::InvalidParameters(format!(
                "threshold must not be negative, got {}",
                params.threshold
            )));
        }

        Ok(Self {
            name: name.into(),
            targets,
            threshold: params.threshold,
            min_trade_value: params.min_trade_value,
            clock: RebalanceClock::new(params.min_rebalance_interval),
        })
    }

    fn drifted(&self, portfolio: &Portfolio) -> bool {
        let current = portfolio.weights();
        self.targets.iter().any(|(symbol, target)| {
            let weight = current.get(symbol).copied().unwrap_or(Decimal::ZERO);
            (weight - target).abs() > self.threshold
        })
    }
}

impl Strategy for FixedWeight {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_weights(&self, _portfolio: &Portfolio, _prices: &PriceMap) -> Weights {
        self.targets.clone()
    }

    fn should_rebalance(&mut self, portfolio: &Portfolio, _prices: &PriceMap) -> bool {
        if self.clock.is_first_day() {
            return true;
        }

        self.clock.tick();
        if self.clock.cooling_down() {
            return false;
        }

        self.threshold.is_zero() || self.drifted(portfolio)
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
