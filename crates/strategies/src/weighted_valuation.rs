use crate::clock::RebalanceClock;
use crate::error::StrategyError;
use crate::{normalize_weights, Strategy};
use configuration::{StrategyParams, WeightedValuationParams, YieldThreshold};
use core_types::{AssetType, DeviationSignal, Position, PriceMap, Weights};
use executor::Portfolio;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

/// Stand-in PB when an index fund publishes none; sits between the bands.
const NEUTRAL_PB: Decimal = dec!(1.0);

/// Drift-triggered rebalancing tempered by valuation.
///
/// A position that drifted past the relative threshold is traded back, harder
/// when its indicators agree with the direction of the trade, and not at all
/// when they contradict it.
#[derive(Debug, Clone)]
pub struct WeightedValuation {
    name: String,
    targets: Weights,
    params: WeightedValuationParams,
    yield_thresholds: BTreeMap<String, YieldThreshold>,
    min_trade_value: Decimal,
    clock: RebalanceClock,
}

impl WeightedValuation {
    pub fn new(name: impl Into<String>, params: &StrategyParams) -> Result<Self, StrategyError> {
        let targets = params.weights();
        if targets.is_empty() {
            return Err(StrategyError::InvalidParameters(
                "WeightedValuation requires at least one target weight".to_string(),
            ));
        }

        let mut weighted = params.weighted_valuation.clone().unwrap_or_default();
        if params.threshold > Decimal::ZERO {
            weighted.deviation_threshold = params.threshold;
        }
        if weighted.deviation_threshold <= Decimal::ZERO {
            return Err(StrategyError::InvalidParameters(
                "deviation_threshold must be positive".to_string(),
            ));
        }
        for (label, ratio) in [("strong_ratio", weighted.strong_ratio), ("trim_ratio", weighted.trim_ratio)] {
            if ratio < Decimal::ZERO || ratio > Decimal::ONE {
                return Err(StrategyError::InvalidParameters(format!(
                    "{label} must be within [0, 1], got {ratio}"
                )));
            }
        }
        if weighted.add_ratio < Decimal::ZERO {
            return Err(StrategyError::InvalidParameters(format!(
                "add_ratio must not be negative, got {}",
                weighted.add_ratio
            )));
        }

        Ok(Self {
            name: name.into(),
            targets,
            yield_thresholds: weighted.yield_thresholds(),
            params: weighted,
            min_trade_value: params.min_trade_value,
            clock: RebalanceClock::new(params.min_rebalance_interval),
        })
    }

    pub fn deviation_threshold(&self) -> Decimal {
        self.params.deviation_threshold
    }

    /// Classifies one holding given its current and target weights.
    pub fn evaluate(&self, position: &Position, current: Decimal, target: Decimal) -> DeviationSignal {
        if target.is_zero() {
            return DeviationSignal::Skip;
        }

        let p = &self.params;
        let deviation = (current - target) / target;
        let over = deviation > p.deviation_threshold;
        let under = deviation < -p.deviation_threshold;

        let Some(fundamental) = position.fundamental.as_ref() else {
            return drift_only(over, under);
        };

        let mut rank = fundamental.pe_rank;
        if rank > Decimal::ONE {
            rank /= dec!(100);
        }
        let pe_low = rank > Decimal::ZERO && rank <= p.pe_low_rank;
        let pe_high = rank > Decimal::ZERO && rank >= p.pe_high_rank;

        if p.index_etf_symbol.as_deref() == Some(position.symbol.as_str()) {
            let pb = fundamental.pb.unwrap_or(NEUTRAL_PB);
            let double_low = pe_low && pb < p.pb_low;
            let double_high = pe_high && pb > p.pb_high;
            return indicator_vote(over, under, double_low, double_high);
        }

        if let Some(threshold) = self.yield_thresholds.get(&position.symbol) {
            let bond_yield = fundamental.bond_yield.unwrap_or(Decimal::ZERO);
            // A high yield means the bond is cheap.
            let cheap = bond_yield > threshold.high;
            let expensive = bond_yield > Decimal::ZERO && bond_yield < threshold.low;
            return indicator_vote(over, under, cheap, expensive);
        }

        if matches!(fundamental.asset_type, AssetType::Bond | AssetType::Gold) {
            return drift_only(over, under);
        }

        indicator_vote(over, under, pe_low, pe_high)
    }

    /// The current classification of every held position with a target.
    pub fn signals(&self, portfolio: &Portfolio) -> BTreeMap<String, DeviationSignal> {
        let current = portfolio.weights();
        portfolio
            .positions()
            .values()
            .filter_map(|position| {
                let target = self.targets.get(&position.symbol).copied()?;
                let weight = current.get(&position.symbol).copied().unwrap_or(Decimal::ZERO);
                Some((position.symbol.clone(), self.evaluate(position, weight, target)))
            })
            .collect()
    }
}

fn drift_only(over: bool, under: bool) -> DeviationSignal {
    if over {
        DeviationSignal::Sell
    } else if under {
        DeviationSignal::Buy
    } else {
        DeviationSignal::Normal
    }
}

fn indicator_vote(over: bool, under: bool, cheap: bool, expensive: bool) -> DeviationSignal {
    if over {
        if expensive {
            DeviationSignal::StrongSell
        } else if cheap {
            DeviationSignal::HoldNoSell
        } else {
            DeviationSignal::Sell
        }
    } else if under {
        if cheap {
            DeviationSignal::StrongBuy
        } else if expensive {
            DeviationSignal::HoldNoBuy
        } else {
            DeviationSignal::Buy
        }
    } else {
        DeviationSignal::Normal
    }
}

impl Strategy for WeightedValuation {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_weights(&self, portfolio: &Portfolio, _prices: &PriceMap) -> Weights {
        let p = &self.params;
        let current = portfolio.weights();
        let mut weights = self.targets.clone();

        for (symbol, signal) in self.signals(portfolio) {
            let target = self.targets.get(&symbol).copied().unwrap_or(Decimal::ZERO);
            let held = current.get(&symbol).copied().unwrap_or(Decimal::ZERO);
            let weight = match signal {
                DeviationSignal::StrongSell => target * (Decimal::ONE - p.strong_ratio),
                DeviationSignal::Sell => target * (Decimal::ONE - p.trim_ratio),
                DeviationSignal::StrongBuy => target * (Decimal::ONE + p.strong_ratio),
                DeviationSignal::Buy => target * (Decimal::ONE + p.add_ratio),
                DeviationSignal::HoldNoSell | DeviationSignal::HoldNoBuy => held,
                DeviationSignal::Normal | DeviationSignal::Skip => target,
            };
            tracing::debug!("WeightedValuation: {} is {:?}, target weight {}", symbol, signal, weight);
            weights.insert(symbol, weight);
        }

        normalize_weights(&weights)
    }

    fn should_rebalance(&mut self, portfolio: &Portfolio, _prices: &PriceMap) -> bool {
        if self.clock.is_first_day() {
            return true;
        }

        self.clock.tick();
        if self.clock.cooling_down() {
            return false;
        }

        let current = portfolio.weights();
        self.targets.iter().any(|(symbol, target)| {
            if target.is_zero() {
                return false;
            }
            let weight = current.get(symbol).copied().unwrap_or(Decimal::ZERO);
            ((weight - target) / target).abs() > self.params.deviation_threshold
        })
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
