use crate::clock::RebalanceClock;
use crate::error::StrategyError;
use crate::{normalize_weights, Strategy};
use configuration::{StrategyParams, ValuationParams};
use core_types::{AssetType, Position, PriceMap, ValuationSignal, Weights};
use executor::Portfolio;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

/// PE percentile above which an individual stock counts as expensive.
const STOCK_HIGH_PE_RANK: Decimal = dec!(80);

/// Overweight applied to quality holdings.
const STRONG_HOLD_FACTOR: Decimal = dec!(1.1);

/// Valuation-driven allocation.
///
/// Each held position with fundamentals is classified from its PE percentile,
/// PEG, ROE and asset type, and its base weight is scaled by the resulting
/// signal before the whole map is normalized.
#[derive(Debug, Clone)]
pub struct Valuation {
    name: String,
    base_weights: Weights,
    params: ValuationParams,
    min_trade_value: Decimal,
    clock: RebalanceClock,
}

impl Valuation {
    pub fn new(name: impl Into<String>, params: &StrategyParams) -> Result<Self, StrategyError> {
        let base_weights = params.weights();
        if base_weights.is_empty() {
            return Err(StrategyError::InvalidParameters(
                "Valuation requires at least one base weight".to_string(),
            ));
        }

        let valuation = params.valuation.clone().unwrap_or_default();
        for (label, ratio) in [
            ("trim_ratio", valuation.trim_ratio),
            ("reduce_ratio", valuation.reduce_ratio),
            ("sell_ratio", valuation.sell_ratio),
        ] {
            if ratio < Decimal::ZERO || ratio > Decimal::ONE {
                return Err(StrategyError::InvalidParameters(format!(
                    "{label} must be within [0, 1], got {ratio}"
                )));
            }
        }
        if valuation.buy_ratio < Decimal::ZERO {
            return Err(StrategyError::InvalidParameters(format!(
                "buy_ratio must not be negative, got {}",
                valuation.buy_ratio
            )));
        }

        Ok(Self {
            name: name.into(),
            base_weights,
            params: valuation,
            min_trade_value: params.min_trade_value,
            clock: RebalanceClock::new(params.min_rebalance_interval),
        })
    }

    /// Classifies a single holding. Positions without fundamentals are `Unknown`.
    pub fn classify(&self, position: &Position) -> ValuationSignal {
        let Some(fundamental) = position.fundamental.as_ref() else {
            return ValuationSignal::Unknown;
        };
        let p = &self.params;

        // Losing money on a company that does not earn.
        if position.unrealized_pnl < Decimal::ZERO
            && (fundamental.pe.is_zero() || fundamental.roe < p.poor_roe)
        {
            return ValuationSignal::StrongSell;
        }

        if fundamental.asset_type.is_safe() {
            return ValuationSignal::Allocate;
        }

        let rank = fundamental.pe_rank;
        let ranked = rank > Decimal::ZERO;

        match fundamental.asset_type {
            AssetType::Etf => {
                let extreme = ranked && rank >= p.extreme_high_pe_rank;
                let high = ranked && rank >= p.high_pe_rank;
                let low = ranked && rank <= p.low_pe_rank;
                let core_low = (fundamental.is_core_etf || fundamental.is_tech_etf)
                    && ranked
                    && rank <= p.core_low_pe_rank;

                if extreme && fundamental.is_core_etf {
                    ValuationSignal::Trim
                } else if extreme && fundamental.is_tech_etf {
                    ValuationSignal::Hold
                } else if extreme {
                    ValuationSignal::Sell
                } else if low || core_low {
                    ValuationSignal::Buy
                } else if high {
                    ValuationSignal::Watch
                } else {
                    ValuationSignal::Hold
                }
            }
            AssetType::Stock => {
                let peg = fundamental.peg;
                if rank >= STOCK_HIGH_PE_RANK && peg > p.bubble_peg {
                    ValuationSignal::StrongSell
                } else if peg > p.high_peg {
                    ValuationSignal::Reduce
                } else if (peg > Decimal::ZERO && peg < p.low_peg) || fundamental.roe >= p.good_roe {
                    ValuationSignal::StrongHold
                } else if rank >= STOCK_HIGH_PE_RANK {
                    ValuationSignal::Reduce
                } else {
                    ValuationSignal::Hold
                }
            }
            _ => ValuationSignal::Unknown,
        }
    }

    /// The current classification of every held position with fundamentals.
    pub fn signals(&self, portfolio: &Portfolio) -> BTreeMap<String, ValuationSignal> {
        portfolio
            .positions()
            .values()
            .filter(|position| position.fundamental.is_some())
            .map(|position| (position.symbol.clone(), self.classify(position)))
            .collect()
    }

    fn scale(&self, signal: ValuationSignal) -> Option<Decimal> {
        let p = &self.params;
        match signal {
            ValuationSignal::StrongSell | ValuationSignal::Sell => Some(Decimal::ONE - p.sell_ratio),
            ValuationSignal::Trim => Some(Decimal::ONE - p.trim_ratio),
            ValuationSignal::Reduce => Some(Decimal::ONE - p.reduce_ratio),
            ValuationSignal::Buy => Some(Decimal::ONE + p.buy_ratio),
            ValuationSignal::StrongHold => Some(STRONG_HOLD_FACTOR),
            _ => None,
        }
    }
}

impl Strategy for Valuation {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_weights(&self, portfolio: &Portfolio, _prices: &PriceMap) -> Weights {
        let mut weights = self.base_weights.clone();

        for (symbol, signal) in self.signals(portfolio) {
            if let Some(factor) = self.scale(signal) {
                let base = self.base_weights.get(&symbol).copied().unwrap_or(Decimal::ZERO);
                tracing::debug!("Valuation: {} is {}, scaling base weight by {}", symbol, signal, factor);
                weights.insert(symbol, base * factor);
            }
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

        self.signals(portfolio).values().any(ValuationSignal::is_actionable)
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
