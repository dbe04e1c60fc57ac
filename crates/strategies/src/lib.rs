//! # Rebalancing Strategy Library
//!
//! This crate contains the allocation policies of the backtester. It defines a
//! universal `Strategy` trait and provides one concrete type per policy.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** Strategies read the ledger and the day's prices, and answer
//!   three questions: should we rebalance today, towards which weights, and with
//!   which orders. They never execute anything.
//! - **Strategy Agnostic Engine:** By using the `Strategy` trait, the backtester
//!   can drive any policy without knowing its internal details.
//! - **Extensibility:** Adding a new policy involves creating a new module,
//!   implementing the `Strategy` trait, and adding it to `StrategyId` and the `factory`.
//!
//! ## Public API
//!
//! - `Strategy`: The core trait all policies implement.
//! - `create_strategy`: The factory function to construct a policy instance.
//! - `normalize_weights` and `rebalance_orders`: helpers shared by every policy.
//! - The concrete policy structs themselves (e.g., `FixedWeight`).

pub mod clock;
pub mod error;
pub mod factory;
pub mod fixed_weight;
pub mod orders;
pub mod time_based;
pub mod valuation;
pub mod weighted_valuation;

pub use clock::RebalanceClock;
pub use error::StrategyError;
pub use factory::{create_strategy, parse_strategy_id};
pub use fixed_weight::FixedWeight;
pub use orders::rebalance_orders;
pub use time_based::TimeBased;
pub use valuation::Valuation;
pub use weighted_valuation::WeightedValuation;

// Re-export StrategyId from core_types
pub use core_types::StrategyId;

use core_types::{Order, PriceMap, Weights};
use executor::Portfolio;
use rust_decimal::Decimal;

/// The contract between the simulation engine and an allocation policy.
///
/// `should_rebalance` takes `&mut self` because policies count the days since
/// their last rebalance. The `Send + Sync` bounds allow one independent
/// instance per run in parallel sweeps.
pub trait Strategy: Send + Sync {
    /// Display name used in logs and results.
    fn name(&self) -> &str;

    /// The weights the policy wants today. May be unnormalized; the engine
    /// normalizes before generating orders.
    fn target_weights(&self, portfolio: &Portfolio, prices: &PriceMap) -> Weights;

    /// Called once per evaluated day, before any target is computed.
    fn should_rebalance(&mut self, portfolio: &Portfolio, prices: &PriceMap) -> bool;

    /// Trades smaller than this notional are not worth placing.
    fn min_trade_value(&self) -> Decimal;

    /// Orders that move the ledger towards `targets`, sales first.
    fn generate_orders(&self, portfolio: &Portfolio, targets: &Weights, prices: &PriceMap) -> Vec<Order> {
        rebalance_orders(portfolio, targets, prices, self.min_trade_value())
    }

    /// Called after the day's orders have been applied.
    fn on_rebalance(&mut self);

    /// Called for a day with no observed prices when gaps count towards the
    /// cool-down.
    fn on_skipped_day(&mut self);
}

/// Scales weights so that they sum to one. All-zero input is returned unchanged.
pub fn normalize_weights(weights: &Weights) -> Weights {
    let total: Decimal = weights.values().copied().sum();
    if total.is_zero() {
        return weights.clone();
    }
    weights
        .iter()
        .map(|(symbol, weight)| (symbol.clone(), weight / total))
        .collect()
}
