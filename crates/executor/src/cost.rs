use configuration::Costs;
use core_types::{OrderSide, Trade};
use rust_decimal::Decimal;
use std::fmt::Debug;

/// Friction applied to every simulated fill.
///
/// A cost model is a pure calculator: it prices a fill and its fee but never
/// touches account state. The `Portfolio` applies the results.
pub trait CostModel: Debug + Send + Sync {
    /// The fee charged for an executed trade, based on its (slipped) value.
    fn fee(&self, trade: &Trade) -> Decimal;

    /// The price actually obtained for an order requested at `price`.
    fn execution_price(&self, price: Decimal, side: OrderSide) -> Decimal;
}

/// Proportional commission with a floor, a sell-side tax, and a fixed slippage
/// multiplier.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedCostModel {
    params: Costs,
}

impl SimulatedCostModel {
    pub fn new(params: Costs) -> Self {
        Self { params }
    }

    /// A model with every rate at zero, for isolating allocation logic.
    pub fn zero() -> Self {
        Self::new(Costs::default())
    }

    /// Fee plus the value lost to slippage on the trade.
    pub fn total_cost(&self, trade: &Trade) -> Decimal {
        let slippage_loss = (trade.quantity * trade.price * self.params.slippage_rate).abs();
        self.fee(trade) + slippage_loss
    }
}

impl Default for SimulatedCostModel {
    fn default() -> Self {
        Self::zero()
    }
}

impl CostModel for SimulatedCostModel {
    fn fee(&self, trade: &Trade) -> Decimal {
        let trade_value = (trade.quantity * trade.price).abs();

        let mut commission = trade_value * self.params.commission_rate;
        if commission < self.params.min_commission && trade_value > Decimal::ZERO {
            commission = self.params.min_commission;
        }

        let tax = match trade.side {
            OrderSide::Sell => trade_value * self.params.tax_rate,
            OrderSide::Buy => Decimal::ZERO,
        };

        commission + tax
    }

    fn execution_price(&self, price: Decimal, side: OrderSide) -> Decimal {
        match side {
            // Buying fills higher.
            OrderSide::Buy => price * (Decimal::ONE + self.params.slippage_rate),
            // Selling fills lower.
            OrderSide::Sell => price * (Decimal::ONE - self.params.slippage_rate),
        }
    }
}
