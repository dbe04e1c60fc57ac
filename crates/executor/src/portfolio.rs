use crate::cost::CostModel;
use crate::error::ExecutorError;
use chrono::NaiveDate;
use core_types::{
    CASH_SYMBOL, FundamentalMap, Order, OrderSide, Position, PriceMap, Snapshot, Trade, Weights,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

/// Positions whose remaining quantity falls below this after a sale are closed.
pub const DUST_QUANTITY: Decimal = dec!(0.0001);

/// The account ledger for a single backtest run: cash, open positions, the
/// last marked total value, and the log of every executed trade.
///
/// Positions are only ever long. After every successful order cash is
/// non-negative and `total_value` equals cash plus the sum of position values.
#[derive(Debug)]
pub struct Portfolio {
    timestamp: Option<NaiveDate>,
    cash: Decimal,
    positions: BTreeMap<String, Position>,
    total_value: Decimal,
    trades: Vec<Trade>,
    cost_model: Box<dyn CostModel>,
}

impl Portfolio {
    /// Creates a ledger holding only `initial_capital` in cash.
    pub fn new(initial_capital: Decimal, cost_model: Box<dyn CostModel>) -> Self {
        Self {
            timestamp: None,
            cash: initial_capital,
            positions: BTreeMap::new(),
            total_value: initial_capital,
            trades: Vec::new(),
            cost_model,
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn total_value(&self) -> Decimal {
        self.total_value
    }

    /// The date of the last price refresh, if any.
    pub fn timestamp(&self) -> Option<NaiveDate> {
        self.timestamp
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Quantity held of `symbol`, zero when there is no position.
    pub fn quantity(&self, symbol: &str) -> Decimal {
        self.positions
            .get(symbol)
            .map(|p| p.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Consumes the ledger and hands back its trade log.
    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }

    /// Executes an order in full or not at all.
    ///
    /// The fill happens at the cost model's slipped price and the fee is charged
    /// on the slipped value. On error the ledger is left untouched.
    pub fn apply_order(&mut self, order: &Order, timestamp: NaiveDate) -> Result<Trade, ExecutorError> {
        order.validate()?;

        let exec_price = self.cost_model.execution_price(order.price, order.side);
        let value = order.quantity * exec_price;
        let mut trade = Trade {
            timestamp,
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price: exec_price,
            fee: Decimal::ZERO,
            value,
        };
        trade.fee = self.cost_model.fee(&trade);

        match order.side {
            OrderSide::Buy => self.execute_buy(&trade)?,
            OrderSide::Sell => self.execute_sell(&trade)?,
        }

        self.recompute_total();
        self.trades.push(trade.clone());

        tracing::debug!(
            "Portfolio: {} {} {} @ {} (fee: {}) on {}",
            trade.side, trade.quantity, trade.symbol, trade.price, trade.fee, timestamp
        );

        Ok(trade)
    }

    fn execute_buy(&mut self, trade: &Trade) -> Result<(), ExecutorError> {
        let required = trade.value + trade.fee;
        if self.cash < required {
            return Err(ExecutorError::InsufficientCash {
                required,
                available: self.cash,
            });
        }

        self.cash -= required;

        let position = self
            .positions
            .entry(trade.symbol.clone())
            .or_insert_with(|| Position::new(trade.symbol.clone(), Decimal::ZERO, trade.price));

        let new_quantity = position.quantity + trade.quantity;
        position.avg_cost =
            (position.avg_cost * position.quantity + trade.price * trade.quantity) / new_quantity;
        position.quantity = new_quantity;
        mark(position, trade.price);

        Ok(())
    }

    fn execute_sell(&mut self, trade: &Trade) -> Result<(), ExecutorError> {
        let available = self.quantity(&trade.symbol);
        if available < trade.quantity {
            return Err(ExecutorError::InsufficientShares {
                symbol: trade.symbol.clone(),
                requested: trade.quantity,
                available,
            });
        }

        // A minimum commission larger than the proceeds must not overdraw the account.
        let proceeds = trade.value - trade.fee;
        if self.cash + proceeds < Decimal::ZERO {
            return Err(ExecutorError::InsufficientCash {
                required: trade.fee,
                available: self.cash + trade.value,
            });
        }

        self.cash += proceeds;

        if let Some(position) = self.positions.get_mut(&trade.symbol) {
            position.quantity -= trade.quantity;
            if position.quantity < DUST_QUANTITY {
                self.positions.remove(&trade.symbol);
            } else {
                mark(position, trade.price);
            }
        }

        Ok(())
    }

    /// Marks every position with a price in `prices` to market and refreshes the
    /// total value. Positions without a price keep their last value.
    pub fn update_prices(&mut self, prices: &PriceMap, timestamp: NaiveDate) {
        self.timestamp = Some(timestamp);
        for (symbol, position) in self.positions.iter_mut() {
            if let Some(price) = prices.get(symbol) {
                mark(position, *price);
            }
        }
        self.recompute_total();
    }

    /// Attaches the day's indicators to the matching positions.
    pub fn update_fundamentals(&mut self, fundamentals: &FundamentalMap) {
        for (symbol, position) in self.positions.iter_mut() {
            if let Some(snapshot) = fundamentals.get(symbol) {
                position.fundamental = Some(snapshot.clone());
            }
        }
    }

    /// Current weight of every position plus `CASH`. Empty when the account is
    /// worth nothing.
    pub fn weights(&self) -> Weights {
        let mut weights = Weights::new();
        if self.total_value.is_zero() {
            return weights;
        }
        for (symbol, position) in &self.positions {
            weights.insert(symbol.clone(), position.value / self.total_value);
        }
        weights.insert(CASH_SYMBOL.to_string(), self.cash / self.total_value);
        weights
    }

    /// Whether spending `amount` on `symbol` at `price` would fit in the cash
    /// balance once slippage and fees are accounted for.
    ///
    /// Cash is checked against the slipped buy price plus the fee on that
    /// slipped value, the same amount `apply_order` would debit.
    pub fn can_buy(&self, symbol: &str, amount: Decimal, price: Decimal) -> bool {
        if amount <= Decimal::ZERO || price <= Decimal::ZERO {
            return false;
        }
        let exec_price = self.cost_model.execution_price(price, OrderSide::Buy);
        let quantity = amount / price;
        let trade = Trade {
            timestamp: self.timestamp.unwrap_or_default(),
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            quantity,
            price: exec_price,
            fee: Decimal::ZERO,
            value: quantity * exec_price,
        };
        self.cash >= trade.value + self.cost_model.fee(&trade)
    }

    /// A deep copy of the ledger's state for the daily history.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            timestamp: self.timestamp.unwrap_or_default(),
            cash: self.cash,
            positions: self.positions.clone(),
            total_value: self.total_value,
            weights: self.weights(),
        }
    }

    fn recompute_total(&mut self) {
        let invested: Decimal = self.positions.values().map(|p| p.value).sum();
        self.total_value = self.cash + invested;
    }
}

fn mark(position: &mut Position, price: Decimal) {
    position.value = position.quantity * price;
    position.unrealized_pnl = (price - position.avg_cost) * position.quantity;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::SimulatedCostModel;
    use configuration::Costs;
    use core_types::{AssetType, FundamentalSnapshot};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn frictionless(capital: Decimal) -> Portfolio {
        Portfolio::new(capital, Box::new(SimulatedCostModel::zero()))
    }

    fn with_costs(capital: Decimal) -> Portfolio {
        let costs = Costs {
            commission_rate: dec!(0.001),
            min_commission: dec!(5),
            slippage_rate: dec!(0.01),
            tax_rate: dec!(0.001),
        };
        Portfolio::new(capital, Box::new(SimulatedCostModel::new(costs)))
    }

    fn prices(entries: &[(&str, Decimal)]) -> PriceMap {
        entries.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    fn assert_balanced(portfolio: &Portfolio) {
        let invested: Decimal = portfolio.positions().values().map(|p| p.value).sum();
        assert_eq!(portfolio.total_value(), portfolio.cash() + invested);
        assert!(portfolio.cash() >= Decimal::ZERO);
    }

    #[test]
    fn frictionless_buy_moves_cash_into_position() {
        let mut portfolio = frictionless(dec!(100000));
        let trade = portfolio.apply_order(&Order::buy("A", dec!(600), dec!(100)), day(2)).unwrap();

        assert_eq!(trade.price, dec!(100));
        assert_eq!(trade.fee, Decimal::ZERO);
        assert_eq!(portfolio.cash(), dec!(40000));
        let position = portfolio.position("A").unwrap();
        assert_eq!(position.quantity, dec!(600));
        assert_eq!(position.value, dec!(60000));
        assert_eq!(portfolio.total_value(), dec!(100000));
        assert_balanced(&portfolio);
    }

    #[test]
    fn buy_pays_slipped_price_and_fee() {
        let mut portfolio = with_costs(dec!(10000));
        let trade = portfolio.apply_order(&Order::buy("A", dec!(50), dec!(100)), day(2)).unwrap();

        // 100 * 1.01 = 101; value 5050; commission 5.05
        assert_eq!(trade.price, dec!(101));
        assert_eq!(trade.value, dec!(5050));
        assert_eq!(trade.fee, dec!(5.05));
        assert_eq!(portfolio.cash(), dec!(10000) - dec!(5050) - dec!(5.05));
        assert_eq!(portfolio.position("A").unwrap().avg_cost, dec!(101));
        assert_balanced(&portfolio);
    }

    #[test]
    fn average_cost_is_quantity_weighted() {
        let mut portfolio = frictionless(dec!(10000));
        portfolio.apply_order(&Order::buy("A", dec!(10), dec!(100)), day(2)).unwrap();
        portfolio.apply_order(&Order::buy("A", dec!(30), dec!(120)), day(3)).unwrap();

        let position = portfolio.position("A").unwrap();
        assert_eq!(position.quantity, dec!(40));
        assert_eq!(position.avg_cost, dec!(115));
    }

    #[test]
    fn insufficient_cash_leaves_ledger_unchanged() {
        let mut portfolio = with_costs(dec!(1000));
        let err = portfolio
            .apply_order(&Order::buy("A", dec!(10), dec!(100)), day(2))
            .unwrap_err();

        assert!(matches!(err, ExecutorError::InsufficientCash { .. }));
        assert_eq!(portfolio.cash(), dec!(1000));
        assert!(portfolio.positions().is_empty());
        assert!(portfolio.trades().is_empty());
    }

    #[test]
    fn sell_fee_above_proceeds_cannot_overdraw_cash() {
        let costs = Costs { min_commission: dec!(50), ..Default::default() };
        let mut portfolio = Portfolio::new(dec!(110), Box::new(SimulatedCostModel::new(costs)));
        // 50 for the shares, 50 minimum commission.
        portfolio.apply_order(&Order::buy("A", dec!(0.5), dec!(100)), day(2)).unwrap();
        assert_eq!(portfolio.cash(), dec!(10));

        // Proceeds of 1 against a fee of 50.
        let err = portfolio
            .apply_order(&Order::sell("A", dec!(0.01), dec!(100)), day(3))
            .unwrap_err();

        assert!(matches!(err, ExecutorError::InsufficientCash { .. }));
        assert_eq!(portfolio.cash(), dec!(10));
        assert_eq!(portfolio.quantity("A"), dec!(0.5));
        assert_eq!(portfolio.trades().len(), 1);
        assert_balanced(&portfolio);
    }

    #[test]
    fn selling_more_than_held_is_rejected() {
        let mut portfolio = frictionless(dec!(1000));
        portfolio.apply_order(&Order::buy("A", dec!(5), dec!(100)), day(2)).unwrap();

        let err = portfolio
            .apply_order(&Order::sell("A", dec!(6), dec!(100)), day(3))
            .unwrap_err();
        assert_eq!(
            err,
            ExecutorError::InsufficientShares {
                symbol: "A".to_string(),
                requested: dec!(6),
                available: dec!(5),
            }
        );
        assert_eq!(portfolio.quantity("A"), dec!(5));
        assert_eq!(portfolio.cash(), dec!(500));
        assert_eq!(portfolio.trades().len(), 1);

        let err = portfolio
            .apply_order(&Order::sell("B", dec!(1), dec!(10)), day(3))
            .unwrap_err();
        assert!(matches!(err, ExecutorError::InsufficientShares { .. }));
    }

    #[test]
    fn sell_credits_net_proceeds_and_charges_tax() {
        let mut portfolio = with_costs(dec!(20000));
        portfolio.apply_order(&Order::buy("A", dec!(100), dec!(100)), day(2)).unwrap();
        let cash_before = portfolio.cash();

        let trade = portfolio.apply_order(&Order::sell("A", dec!(40), dec!(100)), day(3)).unwrap();
        // 100 * 0.99 = 99; value 3960; commission 3.96 -> floored to 5; tax 3.96
        assert_eq!(trade.price, dec!(99));
        assert_eq!(trade.fee, dec!(8.96));
        assert_eq!(portfolio.cash(), cash_before + dec!(3960) - dec!(8.96));
        assert_eq!(portfolio.quantity("A"), dec!(60));
        assert_balanced(&portfolio);
    }

    #[test]
    fn full_sale_closes_position() {
        let mut portfolio = frictionless(dec!(1000));
        portfolio.apply_order(&Order::buy("A", dec!(5), dec!(100)), day(2)).unwrap();
        portfolio.apply_order(&Order::sell("A", dec!(4.99995), dec!(100)), day(3)).unwrap();

        // 0.00005 remaining is dust.
        assert!(portfolio.position("A").is_none());
        assert!(!portfolio.weights().contains_key("A"));
    }

    #[test]
    fn invalid_orders_are_rejected_before_execution() {
        let mut portfolio = frictionless(dec!(1000));
        let err = portfolio
            .apply_order(&Order::buy("A", dec!(-1), dec!(100)), day(2))
            .unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidOrder(_)));
        assert_eq!(portfolio.cash(), dec!(1000));
    }

    #[test]
    fn price_refresh_marks_positions_to_market() {
        let mut portfolio = frictionless(dec!(1000));
        portfolio.apply_order(&Order::buy("A", dec!(5), dec!(100)), day(2)).unwrap();
        portfolio.apply_order(&Order::buy("B", dec!(10), dec!(20)), day(2)).unwrap();

        // B has no price today and keeps its last value.
        portfolio.update_prices(&prices(&[("A", dec!(110))]), day(3));

        let a = portfolio.position("A").unwrap();
        assert_eq!(a.value, dec!(550));
        assert_eq!(a.unrealized_pnl, dec!(50));
        assert_eq!(portfolio.position("B").unwrap().value, dec!(200));
        assert_eq!(portfolio.total_value(), dec!(1050));
        assert_eq!(portfolio.timestamp(), Some(day(3)));
        assert_balanced(&portfolio);
    }

    #[test]
    fn weights_include_cash_and_sum_to_one() {
        let mut portfolio = frictionless(dec!(1000));
        portfolio.apply_order(&Order::buy("A", dec!(3), dec!(100)), day(2)).unwrap();
        portfolio.update_prices(&prices(&[("A", dec!(100))]), day(2));

        let weights = portfolio.weights();
        assert_eq!(weights["A"], dec!(0.3));
        assert_eq!(weights[CASH_SYMBOL], dec!(0.7));
        assert_eq!(weights.values().copied().sum::<Decimal>(), Decimal::ONE);
        // Reading weights does not change them.
        assert_eq!(portfolio.weights(), weights);
    }

    #[test]
    fn worthless_account_has_no_weights() {
        let portfolio = frictionless(Decimal::ZERO);
        assert!(portfolio.weights().is_empty());
    }

    #[test]
    fn snapshot_is_detached_from_ledger() {
        let mut portfolio = frictionless(dec!(1000));
        portfolio.apply_order(&Order::buy("A", dec!(5), dec!(100)), day(2)).unwrap();
        portfolio.update_prices(&prices(&[("A", dec!(100))]), day(2));

        let snapshot = portfolio.snapshot();
        portfolio.apply_order(&Order::sell("A", dec!(5), dec!(100)), day(3)).unwrap();

        assert_eq!(snapshot.timestamp, day(2));
        assert_eq!(snapshot.cash, dec!(500));
        assert_eq!(snapshot.positions["A"].quantity, dec!(5));
        assert_eq!(snapshot.weights["A"], dec!(0.5));
        assert!(portfolio.position("A").is_none());
    }

    #[test]
    fn fundamentals_attach_to_held_positions() {
        let mut portfolio = frictionless(dec!(1000));
        portfolio.apply_order(&Order::buy("A", dec!(1), dec!(100)), day(2)).unwrap();

        let mut fundamentals = FundamentalMap::new();
        for symbol in ["A", "B"] {
            fundamentals.insert(
                symbol.to_string(),
                FundamentalSnapshot {
                    symbol: symbol.to_string(),
                    date: day(2),
                    pe: dec!(15),
                    asset_type: AssetType::Etf,
                    ..Default::default()
                },
            );
        }
        portfolio.update_fundamentals(&fundamentals);

        let attached = portfolio.position("A").unwrap().fundamental.as_ref().unwrap();
        assert_eq!(attached.pe, dec!(15));
        assert!(portfolio.position("B").is_none());
    }

    #[test]
    fn can_buy_accounts_for_friction() {
        let portfolio = with_costs(dec!(1000));
        // 1000 at 1% slippage costs 1010 before fees.
        assert!(!portfolio.can_buy("A", dec!(1000), dec!(10)));
        assert!(portfolio.can_buy("A", dec!(900), dec!(10)));
        assert!(!portfolio.can_buy("A", Decimal::ZERO, dec!(10)));
        assert!(!portfolio.can_buy("A", dec!(100), Decimal::ZERO));
    }
}
