use core_types::{CASH_SYMBOL, Order, PriceMap, Weights};
use executor::Portfolio;
use rust_decimal::Decimal;

/// Turns target weights into the orders that close the gap between each
/// target value and the current position value.
///
/// Symbols without a positive price today are skipped, as are differences
/// smaller than `min_trade_value`. Every sale is placed before the first
/// purchase so that proceeds are available to fund the buys.
pub fn rebalance_orders(
    portfolio: &Portfolio,
    targets: &Weights,
    prices: &PriceMap,
    min_trade_value: Decimal,
) -> Vec<Order> {
    let total_value = portfolio.total_value();
    if total_value <= Decimal::ZERO {
        return Vec::new();
    }

    let mut sells = Vec::new();
    let mut buys = Vec::new();

    for (symbol, weight) in targets {
        if symbol == CASH_SYMBOL {
            continue;
        }
        let price = match prices.get(symbol) {
            Some(price) if *price > Decimal::ZERO => *price,
            _ => continue,
        };

        let target_value = total_value * weight;
        let current_value = portfolio.position(symbol).map(|p| p.value).unwrap_or(Decimal::ZERO);
        let diff = target_value - current_value;

        if diff.is_zero() || diff.abs() < min_trade_value {
            continue;
        }

        if diff.is_sign_negative() {
            // Never ask for more than is held, even after rounding.
            let quantity = (diff.abs() / price).min(portfolio.quantity(symbol));
            if quantity > Decimal::ZERO {
                sells.push(Order::sell(symbol.clone(), quantity, price));
            }
        } else {
            buys.push(Order::buy(symbol.clone(), diff / price, price));
        }
    }

    tracing::debug!("Generated {} sell and {} buy orders", sells.len(), buys.len());

    sells.extend(buys);
    sells
}
