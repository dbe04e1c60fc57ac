use crate::enums::{AssetType, OrderSide};
use crate::error::CoreError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// The synthetic symbol under which uninvested cash appears in weight maps.
pub const CASH_SYMBOL: &str = "CASH";

/// Closing prices observed on one trading day, keyed by symbol.
pub type PriceMap = HashMap<String, Decimal>;

/// Fundamental indicators observed on one trading day, keyed by symbol.
pub type FundamentalMap = HashMap<String, FundamentalSnapshot>;

/// Allocation weights keyed by symbol. Ordered so that iteration, and thus order
/// generation and serialization, is reproducible.
pub type Weights = BTreeMap<String, Decimal>;

/// Valuation indicators for a single symbol on a single day.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    pub symbol: String,
    pub date: NaiveDate,
    /// Price-to-earnings ratio. Zero means unavailable or negative earnings.
    pub pe: Decimal,
    /// Historical percentile of the PE ratio, either on a 0-100 or a 0-1 scale.
    pub pe_rank: Decimal,
    pub peg: Decimal,
    /// Return on equity, in percent.
    pub roe: Decimal,
    /// Price-to-book ratio, where published.
    pub pb: Option<Decimal>,
    /// Current yield, in percent, for fixed-income funds.
    pub bond_yield: Option<Decimal>,
    pub asset_type: AssetType,
    pub name: String,
    /// Broad-market index ETF (e.g. SPY, QQQ).
    pub is_core_etf: bool,
    pub is_tech_etf: bool,
}

/// An open holding in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: Decimal,
    pub avg_cost: Decimal,
    /// Mark-to-market value at the last observed price.
    pub value: Decimal,
    pub unrealized_pnl: Decimal,
    /// Latest indicators for the symbol, refreshed daily by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fundamental: Option<FundamentalSnapshot>,
}

impl Position {
    pub fn new(symbol: impl Into<String>, quantity: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            avg_cost: price,
            value: quantity * price,
            unrealized_pnl: Decimal::ZERO,
            fundamental: None,
        }
    }
}

/// A trade intent produced by a strategy and consumed by the ledger on the same day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub side: OrderSide,
    /// Always positive; the side carries the direction.
    pub quantity: Decimal,
    /// The observed price before slippage.
    pub price: Decimal,
}

impl Order {
    pub fn buy(symbol: impl Into<String>, quantity: Decimal, price: Decimal) -> Self {
        Self { symbol: symbol.into(), side: OrderSide::Buy, quantity, price }
    }

    pub fn sell(symbol: impl Into<String>, quantity: Decimal, price: Decimal) -> Self {
        Self { symbol: symbol.into(), side: OrderSide::Sell, quantity, price }
    }

    /// The notional value of the order at its requested price.
    pub fn notional(&self) -> Decimal {
        self.quantity * self.price
    }

    /// Rejects orders that no ledger could ever execute.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.symbol.is_empty() {
            return Err(CoreError::InvalidInput("symbol".to_string(), "empty".to_string()));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(CoreError::InvalidInput("quantity".to_string(), self.quantity.to_string()));
        }
        if self.price <= Decimal::ZERO {
            return Err(CoreError::InvalidInput("price".to_string(), self.price.to_string()));
        }
        Ok(())
    }
}

/// The realized record of an executed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: NaiveDate,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    /// Execution price after slippage.
    pub price: Decimal,
    pub fee: Decimal,
    /// Gross value, quantity times execution price, excluding the fee.
    pub value: Decimal,
}

/// Point-in-time copy of the ledger, recorded once per simulated day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: NaiveDate,
    pub cash: Decimal,
    pub positions: BTreeMap<String, Position>,
    pub total_value: Decimal,
    pub weights: Weights,
}
