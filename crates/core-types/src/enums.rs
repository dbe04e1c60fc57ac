use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Broad asset class used by the valuation policies to pick a decision branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AssetType {
    Etf,
    Stock,
    Bond,
    Gold,
    Cash,
    #[default]
    Other,
}

impl AssetType {
    /// Bonds, gold and cash are held for allocation rather than valuation.
    pub fn is_safe(&self) -> bool {
        matches!(self, AssetType::Bond | AssetType::Gold | AssetType::Cash)
    }

    /// Parses a data-file label. Accepts English names as well as the labels
    /// used by the upstream data scripts. Unknown labels map to `Other`.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "ETF" | "etf" | "Etf" => AssetType::Etf,
            "个股" | "Stock" | "stock" | "STOCK" => AssetType::Stock,
            "债券" | "Bond" | "bond" | "BOND" => AssetType::Bond,
            "黄金" | "Gold" | "gold" | "GOLD" => AssetType::Gold,
            "现金" | "Cash" | "cash" | "CASH" => AssetType::Cash,
            _ => AssetType::Other,
        }
    }
}

/// Identifies which rebalancing policy to build. Deserialized from the
/// `strategy.type` field of the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    #[serde(alias = "fixed")]
    FixedWeight,
    #[serde(alias = "threshold_based")]
    Threshold,
    #[serde(alias = "time", alias = "periodic")]
    TimeBased,
    Valuation,
    WeightedValuation,
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StrategyId::FixedWeight => "FixedWeight",
            StrategyId::Threshold => "ThresholdBased",
            StrategyId::TimeBased => "TimeBased",
            StrategyId::Valuation => "ValuationDriven",
            StrategyId::WeightedValuation => "WeightedValuation",
        };
        f.write_str(label)
    }
}

/// Classification produced by the valuation policy for a single holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValuationSignal {
    /// Extreme risk: bubble valuation or a losing position with weak fundamentals.
    StrongSell,
    Sell,
    /// Core holding priced at an extreme; trim back toward the base weight.
    Trim,
    Reduce,
    Watch,
    Hold,
    /// Safe asset held at its configured weight.
    Allocate,
    Buy,
    /// Quality holding; slight overweight.
    StrongHold,
    Unknown,
}

impl ValuationSignal {
    /// Whether the signal asks for a position change on its own.
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            ValuationSignal::StrongSell
                | ValuationSignal::Sell
                | ValuationSignal::Trim
                | ValuationSignal::Reduce
                | ValuationSignal::Buy
        )
    }
}

impl fmt::Display for ValuationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ValuationSignal::StrongSell => "extreme risk",
            ValuationSignal::Sell => "sell",
            ValuationSignal::Trim => "dynamic rebalance",
            ValuationSignal::Reduce => "reduce",
            ValuationSignal::Watch => "watch",
            ValuationSignal::Hold => "hold",
            ValuationSignal::Allocate => "allocate by weight",
            ValuationSignal::Buy => "buy",
            ValuationSignal::StrongHold => "quality hold",
            ValuationSignal::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Classification produced by the weighted-valuation policy, combining weight
/// drift with a cheap/expensive reading of the indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviationSignal {
    /// Overweight and expensive: take profit decisively.
    StrongSell,
    Sell,
    /// Overweight but cheap: keep the current weight.
    HoldNoSell,
    /// Underweight and cheap: add aggressively.
    StrongBuy,
    Buy,
    /// Underweight but expensive: keep the current weight.
    HoldNoBuy,
    Normal,
    /// No target weight for the symbol.
    Skip,
}

impl fmt::Display for DeviationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DeviationSignal::StrongSell => "take profit",
            DeviationSignal::Sell => "reduce",
            DeviationSignal::HoldNoSell => "hold, do not sell",
            DeviationSignal::StrongBuy => "add aggressively",
            DeviationSignal::Buy => "add",
            DeviationSignal::HoldNoBuy => "hold, do not buy",
            DeviationSignal::Normal => "normal",
            DeviationSignal::Skip => "",
        };
        f.write_str(label)
    }
}
