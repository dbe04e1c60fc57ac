pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{AssetType, DeviationSignal, OrderSide, StrategyId, ValuationSignal};
pub use error::CoreError;
pub use structs::{
    CASH_SYMBOL, FundamentalMap, FundamentalSnapshot, Order, Position, PriceMap, Snapshot, Trade,
    Weights,
};
