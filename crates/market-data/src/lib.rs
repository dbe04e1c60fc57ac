//! # Market Data Crate
//!
//! Daily price and fundamental history for the simulation engine.
//!
//! - `MarketDataProvider`: The trait the engine reads through.
//! - `InMemoryProvider`: Series built in code, for tests and parameter sweeps.
//! - `CsvProvider`: One `<SYMBOL>.csv` file per symbol in a data directory.

pub mod csv_loader;
pub mod error;
pub mod memory;
pub mod provider;

pub use csv_loader::CsvProvider;
pub use error::DataError;
pub use memory::InMemoryProvider;
pub use provider::{MarketDataProvider, PriceBar, SeriesStore};
