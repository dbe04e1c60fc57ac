//! # Executor Crate
//!
//! Simulated trade execution and account bookkeeping for the rebalancing backtester.
//!
//! ## Architectural Principles
//!
//! - **State vs. Logic Decoupling:** The `CostModel` trait is a pure calculator that
//!   determines the friction of a fill (slippage and fees) without touching any state.
//!   The `Portfolio` is the state machine that applies those results to cash and
//!   positions, and keeps the trade log.
//! - **All-or-nothing Orders:** An order either executes fully or fails with an
//!   `ExecutorError`, leaving the ledger exactly as it was.
//!
//! ## Public API
//!
//! - `CostModel`: The trait every friction model implements.
//! - `SimulatedCostModel`: Commission with a floor, sell-side tax and fixed slippage.
//! - `Portfolio`: The in-memory ledger for one backtest run.
//! - `ExecutorError`: The specific error types that can be returned from this crate.

pub mod cost;
pub mod error;
pub mod portfolio;

pub use cost::{CostModel, SimulatedCostModel};
pub use error::ExecutorError;
pub use portfolio::{DUST_QUANTITY, Portfolio};
