use crate::error::BacktestError;
use crate::result::BacktestResult;
use crate::Backtester;
use configuration::{Config, StrategyConfig};
use market_data::MarketDataProvider;
use rayon::prelude::*;

/// The outcome of one configuration in a sweep.
#[derive(Debug)]
pub struct SweepRun {
    /// The strategy's configured name, or its type when unnamed.
    pub label: String,
    pub outcome: Result<BacktestResult, BacktestError>,
}

/// Runs `base` once per strategy configuration in `variants`, in parallel.
///
/// Every run gets its own engine, ledger, strategy and a fresh provider from
/// `make_provider`, so runs share nothing mutable. Results come back in the
/// order of `variants`; one failing run does not stop the others.
pub fn run_sweep<F>(base: &Config, variants: &[StrategyConfig], make_provider: F) -> Vec<SweepRun>
where
    F: Fn() -> Box<dyn MarketDataProvider> + Sync,
{
    tracing::info!(
        runs = variants.len(),
        threads = rayon::current_num_threads(),
        "Starting strategy sweep."
    );

    variants
        .par_iter()
        .map(|variant| {
            let label = if variant.name.trim().is_empty() {
                variant.strategy_type.to_string()
            } else {
                variant.name.clone()
            };

            let mut config = base.clone();
            config.strategy = variant.clone();
            config.sweep = None;

            let outcome = Backtester::from_config_with_provider(config, make_provider())
                .and_then(Backtester::run);
            if let Err(e) = &outcome {
                tracing::warn!(%label, error = %e, "Sweep run failed.");
            }

            SweepRun { label, outcome }
        })
        .collect()
}
