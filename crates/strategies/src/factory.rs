use crate::error::StrategyError;
use crate::fixed_weight::FixedWeight;
use crate::time_based::TimeBased;
use crate::valuation::Valuation;
use crate::weighted_valuation::WeightedValuation;
use crate::Strategy;
use configuration::StrategyConfig;
use core_types::StrategyId;

/// Creates a new strategy instance from its configuration block.
///
/// Every call returns a fresh instance with its own day counter, so a single
/// configuration can safely back several independent runs.
pub fn create_strategy(config: &StrategyConfig) -> Result<Box<dyn Strategy>, StrategyError> {
    let name = if config.name.trim().is_empty() {
        config.strategy_type.to_string()
    } else {
        config.name.clone()
    };
    let params = &config.params;

    // The compiler will error if a new StrategyId is added but not handled here.
    let strategy: Box<dyn Strategy> = match config.strategy_type {
        StrategyId::FixedWeight | StrategyId::Threshold => Box::new(FixedWeight::new(name, params)?),
        StrategyId::TimeBased => Box::new(TimeBased::new(name, params)?),
        StrategyId::Valuation => Box::new(Valuation::new(name, params)?),
        StrategyId::WeightedValuation => Box::new(WeightedValuation::new(name, params)?),
    };

    tracing::debug!(strategy = strategy.name(), kind = ?config.strategy_type, "Strategy created.");
    Ok(strategy)
}

/// Resolves a strategy type from a user-supplied label such as `threshold`
/// or `weighted-valuation`.
pub fn parse_strategy_id(label: &str) -> Result<StrategyId, StrategyError> {
    let normalized = label.trim().to_ascii_lowercase().replace(['-', ' '], "_");
    match normalized.as_str() {
        "fixed_weight" | "fixedweight" | "fixed" => Ok(StrategyId::FixedWeight),
        "threshold" | "threshold_based" | "thresholdbased" => Ok(StrategyId::Threshold),
        "time_based" | "timebased" | "time" | "periodic" => Ok(StrategyId::TimeBased),
        "valuation" | "valuation_driven" | "valuationdriven" => Ok(StrategyId::Valuation),
        "weighted_valuation" | "weightedvaluation" => Ok(StrategyId::WeightedValuation),
        _ => Err(StrategyError::StrategyNotFound(label.to_string())),
    }
}
