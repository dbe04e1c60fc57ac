use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use settings::{
    AssetConfig, Backtest, Config, Costs, EngineSettings, Output, SkippedDayPolicy,
    StrategyConfig, StrategyParams, Sweep, TargetWeight, ValuationParams,
    WeightedValuationParams, YieldThreshold,
};

/// Loads the run configuration from a TOML file.
///
/// Values can be overridden from the environment with the `REBALANCE` prefix and
/// `__` as the section separator, e.g. `REBALANCE_BACKTEST__INITIAL_CAPITAL=50000`.
/// The loaded configuration is validated before it is returned.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let builder = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(config::Environment::with_prefix("REBALANCE").separator("__"))
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    tracing::debug!(path = %path.display(), assets = config.assets.len(), "Configuration loaded");
    Ok(config)
}
