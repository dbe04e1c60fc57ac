use chrono::NaiveDate;
use core_types::{StrategyId, Weights};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::ConfigError;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub backtest: Backtest,
    pub assets: Vec<AssetConfig>,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub costs: Costs,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub output: Output,
    /// Additional strategy configurations to compare against `strategy`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<Sweep>,
}

impl Config {
    /// The universe of the run, in configuration order.
    pub fn symbols(&self) -> Vec<String> {
        self.assets.iter().map(|a| a.symbol.clone()).collect()
    }

    /// Checks the invariants a run depends on before any data is loaded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.backtest.validate()?;
        if self.assets.is_empty() {
            return Err(ConfigError::ValidationError("no assets configured".to_string()));
        }
        self.costs.validate()?;
        self.strategy.validate()?;
        if let Some(sweep) = &self.sweep {
            for strategy in &sweep.strategies {
                strategy.validate()?;
            }
        }
        Ok(())
    }
}

/// Contains parameters for a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backtest {
    /// The first day of the simulation, inclusive.
    pub start_date: NaiveDate,
    /// The last day of the simulation, inclusive.
    pub end_date: NaiveDate,
    /// The initial cash endowment.
    pub initial_capital: Decimal,
    /// Reference symbol reported alongside the results; not traded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<String>,
    /// Directory holding one price file per symbol.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Backtest {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capital <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "initial_capital must be positive, got {}",
                self.initial_capital
            )));
        }
        if self.start_date > self.end_date {
            return Err(ConfigError::ValidationError(format!(
                "start_date {} is after end_date {}",
                self.start_date, self.end_date
            )));
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/sample")
}

/// A tradable symbol in the universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
}

/// Selects and parameterizes one rebalancing policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(rename = "type")]
    pub strategy_type: StrategyId,
    /// Display name; the policy's own name is used when empty.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub params: StrategyParams,
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let params = &self.params;
        if params.target_weights.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "strategy '{}' has no target weights",
                self.strategy_type
            )));
        }
        if let Some(w) = params.target_weights.iter().find(|w| w.weight < Decimal::ZERO) {
            return Err(ConfigError::ValidationError(format!(
                "target weight for {} is negative",
                w.symbol
            )));
        }
        if params.threshold < Decimal::ZERO || params.min_trade_value < Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "threshold and min_trade_value must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// A single symbol's target allocation.
///
/// Weights are written as a list rather than a table so that symbol case
/// survives the configuration loader, which folds table keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetWeight {
    pub symbol: String,
    pub weight: Decimal,
}

/// Parameters shared by every rebalancing policy, plus the per-variant blocks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub target_weights: Vec<TargetWeight>,
    /// Drift tolerance. Absolute for fixed-weight, relative for weighted-valuation.
    pub threshold: Decimal,
    /// Days between rebalances for the time-based policy.
    pub rebalance_interval: u32,
    /// Trades smaller than this notional are skipped.
    pub min_trade_value: Decimal,
    /// Cool-down in evaluated days between two rebalances.
    pub min_rebalance_interval: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation: Option<ValuationParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_valuation: Option<WeightedValuationParams>,
}

impl StrategyParams {
    /// Target weights keyed by symbol. Later duplicates win.
    pub fn weights(&self) -> Weights {
        self.target_weights.iter().map(|w| (w.symbol.clone(), w.weight)).collect()
    }

    /// Convenience constructor used when building parameters in code.
    pub fn with_weights<I, S>(weights: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        Self {
            target_weights: weights
                .into_iter()
                .map(|(symbol, weight)| TargetWeight { symbol: symbol.into(), weight })
                .collect(),
            ..Self::default()
        }
    }
}

/// Thresholds and ratios for the valuation-driven policy.
///
/// PE ranks are percentiles on a 0-100 scale, ROE is in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValuationParams {
    pub extreme_high_pe_rank: Decimal,
    pub high_pe_rank: Decimal,
    pub low_pe_rank: Decimal,
    /// Low-valuation cutoff for core and tech index funds.
    pub core_low_pe_rank: Decimal,
    pub high_peg: Decimal,
    pub bubble_peg: Decimal,
    pub low_peg: Decimal,
    pub good_roe: Decimal,
    pub poor_roe: Decimal,
    pub trim_ratio: Decimal,
    pub reduce_ratio: Decimal,
    pub sell_ratio: Decimal,
    pub buy_ratio: Decimal,
}

impl Default for ValuationParams {
    fn default() -> Self {
        Self {
            extreme_high_pe_rank: dec!(90),
            high_pe_rank: dec!(75),
            low_pe_rank: dec!(20),
            core_low_pe_rank: dec!(50),
            high_peg: dec!(2.0),
            bubble_peg: dec!(2.5),
            low_peg: dec!(1.5),
            good_roe: dec!(20),
            poor_roe: dec!(5),
            trim_ratio: dec!(0.2),
            reduce_ratio: dec!(0.3),
            sell_ratio: dec!(0.5),
            buy_ratio: dec!(0.2),
        }
    }
}

/// Yield band for a bond fund: above `high` it is cheap, below `low` expensive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldThreshold {
    pub symbol: String,
    pub high: Decimal,
    pub low: Decimal,
}

/// Thresholds and ratios for the weighted-valuation policy.
///
/// PE ranks here are on a 0-1 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightedValuationParams {
    /// Relative drift that counts as over- or under-weight.
    pub deviation_threshold: Decimal,
    pub pe_high_rank: Decimal,
    pub pe_low_rank: Decimal,
    pub pb_low: Decimal,
    pub pb_high: Decimal,
    /// Index fund evaluated with the dual PE/PB test.
    pub index_etf_symbol: Option<String>,
    pub bond_yield_thresholds: Vec<YieldThreshold>,
    pub trim_ratio: Decimal,
    pub add_ratio: Decimal,
    pub strong_ratio: Decimal,
}

impl WeightedValuationParams {
    pub fn yield_thresholds(&self) -> BTreeMap<String, YieldThreshold> {
        self.bond_yield_thresholds.iter().map(|t| (t.symbol.clone(), t.clone())).collect()
    }
}

impl Default for WeightedValuationParams {
    fn default() -> Self {
        let band = |symbol: &str, high: Decimal, low: Decimal| YieldThreshold {
            symbol: symbol.to_string(),
            high,
            low,
        };
        Self {
            deviation_threshold: dec!(0.10),
            pe_high_rank: dec!(0.70),
            pe_low_rank: dec!(0.30),
            pb_low: dec!(1.0),
            pb_high: dec!(1.3),
            index_etf_symbol: Some("159920".to_string()),
            bond_yield_thresholds: vec![
                band("511010", dec!(1.8), dec!(1.4)), // 5y treasury
                band("511260", dec!(2.0), dec!(1.6)), // 10y treasury
                band("511520", dec!(2.3), dec!(1.9)), // 7-10y policy bank
                band("511090", dec!(2.4), dec!(2.0)), // 30y treasury
            ],
            trim_ratio: dec!(0.3),
            add_ratio: dec!(0.2),
            strong_ratio: dec!(0.5),
        }
    }
}

/// Friction parameters. All rates are fractions of trade value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Costs {
    pub commission_rate: Decimal,
    /// Floor applied to the commission of any non-empty trade.
    pub min_commission: Decimal,
    pub slippage_rate: Decimal,
    /// Charged on sale proceeds only.
    pub tax_rate: Decimal,
}

impl Costs {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rates = [
            ("commission_rate", self.commission_rate),
            ("min_commission", self.min_commission),
            ("slippage_rate", self.slippage_rate),
            ("tax_rate", self.tax_rate),
        ];
        for (field, value) in rates {
            if value < Decimal::ZERO {
                return Err(ConfigError::ValidationError(format!(
                    "{field} must not be negative, got {value}"
                )));
            }
        }
        if self.slippage_rate >= Decimal::ONE {
            return Err(ConfigError::ValidationError(
                "slippage_rate must be below 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// How the engine treats days on which no prices were observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum SkippedDayPolicy {
    /// Gap days are invisible to the strategy.
    #[default]
    Ignore,
    /// Gap days advance the strategy's cool-down counter.
    AdvanceCooldown,
}

/// Knobs for the simulation loop itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub skipped_day_policy: SkippedDayPolicy,
    /// Draw a progress bar while simulating.
    pub show_progress: bool,
}

/// Where results are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub path: PathBuf,
}

impl Default for Output {
    fn default() -> Self {
        Self { path: PathBuf::from("output") }
    }
}

/// Strategy configurations run side by side with the primary one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Sweep {
    pub strategies: Vec<StrategyConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            backtest: Backtest {
                start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
                initial_capital: dec!(100000),
                benchmark: None,
                data_dir: default_data_dir(),
            },
            assets: vec![AssetConfig { symbol: "SPY".to_string(), name: String::new() }],
            strategy: StrategyConfig {
                strategy_type: StrategyId::FixedWeight,
                name: String::new(),
                params: StrategyParams::with_weights([("SPY", dec!(1))]),
            },
            costs: Costs::default(),
            engine: EngineSettings::default(),
            output: Output::default(),
            sweep: None,
        }
    }

    #[test]
    fn sample_config_is_valid() {
        assert!(sample().validate().is_ok());
        assert_eq!(sample().symbols(), vec!["SPY".to_string()]);
    }

    #[test]
    fn rejects_non_positive_capital() {
        let mut config = sample();
        config.backtest.initial_capital = Decimal::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn rejects_inverted_date_range() {
        let mut config = sample();
        config.backtest.start_date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_universe_and_negative_costs() {
        let mut config = sample();
        config.assets.clear();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.costs.tax_rate = dec!(-0.001);
        assert!(config.validate().is_err());
    }

    #[test]
    fn weights_preserve_symbol_case() {
        let params = StrategyParams::with_weights([("SPY", dec!(0.6)), ("tlt", dec!(0.4))]);
        let weights = params.weights();
        assert_eq!(weights.get("SPY"), Some(&dec!(0.6)));
        assert_eq!(weights.get("tlt"), Some(&dec!(0.4)));
    }

    #[test]
    fn partial_valuation_block_keeps_defaults() {
        let params: ValuationParams = serde_json::from_str(r#"{"sell_ratio": "0.6"}"#).unwrap();
        assert_eq!(params.sell_ratio, dec!(0.6));
        assert_eq!(params.extreme_high_pe_rank, dec!(90));
    }

    #[test]
    fn default_weighted_params_cover_bond_funds() {
        let params = WeightedValuationParams::default();
        let bands = params.yield_thresholds();
        assert_eq!(bands.len(), 4);
        assert_eq!(bands["511260"].high, dec!(2.0));
        assert_eq!(params.index_etf_symbol.as_deref(), Some("159920"));
    }
}
