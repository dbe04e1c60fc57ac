use crate::error::BacktestError;
use chrono::NaiveDate;
use configuration::Config;
use core_types::{Order, Snapshot, Trade};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use uuid::Uuid;

/// An order the ledger refused. The run carries on without it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRejection {
    pub date: NaiveDate,
    pub order: Order,
    pub reason: String,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub run_id: Uuid,
    pub strategy_name: String,
    /// The configuration the run was started with.
    pub config: Config,
    pub initial_capital: Decimal,
    pub final_value: Decimal,
    /// `(final_value - initial_capital) / initial_capital`.
    pub total_return: Decimal,
    pub total_trades: usize,
    pub total_fees: Decimal,
    /// Days on which the strategy chose to rebalance.
    pub rebalance_count: usize,
    /// Trading dates without a single observed price.
    pub skipped_days: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub trades: Vec<Trade>,
    pub snapshots: Vec<Snapshot>,
    pub rejections: Vec<OrderRejection>,
}

/// The headline numbers of a run, without the per-day history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub run_id: Uuid,
    pub strategy_name: String,
    /// Reference symbol named in the configuration, reported as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<String>,
    pub initial_capital: Decimal,
    pub final_value: Decimal,
    pub total_return: Decimal,
    pub total_trades: usize,
    pub total_fees: Decimal,
    pub rebalance_count: usize,
    pub rejected_orders: usize,
    pub trading_days: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Serialize)]
struct ResultDocument<'a> {
    summary: ResultSummary,
    trades: &'a [Trade],
    snapshots: &'a [Snapshot],
    rejections: &'a [OrderRejection],
    config: &'a Config,
}

impl BacktestResult {
    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            run_id: self.run_id,
            strategy_name: self.strategy_name.clone(),
            benchmark: self.config.backtest.benchmark.clone(),
            initial_capital: self.initial_capital,
            final_value: self.final_value,
            total_return: self.total_return,
            total_trades: self.total_trades,
            total_fees: self.total_fees,
            rebalance_count: self.rebalance_count,
            rejected_orders: self.rejections.len(),
            trading_days: self.snapshots.len(),
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }

    /// Writes the summary, trade log, snapshots, rejections and configuration
    /// as one pretty-printed JSON document, creating parent directories as needed.
    pub fn export_json(&self, path: &Path) -> Result<(), BacktestError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let document = ResultDocument {
            summary: self.summary(),
            trades: &self.trades,
            snapshots: &self.snapshots,
            rejections: &self.rejections,
            config: &self.config,
        };

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &document)?;
        writer.flush()?;

        tracing::info!("Results exported to {}", path.display());
        Ok(())
    }
}
