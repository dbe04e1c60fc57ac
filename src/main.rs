use anyhow::{Context, Result};
use backtester::{BacktestResult, Backtester, SweepRun, run_sweep};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use configuration::{Config, SkippedDayPolicy, load_config};
use market_data::{CsvProvider, MarketDataProvider};
use rust_decimal::Decimal;
use std::path::PathBuf;
use strategies::parse_strategy_id;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Entry point for the portfolio rebalancing backtester.
fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => handle_run(args),
        Commands::Sweep(args) => handle_sweep(args),
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Replays daily market data through a rebalancing policy and reports the outcome.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest the configured strategy and export the results as JSON.
    Run(RunArgs),
    /// Backtest the configured strategy and every `[[sweep.strategies]]` entry side by side.
    Sweep(SweepArgs),
}

/// Options shared by every command that loads a configuration file.
#[derive(Args)]
struct ConfigArgs {
    /// Path to the TOML configuration file.
    #[arg(long, short, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides `backtest.start_date` (format: YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Overrides `backtest.end_date` (format: YYYY-MM-DD).
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Overrides `engine.skipped_day_policy`.
    #[arg(long, value_enum)]
    skipped_day_policy: Option<SkippedDayPolicy>,

    /// Draw a progress bar while simulating.
    #[arg(long)]
    progress: bool,
}

impl ConfigArgs {
    fn load(&self) -> Result<Config> {
        let mut config = load_config(&self.config)
            .with_context(|| format!("Failed to load configuration from {}", self.config.display()))?;

        if let Some(from) = self.from {
            config.backtest.start_date = from;
        }
        if let Some(to) = self.to {
            config.backtest.end_date = to;
        }
        if let Some(policy) = self.skipped_day_policy {
            config.engine.skipped_day_policy = policy;
        }
        if self.progress {
            config.engine.show_progress = true;
        }

        config.validate().context("Invalid configuration after command-line overrides")?;
        Ok(config)
    }
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Replaces the configured strategy type, e.g. "time_based" or "weighted-valuation".
    #[arg(long)]
    strategy: Option<String>,

    /// Where to write the JSON results. Defaults to `<output.path>/<run id>.json`.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct SweepArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Also export every successful run into `output.path`.
    #[arg(long)]
    export: bool,
}

// ==============================================================================
// Command Logic
// ==============================================================================

fn handle_run(args: RunArgs) -> Result<()> {
    let mut config = args.config.load()?;

    if let Some(label) = &args.strategy {
        config.strategy.strategy_type = parse_strategy_id(label)?;
        config.strategy.name.clear();
    }

    let result = Backtester::from_config(config)
        .context("Failed to set up the backtest")?
        .run()
        .context("Backtest failed")?;

    println!("{}", summary_table(&result));

    let path = args
        .output
        .unwrap_or_else(|| result.config.output.path.join(format!("{}.json", result.run_id)));
    result
        .export_json(&path)
        .with_context(|| format!("Failed to export results to {}", path.display()))?;
    println!("Results written to {}", path.display());

    Ok(())
}

fn handle_sweep(args: SweepArgs) -> Result<()> {
    let config = args.config.load()?;

    let mut variants = vec![config.strategy.clone()];
    if let Some(sweep) = &config.sweep {
        variants.extend(sweep.strategies.iter().cloned());
    }
    if variants.len() == 1 {
        tracing::warn!("No [[sweep.strategies]] configured; only the primary strategy will run.");
    }

    let data_dir = config.backtest.data_dir.clone();
    let runs = run_sweep(&config, &variants, || {
        Box::new(CsvProvider::new(data_dir.clone())) as Box<dyn MarketDataProvider>
    });

    println!("{}", comparison_table(&runs));

    if args.export {
        for (index, run) in runs.iter().enumerate() {
            if let Ok(result) = &run.outcome {
                let path = config
                    .output
                    .path
                    .join(format!("sweep-{index:02}-{}.json", result.run_id));
                result
                    .export_json(&path)
                    .with_context(|| format!("Failed to export '{}'", run.label))?;
            }
        }
    }

    let failed = runs.iter().filter(|run| run.outcome.is_err()).count();
    if failed == runs.len() {
        anyhow::bail!("all {failed} sweep runs failed");
    }
    Ok(())
}

// ==============================================================================
// Reporting
// ==============================================================================

fn percent(ratio: Decimal) -> String {
    format!("{}%", (ratio * Decimal::ONE_HUNDRED).round_dp(2))
}

fn money(value: Decimal) -> String {
    value.round_dp(2).to_string()
}

fn summary_table(result: &BacktestResult) -> Table {
    let summary = result.summary();
    let period = match (summary.start_date, summary.end_date) {
        (Some(start), Some(end)) => format!("{start} .. {end}"),
        _ => "no trading days".to_string(),
    };

    let rows = [
        ("Run", summary.run_id.to_string()),
        ("Strategy", summary.strategy_name),
        ("Benchmark", summary.benchmark.unwrap_or_else(|| "-".to_string())),
        ("Period", period),
        ("Trading days", summary.trading_days.to_string()),
        ("Skipped days", result.skipped_days.to_string()),
        ("Initial capital", money(summary.initial_capital)),
        ("Final value", money(summary.final_value)),
        ("Total return", percent(summary.total_return)),
        ("Rebalances", summary.rebalance_count.to_string()),
        ("Trades", summary.total_trades.to_string()),
        ("Rejected orders", summary.rejected_orders.to_string()),
        ("Total fees", money(summary.total_fees)),
    ];

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Metric", "Value"]);
    for (metric, value) in rows {
        table.add_row(vec![Cell::new(metric), Cell::new(value).set_alignment(CellAlignment::Right)]);
    }
    table
}

fn comparison_table(runs: &[SweepRun]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Strategy",
            "Final value",
            "Return",
            "Rebalances",
            "Trades",
            "Rejected",
            "Fees",
        ]);

    for run in runs {
        match &run.outcome {
            Ok(result) => {
                let summary = result.summary();
                table.add_row(vec![
                    Cell::new(&run.label),
                    Cell::new(money(summary.final_value)).set_alignment(CellAlignment::Right),
                    Cell::new(percent(summary.total_return)).set_alignment(CellAlignment::Right),
                    Cell::new(summary.rebalance_count),
                    Cell::new(summary.total_trades),
                    Cell::new(summary.rejected_orders),
                    Cell::new(money(summary.total_fees)).set_alignment(CellAlignment::Right),
                ]);
            }
            Err(e) => {
                table.add_row(vec![Cell::new(&run.label), Cell::new(format!("failed: {e}"))]);
            }
        }
    }
    table
}
