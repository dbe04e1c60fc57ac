use crate::error::DataError;
use crate::provider::{MarketDataProvider, PriceBar, SeriesStore, check_range};
use chrono::NaiveDate;
use core_types::{FundamentalMap, FundamentalSnapshot, PriceMap};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A provider over series assembled in code.
///
/// Holds the full history and, after `load`, the slice of it the engine asked for.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    bars: HashMap<String, Vec<PriceBar>>,
    fundamentals: HashMap<String, Vec<FundamentalSnapshot>>,
    loaded: SeriesStore,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds closing prices for `symbol`.
    pub fn with_prices<I>(mut self, symbol: &str, prices: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, Decimal)>,
    {
        for (date, price) in prices {
            self.add_bar(symbol, PriceBar::close_only(date, price));
        }
        self
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        for bar in bars {
            self.add_bar(symbol, bar);
        }
        self
    }

    /// Adds indicator snapshots for `symbol`. Their `symbol` field is overwritten.
    pub fn with_fundamentals(mut self, symbol: &str, snapshots: Vec<FundamentalSnapshot>) -> Self {
        for snapshot in snapshots {
            self.add_fundamental(symbol, snapshot);
        }
        self
    }

    pub fn add_bar(&mut self, symbol: &str, bar: PriceBar) {
        self.bars.entry(symbol.to_string()).or_default().push(bar);
    }

    pub fn add_fundamental(&mut self, symbol: &str, mut snapshot: FundamentalSnapshot) {
        snapshot.symbol = symbol.to_string();
        self.fundamentals.entry(symbol.to_string()).or_default().push(snapshot);
    }
}

impl MarketDataProvider for InMemoryProvider {
    fn load(&mut self, symbols: &[String], start: NaiveDate, end: NaiveDate) -> Result<(), DataError> {
        check_range(start, end)?;
        self.loaded.clear();

        let in_range = |date: NaiveDate| date >= start && date <= end;

        for symbol in symbols {
            let Some(bars) = self.bars.get(symbol) else {
                return Err(DataError::NoData(symbol.clone()));
            };
            let bars: Vec<PriceBar> = bars.iter().filter(|bar| in_range(bar.date)).cloned().collect();
            let fundamentals: Vec<FundamentalSnapshot> = self
                .fundamentals
                .get(symbol)
                .map(|series| series.iter().filter(|s| in_range(s.date)).cloned().collect())
                .unwrap_or_default();

            tracing::debug!("Loaded {} in-memory bars for {}", bars.len(), symbol);
            self.loaded.insert(symbol, bars, fundamentals);
        }

        if self.loaded.is_empty() {
            return Err(DataError::NoData(format!("any symbol between {start} and {end}")));
        }
        Ok(())
    }

    fn trading_dates(&self) -> &[NaiveDate] {
        self.loaded.dates()
    }

    fn prices_on(&self, date: NaiveDate) -> PriceMap {
        self.loaded.prices_on(date)
    }

    fn fundamentals_on(&self, date: NaiveDate) -> FundamentalMap {
        self.loaded.fundamentals_on(date)
    }

    fn data_range(&self, symbol: &str) -> Option<(NaiveDate, NaiveDate)> {
        self.loaded.range(symbol)
    }
}
