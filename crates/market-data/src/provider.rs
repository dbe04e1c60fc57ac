use crate::error::DataError;
use chrono::NaiveDate;
use core_types::{FundamentalMap, FundamentalSnapshot, PriceMap};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};

/// The engine's view of a daily time series source.
///
/// `load` must be called before any lookup. Lookups are exact-date: a symbol
/// without a bar on the requested date is simply absent from the result.
pub trait MarketDataProvider: Send {
    /// Loads history for `symbols` restricted to `[start, end]`.
    fn load(&mut self, symbols: &[String], start: NaiveDate, end: NaiveDate) -> Result<(), DataError>;

    /// Every date on which at least one loaded symbol has a bar, ascending and
    /// without duplicates.
    fn trading_dates(&self) -> &[NaiveDate];

    fn prices_on(&self, date: NaiveDate) -> PriceMap;

    fn fundamentals_on(&self, date: NaiveDate) -> FundamentalMap;

    /// First and last loaded date for `symbol`.
    fn data_range(&self, symbol: &str) -> Option<(NaiveDate, NaiveDate)>;
}

/// One daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Dividend-adjusted close; zero when the source has none.
    pub adj_close: Decimal,
}

impl PriceBar {
    /// A bar carrying only a closing price.
    pub fn close_only(date: NaiveDate, close: Decimal) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: Decimal::ZERO,
            adj_close: close,
        }
    }

    /// The price the simulation trades at: adjusted close, else close.
    pub fn price(&self) -> Decimal {
        if self.adj_close > Decimal::ZERO {
            self.adj_close
        } else {
            self.close
        }
    }
}

/// Loaded, date-sorted series shared by the provider implementations.
#[derive(Debug, Clone, Default)]
pub struct SeriesStore {
    bars: HashMap<String, Vec<PriceBar>>,
    fundamentals: HashMap<String, Vec<FundamentalSnapshot>>,
    dates: Vec<NaiveDate>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores one symbol's series. Both lists are sorted by date and the first
    /// entry of any duplicated date wins.
    pub fn insert(
        &mut self,
        symbol: &str,
        mut bars: Vec<PriceBar>,
        mut fundamentals: Vec<FundamentalSnapshot>,
    ) {
        bars.sort_by_key(|bar| bar.date);
        bars.dedup_by_key(|bar| bar.date);
        fundamentals.sort_by_key(|snapshot| snapshot.date);
        fundamentals.dedup_by_key(|snapshot| snapshot.date);

        self.bars.insert(symbol.to_string(), bars);
        if fundamentals.is_empty() {
            self.fundamentals.remove(symbol);
        } else {
            self.fundamentals.insert(symbol.to_string(), fundamentals);
        }
        self.rebuild_dates();
    }

    pub fn clear(&mut self) {
        self.bars.clear();
        self.fundamentals.clear();
        self.dates.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Observed prices on `date`. Bars without a positive price count as no
    /// observation.
    pub fn prices_on(&self, date: NaiveDate) -> PriceMap {
        self.bars
            .iter()
            .filter_map(|(symbol, bars)| {
                find_on(bars, date, |bar| bar.date)
                    .map(|bar| bar.price())
                    .filter(|price| *price > Decimal::ZERO)
                    .map(|price| (symbol.clone(), price))
            })
            .collect()
    }

    pub fn fundamentals_on(&self, date: NaiveDate) -> FundamentalMap {
        self.fundamentals
            .iter()
            .filter_map(|(symbol, series)| {
                find_on(series, date, |snapshot| snapshot.date).map(|snapshot| (symbol.clone(), snapshot.clone()))
            })
            .collect()
    }

    pub fn range(&self, symbol: &str) -> Option<(NaiveDate, NaiveDate)> {
        let bars = self.bars.get(symbol)?;
        Some((bars.first()?.date, bars.last()?.date))
    }

    fn rebuild_dates(&mut self) {
        let unique: BTreeSet<NaiveDate> = self.bars.values().flatten().map(|bar| bar.date).collect();
        self.dates = unique.into_iter().collect();
    }
}

/// Binary search for the entry dated exactly `date` in a date-sorted slice.
fn find_on<T>(series: &[T], date: NaiveDate, date_of: impl Fn(&T) -> NaiveDate) -> Option<&T> {
    let idx = series.partition_point(|item| date_of(item) < date);
    series.get(idx).filter(|item| date_of(item) == date)
}

pub(crate) fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), DataError> {
    if start > end {
        return Err(DataError::InvalidRange { start, end });
    }
    Ok(())
}
