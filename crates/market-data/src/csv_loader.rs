use crate::error::DataError;
use crate::provider::{MarketDataProvider, PriceBar, SeriesStore, check_range};
use chrono::{NaiveDate, NaiveDateTime};
use core_types::{AssetType, FundamentalMap, FundamentalSnapshot, PriceMap};
use csv::{ReaderBuilder, StringRecord, Trim};
use rust_decimal::Decimal;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reads `<SYMBOL>.csv` files from a data directory.
///
/// Rows that cannot be parsed are skipped. The trading price is the adjusted
/// close, falling back to the close.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    data_dir: PathBuf,
    loaded: SeriesStore,
}

impl CsvProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            loaded: SeriesStore::new(),
        }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{symbol}.csv"))
    }

    /// Parses one symbol's file, keeping rows dated within `[start, end]`.
    pub fn read_symbol(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(Vec<PriceBar>, Vec<FundamentalSnapshot>), DataError> {
        let path = self.path_for(symbol);
        let file = File::open(&path)?;
        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(file);

        let headers = reader.headers()?.clone();
        let columns = Columns::from_headers(&headers, &path)?;

        let mut bars = Vec::new();
        let mut fundamentals = Vec::new();
        let mut rows = 0usize;
        let mut skipped = 0usize;

        for record in reader.records() {
            rows += 1;
            let parsed = record.ok().and_then(|record| columns.parse_row(&record, symbol));
            let Some((bar, fundamental)) = parsed else {
                skipped += 1;
                continue;
            };
            if bar.date < start || bar.date > end {
                continue;
            }
            bars.push(bar);
            if let Some(fundamental) = fundamental {
                fundamentals.push(fundamental);
            }
        }

        if rows == 0 {
            return Err(DataError::NoData(path.display().to_string()));
        }
        if skipped > 0 {
            tracing::debug!("Skipped {} unparsable rows for {}", skipped, symbol);
        }

        Ok((bars, fundamentals))
    }
}

impl MarketDataProvider for CsvProvider {
    fn load(&mut self, symbols: &[String], start: NaiveDate, end: NaiveDate) -> Result<(), DataError> {
        check_range(start, end)?;
        self.loaded.clear();

        for symbol in symbols {
            let (bars, fundamentals) = self.read_symbol(symbol, start, end)?;
            tracing::info!(%symbol, bars = bars.len(), "Loaded price history.");
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

/// Column positions resolved from the header row.
#[derive(Debug, Default)]
struct Columns {
    date: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: Option<usize>,
    volume: Option<usize>,
    adj_close: Option<usize>,
    pe: Option<usize>,
    pe_rank: Option<usize>,
    peg: Option<usize>,
    roe: Option<usize>,
    pb: Option<usize>,
    bond_yield: Option<usize>,
    asset_type: Option<usize>,
    name: Option<usize>,
    is_core: Option<usize>,
    is_tech: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord, file: &Path) -> Result<Self, DataError> {
        let mut columns = Columns::default();
        let mut date = None;

        for (idx, header) in headers.iter().enumerate() {
            let slot = match column_key(header).as_str() {
                "date" | "timestamp" => {
                    date = Some(idx);
                    continue;
                }
                "open" => &mut columns.open,
                "high" => &mut columns.high,
                "low" => &mut columns.low,
                "close" => &mut columns.close,
                "volume" => &mut columns.volume,
                "adjclose" => &mut columns.adj_close,
                "pe" => &mut columns.pe,
                "perank" => &mut columns.pe_rank,
                "peg" => &mut columns.peg,
                "roe" => &mut columns.roe,
                "pb" => &mut columns.pb,
                "yield" | "bondyield" => &mut columns.bond_yield,
                "assettype" => &mut columns.asset_type,
                "name" => &mut columns.name,
                "iscore" => &mut columns.is_core,
                "istech" => &mut columns.is_tech,
                _ => continue,
            };
            *slot = Some(idx);
        }

        columns.date = date.ok_or_else(|| DataError::MissingColumn {
            file: file.to_path_buf(),
            column: "Date".to_string(),
        })?;
        if columns.close.is_none() && columns.adj_close.is_none() {
            return Err(DataError::MissingColumn {
                file: file.to_path_buf(),
                column: "Close".to_string(),
            });
        }
        Ok(columns)
    }

    fn has_fundamentals(&self) -> bool {
        [self.pe, self.pe_rank, self.peg, self.roe, self.pb, self.bond_yield, self.asset_type]
            .iter()
            .any(Option::is_some)
    }

    fn parse_row(&self, record: &StringRecord, symbol: &str) -> Option<(PriceBar, Option<FundamentalSnapshot>)> {
        let date = parse_date(field(record, Some(self.date))?)?;

        let close = number(record, self.close);
        let bar = PriceBar {
            date,
            open: number(record, self.open),
            high: number(record, self.high),
            low: number(record, self.low),
            close,
            volume: number(record, self.volume),
            adj_close: number(record, self.adj_close),
        };
        if bar.price() <= Decimal::ZERO {
            return None;
        }

        let fundamental = self.has_fundamentals().then(|| FundamentalSnapshot {
            symbol: symbol.to_string(),
            date,
            pe: number(record, self.pe),
            pe_rank: number(record, self.pe_rank),
            peg: number(record, self.peg),
            roe: number(record, self.roe),
            pb: field(record, self.pb).and_then(parse_decimal),
            bond_yield: field(record, self.bond_yield).and_then(parse_decimal),
            asset_type: field(record, self.asset_type).map(AssetType::from_label).unwrap_or_default(),
            name: field(record, self.name).unwrap_or_default().to_string(),
            is_core_etf: field(record, self.is_core).is_some_and(parse_flag),
            is_tech_etf: field(record, self.is_tech).is_some_and(parse_flag),
        });

        Some((bar, fundamental))
    }
}

/// Lower-cases a header and drops separators, so `Adj Close`, `adj_close`
/// and `AdjClose` all resolve to the same column.
fn column_key(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn field(record: &StringRecord, idx: Option<usize>) -> Option<&str> {
    record.get(idx?).filter(|value| !value.is_empty())
}

fn number(record: &StringRecord, idx: Option<usize>) -> Decimal {
    field(record, idx).and_then(parse_decimal).unwrap_or(Decimal::ZERO)
}

fn parse_decimal(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
                .ok()
                .map(|datetime| datetime.date())
        })
}
