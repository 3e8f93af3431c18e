//! Daily bar history from CSV files, one file per ticker.
//!
//! Files live at `<dir>/<TICKER>.csv` with a header row and the columns
//! `date,open,high,low,close,volume`. Dates are `%Y-%m-%d`.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::Bar;
use chrono::{NaiveDate, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvHistory {
    dir: PathBuf,
}

fn data_err(reason: String) -> TraderError {
    TraderError::Data { reason }
}

fn field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
    line: u64,
) -> Result<T, TraderError>
where
    T::Err: std::fmt::Display,
{
    record
        .get(idx)
        .ok_or_else(|| data_err(format!("line {}: missing {} column", line, name)))?
        .trim()
        .parse()
        .map_err(|e| data_err(format!("line {}: invalid {} value: {}", line, name, e)))
}

impl CsvHistory {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", ticker))
    }

    /// All bars for `ticker`, oldest first.
    pub fn load(&self, ticker: &str) -> Result<Vec<Bar>, TraderError> {
        let path = self.path_for(ticker);
        let content = fs::read_to_string(&path)
            .map_err(|e| data_err(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (i, result) in rdr.records().enumerate() {
            let line = i as u64 + 2;
            let record = result.map_err(|e| data_err(format!("CSV parse error: {}", e)))?;

            let date_str = record
                .get(0)
                .ok_or_else(|| data_err(format!("line {}: missing date column", line)))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| data_err(format!("line {}: invalid date: {}", line, e)))?;
            let timestamp = date
                .and_hms_opt(0, 0, 0)
                .map(|dt| Utc.from_utc_datetime(&dt))
                .ok_or_else(|| data_err(format!("line {}: invalid date", line)))?;

            let open: f64 = field(&record, 1, "open", line)?;
            let high: f64 = field(&record, 2, "high", line)?;
            let low: f64 = field(&record, 3, "low", line)?;
            let close: f64 = field(&record, 4, "close", line)?;
            let volume: i64 = field(&record, 5, "volume", line)?;

            if high < low {
                return Err(data_err(format!(
                    "line {}: high {} below low {}",
                    line, high, low
                )));
            }

            bars.push(Bar {
                ticker: ticker.to_string(),
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}
