//! CSV directory data adapter.
//!
//! Layout under the base directory:
//! - `<CODE>.csv`: `date,open,high,low,close,volume[,amount,pct_change,turnover]`
//! - `financials.csv`: `code,pe,pb,roe,revenue,profit,market_cap,ps`
//! - `news.csv`: `code,title,sentiment_score`
//!
//! Codes match file names and `code` columns case-insensitively and are
//! reported upper-case.

use crate::domain::error::QuantrankError;
use crate::domain::financial::{FinancialSnapshot, NewsItem};
use crate::domain::price::{PriceBar, PriceSeries};
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const FINANCIALS_FILE: &str = "financials.csv";
const NEWS_FILE: &str = "news.csv";

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default)]
    amount: f64,
    #[serde(default)]
    pct_change: f64,
    #[serde(default)]
    turnover: f64,
}

#[derive(Debug, Deserialize)]
struct FinancialRow {
    code: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pe: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pb: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    roe: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    revenue: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    profit: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    market_cap: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    ps: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NewsRow {
    code: String,
    title: String,
    sentiment_score: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Upper-case code for a price file name; `None` for anything else.
    fn code_of(file_name: &str) -> Option<String> {
        if file_name == FINANCIALS_FILE || file_name == NEWS_FILE {
            return None;
        }
        file_name.strip_suffix(".csv").map(str::to_uppercase)
    }

    /// Price file for `code` (upper-case), whatever the case of its name.
    fn series_path(&self, code: &str) -> Option<PathBuf> {
        let exact = self.base_path.join(format!("{code}.csv"));
        if exact.is_file() {
            return Some(exact);
        }
        fs::read_dir(&self.base_path)
            .ok()?
            .filter_map(Result::ok)
            .find(|entry| {
                Self::code_of(&entry.file_name().to_string_lossy()).as_deref() == Some(code)
                    && entry.path().is_file()
            })
            .map(|entry| entry.path())
    }

    fn open(path: &Path, missing: &str) -> Result<csv::Reader<fs::File>, QuantrankError> {
        if !path.is_file() {
            return Err(QuantrankError::NoData {
                code: missing.to_string(),
            });
        }
        csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| QuantrankError::DataSource {
                reason: format!("failed to read {}: {}", path.display(), e),
            })
    }

    fn parse_error(path: &Path, e: csv::Error) -> QuantrankError {
        QuantrankError::DataSource {
            reason: format!("CSV parse error in {}: {}", path.display(), e),
        }
    }
}

impl DataPort for CsvAdapter {
    fn fetch_series(
        &self,
        code: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<PriceSeries, QuantrankError> {
        let code = code.to_uppercase();
        let path = self.series_path(&code).ok_or_else(|| QuantrankError::NoData {
            code: code.clone(),
        })?;
        let mut rdr = Self::open(&path, &code)?;

        let mut bars = Vec::new();
        for result in rdr.deserialize::<PriceRow>() {
            let row = result.map_err(|e| Self::parse_error(&path, e))?;
            if start.is_some_and(|s| row.date < s) || end.is_some_and(|e| row.date > e) {
                continue;
            }
            bars.push(PriceBar {
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
                amount: row.amount,
                pct_change: row.pct_change,
                turnover: row.turnover,
            });
        }

        if bars.is_empty() {
            return Err(QuantrankError::NoData { code });
        }

        bars.sort_by_key(|b| b.date);
        PriceSeries::new(code, bars)
    }

    fn fetch_financials(
        &self,
        codes: &[String],
    ) -> Result<HashMap<String, FinancialSnapshot>, QuantrankError> {
        let path = self.base_path.join(FINANCIALS_FILE);
        let mut rdr = Self::open(&path, FINANCIALS_FILE)?;

        let mut out = HashMap::new();
        for result in rdr.deserialize::<FinancialRow>() {
            let row = result.map_err(|e| Self::parse_error(&path, e))?;
            let code = row.code.to_uppercase();
            if !codes.iter().any(|c| c.eq_ignore_ascii_case(&code)) {
                continue;
            }
            let snapshot = FinancialSnapshot {
                pe: row.pe,
                pb: row.pb,
                roe: row.roe,
                revenue: row.revenue,
                profit: row.profit,
                market_cap: row.market_cap,
                ps: row.ps,
            }
            .sanitized();
            out.insert(code, snapshot);
        }
        Ok(out)
    }

    fn fetch_news(
        &self,
        codes: &[String],
    ) -> Result<HashMap<String, Vec<NewsItem>>, QuantrankError> {
        let path = self.base_path.join(NEWS_FILE);
        let mut rdr = Self::open(&path, NEWS_FILE)?;

        let mut out: HashMap<String, Vec<NewsItem>> = HashMap::new();
        for result in rdr.deserialize::<NewsRow>() {
            let row = result.map_err(|e| Self::parse_error(&path, e))?;
            let code = row.code.to_uppercase();
            if !codes.iter().any(|c| c.eq_ignore_ascii_case(&code))
                || !row.sentiment_score.is_finite()
            {
                continue;
            }
            out.entry(code).or_default().push(NewsItem {
                title: row.title,
                sentiment_score: row.sentiment_score,
            });
        }
        Ok(out)
    }

    fn list_codes(&self) -> Result<Vec<String>, QuantrankError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| QuantrankError::DataSource {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut codes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| QuantrankError::DataSource {
                reason: format!("directory entry error: {}", e),
            })?;

            if let Some(code) = Self::code_of(&entry.file_name().to_string_lossy()) {
                codes.push(code);
            }
        }

        codes.sort();
        codes.dedup();
        Ok(codes)
    }
}
