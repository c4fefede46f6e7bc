#![allow(dead_code)]

use chrono::NaiveDate;
use quantrank::domain::error::QuantrankError;
use quantrank::domain::financial::{FinancialSnapshot, NewsItem};
pub use quantrank::domain::price::{PriceBar, PriceSeries};
use quantrank::ports::config_port::ConfigPort;
use quantrank::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
    pub financials: Option<HashMap<String, FinancialSnapshot>>,
    pub news: Option<HashMap<String, Vec<NewsItem>>>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            financials: None,
            news: None,
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }

    pub fn with_financials(mut self, code: &str, snapshot: FinancialSnapshot) -> Self {
        self.financials
            .get_or_insert_with(HashMap::new)
            .insert(code.to_string(), snapshot);
        self
    }

    pub fn with_news(mut self, code: &str, title: &str, sentiment_score: f64) -> Self {
        self.news
            .get_or_insert_with(HashMap::new)
            .entry(code.to_string())
            .or_default()
            .push(NewsItem {
                title: title.to_string(),
                sentiment_score,
            });
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_series(
        &self,
        code: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<PriceSeries, QuantrankError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(QuantrankError::DataSource {
                reason: reason.clone(),
            });
        }
        let bars: Vec<PriceBar> = self
            .data
            .get(code)
            .map(|bars| {
                bars.iter()
                    .filter(|b| start.is_none_or(|s| b.date >= s) && end.is_none_or(|e| b.date <= e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if bars.is_empty() {
            return Err(QuantrankError::NoData {
                code: code.to_string(),
            });
        }
        PriceSeries::new(code, bars)
    }

    fn fetch_financials(
        &self,
        codes: &[String],
    ) -> Result<HashMap<String, FinancialSnapshot>, QuantrankError> {
        let all = self.financials.as_ref().ok_or_else(|| QuantrankError::NoData {
            code: "financials".into(),
        })?;
        Ok(all
            .iter()
            .filter(|(code, _)| codes.contains(code))
            .map(|(code, snap)| (code.clone(), snap.clone()))
            .collect())
    }

    fn fetch_news(
        &self,
        codes: &[String],
    ) -> Result<HashMap<String, Vec<NewsItem>>, QuantrankError> {
        let all = self.news.as_ref().ok_or_else(|| QuantrankError::NoData {
            code: "news".into(),
        })?;
        Ok(all
            .iter()
            .filter(|(code, _)| codes.contains(code))
            .map(|(code, items)| (code.clone(), items.clone()))
            .collect())
    }

    fn list_codes(&self) -> Result<Vec<String>, QuantrankError> {
        let mut codes: Vec<String> = self.data.keys().cloned().collect();
        codes.sort();
        Ok(codes)
    }
}

/// In-memory `ConfigPort` keyed by (section, key).
pub struct MockConfig {
    values: HashMap<(String, String), String>,
}

impl MockConfig {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set(mut self, section: &str, key: &str, value: &str) -> Self {
        self.values
            .insert((section.to_string(), key.to_string()), value.to_string());
        self
    }
}

impl ConfigPort for MockConfig {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.values
            .get(&(section.to_string(), key.to_string()))
            .cloned()
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One bar per calendar day from `start_date` at the given closes.
pub fn bars_from_closes(start_date: &str, closes: &[f64], volume: f64) -> Vec<PriceBar> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar::flat(start + chrono::Duration::days(i as i64), close, volume))
        .collect()
}

/// Linear price path: `start_price + step * i`.
pub fn generate_bars(start_date: &str, count: usize, start_price: f64, step: f64) -> Vec<PriceBar> {
    let closes: Vec<f64> = (0..count).map(|i| start_price + step * i as f64).collect();
    bars_from_closes(start_date, &closes, 1_000_000.0)
}

pub fn make_series(code: &str, bars: Vec<PriceBar>) -> PriceSeries {
    PriceSeries::new(code, bars).unwrap()
}
