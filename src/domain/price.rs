//! Daily price bars, per-instrument price series and the merged trading calendar.

use crate::domain::error::QuantrankError;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
    pub pct_change: f64,
    pub turnover: f64,
}

impl PriceBar {
    /// Bar with every price field set to `close`; volume-derived fields zeroed.
    pub fn flat(date: NaiveDate, close: f64, volume: f64) -> Self {
        Self {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume,
            amount: 0.0,
            pct_change: 0.0,
            turnover: 0.0,
        }
    }
}

/// Ordered bars for one instrument. Dates are strictly increasing.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    code: String,
    bars: Vec<PriceBar>,
    date_index: HashMap<NaiveDate, usize>,
}

impl PriceSeries {
    /// Build a series, rejecting bars that are out of order or share a date.
    pub fn new(code: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, QuantrankError> {
        let code = code.into();
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                let reason = if pair[1].date == pair[0].date {
                    format!("duplicate date {}", pair[1].date)
                } else {
                    format!("{} follows {}", pair[1].date, pair[0].date)
                };
                return Err(QuantrankError::InvalidSeries { code, reason });
            }
        }
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Ok(Self {
            code,
            bars,
            date_index,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// The last `n` bars (all of them if the series is shorter).
    pub fn tail(&self, n: usize) -> &[PriceBar] {
        &self.bars[self.bars.len().saturating_sub(n)..]
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&PriceBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    /// Close on `date`, or the most recent close before it.
    pub fn close_on_or_before(&self, date: NaiveDate) -> Option<f64> {
        if let Some(bar) = self.get_bar(date) {
            return Some(bar.close);
        }
        let idx = self.bars.partition_point(|b| b.date < date);
        idx.checked_sub(1).map(|i| self.bars[i].close)
    }

    /// First bar whose close or volume is not a finite number.
    pub fn first_non_finite(&self) -> Option<&PriceBar> {
        self.bars
            .iter()
            .find(|b| !b.close.is_finite() || !b.volume.is_finite())
    }
}

/// Every distinct date across `series`, ascending.
pub fn build_trading_calendar(series: &[PriceSeries]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = series
        .iter()
        .flat_map(|s| s.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}
