//! Standard technical indicator set over one price series.

use crate::domain::indicator::{
    IndicatorSeries, IndicatorType, IndicatorValue, calculate_bollinger, calculate_ema,
    calculate_macd, calculate_rsi, calculate_sma, calculate_stddev,
};
use crate::domain::price::{PriceBar, PriceSeries};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

/// MA5/10/20, EMA12/26, MACD(12,26,9), RSI(14), Bollinger(20, ±2σ).
pub fn standard_indicator_types() -> Vec<IndicatorType> {
    vec![
        IndicatorType::Sma(5),
        IndicatorType::Sma(10),
        IndicatorType::Sma(20),
        IndicatorType::Ema(12),
        IndicatorType::Ema(26),
        IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        },
        IndicatorType::Rsi(14),
        IndicatorType::Bollinger {
            period: 20,
            stddev_mult_x100: 200,
        },
    ]
}

pub fn compute_indicator(bars: &[PriceBar], indicator_type: &IndicatorType) -> IndicatorSeries {
    match *indicator_type {
        IndicatorType::Sma(n) => calculate_sma(bars, n),
        IndicatorType::Ema(n) => calculate_ema(bars, n),
        IndicatorType::Rsi(n) => calculate_rsi(bars, n),
        IndicatorType::Stddev(n) => calculate_stddev(bars, n),
        IndicatorType::Macd { fast, slow, signal } => calculate_macd(bars, fast, slow, signal),
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        } => calculate_bollinger(bars, period, stddev_mult_x100),
    }
}

/// Compute each requested indicator once, keyed by type.
pub fn compute_indicators(
    series: &PriceSeries,
    types: &[IndicatorType],
) -> HashMap<IndicatorType, IndicatorSeries> {
    types
        .iter()
        .map(|t| (t.clone(), compute_indicator(series.bars(), t)))
        .collect()
}

/// Latest value of every standard indicator. Fields still in warmup are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TechnicalSnapshot {
    pub code: String,
    pub date: Option<NaiveDate>,
    pub close: Option<f64>,
    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    pub ema12: Option<f64>,
    pub ema26: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub rsi14: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub volume_ma5: Option<f64>,
    pub pct_change_5: Option<f64>,
    pub pct_change_20: Option<f64>,
}

pub fn technical_indicator_set(series: &PriceSeries) -> TechnicalSnapshot {
    let indicators = compute_indicators(series, &standard_indicator_types());
    let simple = |t: IndicatorType| {
        indicators
            .get(&t)
            .and_then(|s| s.last_valid())
            .and_then(IndicatorValue::as_simple)
    };

    let mut snapshot = TechnicalSnapshot {
        code: series.code().to_string(),
        date: series.bars().last().map(|b| b.date),
        close: series.last_close(),
        ma5: simple(IndicatorType::Sma(5)),
        ma10: simple(IndicatorType::Sma(10)),
        ma20: simple(IndicatorType::Sma(20)),
        ema12: simple(IndicatorType::Ema(12)),
        ema26: simple(IndicatorType::Ema(26)),
        rsi14: simple(IndicatorType::Rsi(14)),
        volume_ma5: volume_mean(series, 5),
        pct_change_5: pct_change_over(series, 5),
        pct_change_20: pct_change_over(series, 20),
        ..TechnicalSnapshot::default()
    };

    let macd_type = IndicatorType::Macd {
        fast: 12,
        slow: 26,
        signal: 9,
    };
    if let Some(IndicatorValue::Macd {
        line,
        signal,
        histogram,
    }) = indicators.get(&macd_type).and_then(|s| s.last_valid())
    {
        snapshot.macd = Some(*line);
        snapshot.macd_signal = Some(*signal);
        snapshot.macd_histogram = Some(*histogram);
    }

    let boll_type = IndicatorType::Bollinger {
        period: 20,
        stddev_mult_x100: 200,
    };
    if let Some(IndicatorValue::Bollinger {
        upper,
        middle,
        lower,
    }) = indicators.get(&boll_type).and_then(|s| s.last_valid())
    {
        snapshot.bb_upper = Some(*upper);
        snapshot.bb_middle = Some(*middle);
        snapshot.bb_lower = Some(*lower);
    }

    snapshot
}

fn volume_mean(series: &PriceSeries, period: usize) -> Option<f64> {
    if period == 0 || series.len() < period {
        return None;
    }
    Some(crate::domain::stats::mean(&series.volumes()[series.len() - period..]))
}

/// Percent change of the last close against the close `periods` bars earlier.
fn pct_change_over(series: &PriceSeries, periods: usize) -> Option<f64> {
    let closes = series.closes();
    if closes.len() <= periods {
        return None;
    }
    let base = closes[closes.len() - 1 - periods];
    let last = closes[closes.len() - 1];
    (base != 0.0).then(|| (last / base - 1.0) * 100.0)
}
