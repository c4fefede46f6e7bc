//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the first close, then EMA[i] = EMA[i-1] + k*(C[i] - EMA[i-1]).
//! Every bar is valid; early values lean toward the seed.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::price::PriceBar;

pub fn calculate_ema(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type: IndicatorType::Ema(period),
            values: Vec::new(),
        };
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = ema_values(&closes, period)
        .into_iter()
        .zip(bars)
        .map(|(ema, bar)| IndicatorPoint {
            date: bar.date,
            valid: true,
            value: IndicatorValue::Simple(ema),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

/// EMA over raw values, seeded from the first element.
pub fn ema_values(input: &[f64], period: usize) -> Vec<f64> {
    let Some(&seed) = input.first() else {
        return Vec::new();
    };
    let k = 2.0 / (period.max(1) as f64 + 1.0);
    let mut ema = seed;
    let mut out = Vec::with_capacity(input.len());
    out.push(ema);
    for &x in &input[1..] {
        ema += k * (x - ema);
        out.push(ema);
    }
    out
}
