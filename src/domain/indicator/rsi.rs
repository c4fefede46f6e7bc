//! RSI (Relative Strength Index) with Wilder smoothing.
//!
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)). With no losses RSI is 100,
//! unless there were no gains either, in which case it is 50.
//!
//! Warmup: first n bars are invalid (n price changes are needed).

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::price::PriceBar;

pub const NEUTRAL_RSI: f64 = 50.0;

pub fn calculate_rsi(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = wilder_rsi(&closes, period)
        .into_iter()
        .zip(bars)
        .map(|(rsi, bar)| IndicatorPoint {
            date: bar.date,
            valid: rsi.is_some(),
            value: IndicatorValue::Simple(rsi.unwrap_or(0.0)),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}

/// RSI at the last close, or 50 when there are not enough closes.
pub fn latest_rsi(closes: &[f64], period: usize) -> f64 {
    wilder_rsi(closes, period)
        .last()
        .copied()
        .flatten()
        .unwrap_or(NEUTRAL_RSI)
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 { NEUTRAL_RSI } else { 100.0 }
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

/// One entry per close; `None` during warmup.
fn wilder_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    out[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        out[i + 1] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::bars_from_closes;

    #[test]
    fn rsi_empty_bars() {
        let series = calculate_rsi(&[], 14);
        assert_eq!(series.values.len(), 0);
    }

    #[test]
    fn rsi_warmup_period() {
        let closes: Vec<f64> = (1..=15).map(|i| 100.0 + (i as f64 % 5.0) * 2.0).collect();
        let series = calculate_rsi(&bars_from_closes(&closes), 14);

        assert_eq!(series.values.len(), 15);
        for i in 0..14 {
            assert!(!series.values[i].valid, "Bar {} should be invalid", i);
        }
        assert!(series.values[14].valid, "Bar 14 should be valid");
    }

    #[test]
    fn rsi_all_gains_no_losses() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        assert!((latest_rsi(&closes, 14) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_all_losses_no_gains() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        assert!(latest_rsi(&closes, 14).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_flat_prices_are_neutral() {
        assert_eq!(latest_rsi(&[100.0; 40], 14), NEUTRAL_RSI);
    }

    #[test]
    fn rsi_short_input_is_neutral() {
        let closes: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        assert_eq!(latest_rsi(&closes, 14), NEUTRAL_RSI);
    }

    #[test]
    fn rsi_in_range() {
        let closes: Vec<f64> = (1..=40)
            .map(|i| 100.0 + (i as f64 % 7.0 - 3.0) * 2.0)
            .collect();
        let series = calculate_rsi(&bars_from_closes(&closes), 14);

        for point in series.values.iter().filter(|p| p.valid) {
            let rsi = point.value.as_simple().unwrap();
            assert!((0.0..=100.0).contains(&rsi), "RSI {} out of range", rsi);
        }
    }

    #[test]
    fn rsi_wilder_smoothing_step() {
        // 14 gains of 1, then a loss of 14: avg_gain = 13/14, avg_loss = 1
        let mut closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        closes.push(100.0);
        let rsi = latest_rsi(&closes, 14);
        let avg_gain = 13.0 / 14.0;
        let expected = 100.0 - 100.0 / (1.0 + avg_gain / 1.0);
        assert!((rsi - expected).abs() < 1e-9);
    }

    #[test]
    fn rsi_zero_period() {
        let series = calculate_rsi(&bars_from_closes(&[100.0, 101.0]), 0);
        assert_eq!(series.values.len(), 2);
        assert!(series.values.iter().all(|p| !p.valid));
    }
}
