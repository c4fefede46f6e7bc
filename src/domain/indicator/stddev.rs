//! Rolling standard deviation of closes.
//!
//! Sample standard deviation (n-1 denominator) over the last n closes.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::price::PriceBar;
use crate::domain::stats::sample_std;

pub fn calculate_stddev(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    IndicatorSeries {
        indicator_type: IndicatorType::Stddev(period),
        values: rolling_std(bars, period)
            .into_iter()
            .zip(bars)
            .map(|(sd, bar)| IndicatorPoint {
                date: bar.date,
                valid: sd.is_some(),
                value: IndicatorValue::Simple(sd.unwrap_or(0.0)),
            })
            .collect(),
    }
}

/// Rolling (mean, sample stddev) of closes; `None` during warmup.
pub(crate) fn rolling_mean_std(bars: &[PriceBar], period: usize) -> Vec<Option<(f64, f64)>> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    (0..closes.len())
        .map(|i| {
            if period == 0 || i + 1 < period {
                return None;
            }
            let window = &closes[i + 1 - period..=i];
            Some((crate::domain::stats::mean(window), sample_std(window)))
        })
        .collect()
}

fn rolling_std(bars: &[PriceBar], period: usize) -> Vec<Option<f64>> {
    rolling_mean_std(bars, period)
        .into_iter()
        .map(|w| w.map(|(_, sd)| sd))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::bars_from_closes;

    #[test]
    fn stddev_warmup() {
        let series = calculate_stddev(&bars_from_closes(&[10.0, 20.0, 30.0, 40.0]), 3);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
        assert!(series.values[3].valid);
    }

    #[test]
    fn stddev_known_values() {
        let series = calculate_stddev(&bars_from_closes(&[2.0, 4.0, 6.0]), 3);
        // mean 4, squared deviations 4+0+4 = 8, / (3-1) = 4
        let sd = series.values[2].value.as_simple().unwrap();
        assert!((sd - 2.0).abs() < 1e-12);
    }

    #[test]
    fn stddev_constant_is_zero() {
        let series = calculate_stddev(&bars_from_closes(&[5.0; 10]), 5);
        for point in series.values.iter().filter(|p| p.valid) {
            assert_eq!(point.value, IndicatorValue::Simple(0.0));
        }
    }

    #[test]
    fn stddev_zero_period() {
        let series = calculate_stddev(&bars_from_closes(&[1.0, 2.0]), 0);
        assert!(series.values.iter().all(|p| !p.valid));
        assert_eq!(series.indicator_type, IndicatorType::Stddev(0));
    }
}
