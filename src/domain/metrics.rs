//! Return-based performance metrics for a daily value series.

use crate::domain::stats::{TRADING_DAYS_PER_YEAR, max_drawdown, mean, population_std};
use chrono::NaiveDate;
use serde::Serialize;

/// One day of portfolio valuation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuePoint {
    pub date: NaiveDate,
    pub value: f64,
    /// Change against the previous point; 0 on the first point.
    pub daily_return: f64,
}

/// All ratios are fractions (0.25 = 25%).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub annual_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub volatility: f64,
    pub win_rate: f64,
}

impl PerformanceMetrics {
    /// Metrics over `values`. Fewer than two points yields all zeros.
    pub fn compute(values: &[ValuePoint], initial_capital: f64, risk_free_rate: f64) -> Self {
        if values.len() < 2 {
            return Self::default();
        }

        let final_value = values[values.len() - 1].value;
        let total_return = if initial_capital > 0.0 {
            (final_value - initial_capital) / initial_capital
        } else {
            0.0
        };

        let trading_days = values.len() as f64;
        let growth = 1.0 + total_return;
        let annual_return = if growth > 0.0 {
            growth.powf(TRADING_DAYS_PER_YEAR / trading_days) - 1.0
        } else {
            -1.0
        };

        let curve: Vec<f64> = values.iter().map(|p| p.value).collect();
        let max_drawdown = max_drawdown(&curve);

        // The first point has no prior value and carries no return.
        let returns: Vec<f64> = values[1..].iter().map(|p| p.daily_return).collect();
        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(&returns, daily_rf);

        let wins = returns.iter().filter(|&&r| r > 0.0).count();
        let win_rate = wins as f64 / returns.len() as f64;

        let calmar_ratio = if max_drawdown > 0.0 {
            annual_return / max_drawdown
        } else {
            0.0
        };

        PerformanceMetrics {
            total_return,
            annual_return,
            max_drawdown,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            volatility: population_std(&returns) * TRADING_DAYS_PER_YEAR.sqrt(),
            win_rate,
        }
    }
}

/// Daily returns for a value curve: (v_t - v_{t-1}) / v_{t-1}, 0 for the
/// first point or after a zero value.
pub fn daily_returns(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    for (i, &v) in values.iter().enumerate() {
        let r = match i.checked_sub(1).map(|j| values[j]) {
            Some(prev) if prev != 0.0 => (v - prev) / prev,
            _ => 0.0,
        };
        out.push(r);
    }
    out
}

/// Annualized Sharpe and Sortino ratios. Both use the population standard
/// deviation; Sortino uses only the negative returns. Degenerate inputs give 0.
fn compute_risk_adjusted(returns: &[f64], daily_rf: f64) -> (f64, f64) {
    if returns.len() < 2 {
        return (0.0, 0.0);
    }

    let excess_return = mean(returns) - daily_rf;
    let stddev = population_std(returns);

    let sharpe = if stddev > 0.0 {
        (excess_return / stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
    let downside_stddev = population_std(&downside);

    let sortino = if downside_stddev > 0.0 {
        (excess_return / downside_stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}
