//! Distributional risk statistics over daily return series.
//!
//! Returns and every derived figure are fractions (-0.05 = -5%).

use crate::domain::portfolio::Portfolio;
use crate::domain::stats::{
    TRADING_DAYS_PER_YEAR, aligned_tails, correlation, excess_kurtosis, max_drawdown, mean,
    percentile, sample_covariance, sample_std, skewness,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

const HIGH_RISK_THRESHOLD: f64 = 0.4;
const MEDIUM_RISK_THRESHOLD: f64 = 0.25;
const STOP_LOSS_DRAWDOWN: f64 = 0.3;
const VAR_95_ALERT: f64 = -0.05;
const LEFT_TAIL_SKEW: f64 = -1.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskMetricsRecord {
    pub volatility: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub cvar_95: f64,
    pub cvar_99: f64,
    pub max_drawdown: f64,
    pub skewness: f64,
    /// Excess kurtosis (normal = 0).
    pub kurtosis: f64,
    pub beta: Option<f64>,
    pub correlation: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkComparison {
    pub beta: f64,
    pub correlation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub risk_level: RiskLevel,
    pub metrics: RiskMetricsRecord,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vs_benchmark: Option<BenchmarkComparison>,
}

/// Full metric record for `returns`. Non-finite observations are dropped;
/// fewer than two remaining yields the default record.
pub fn calculate_all_metrics(returns: &[f64]) -> RiskMetricsRecord {
    let returns: Vec<f64> = returns.iter().copied().filter(|r| r.is_finite()).collect();
    if returns.len() < 2 {
        return RiskMetricsRecord::default();
    }

    let var_95 = value_at_risk(&returns, 0.95);
    let var_99 = value_at_risk(&returns, 0.99);

    RiskMetricsRecord {
        volatility: sample_std(&returns) * TRADING_DAYS_PER_YEAR.sqrt(),
        var_95,
        var_99,
        cvar_95: tail_mean(&returns, var_95),
        cvar_99: tail_mean(&returns, var_99),
        max_drawdown: wealth_drawdown(&returns),
        skewness: skewness(&returns),
        kurtosis: excess_kurtosis(&returns),
        beta: None,
        correlation: None,
    }
}

/// The `(1 - confidence)` quantile of `returns`.
pub fn value_at_risk(returns: &[f64], confidence: f64) -> f64 {
    percentile(returns, (1.0 - confidence) * 100.0)
}

fn tail_mean(returns: &[f64], threshold: f64) -> f64 {
    let tail: Vec<f64> = returns.iter().copied().filter(|&r| r <= threshold).collect();
    mean(&tail)
}

/// Drawdown of the compounded wealth index built from `returns`.
fn wealth_drawdown(returns: &[f64]) -> f64 {
    let wealth: Vec<f64> = returns
        .iter()
        .scan(1.0, |w, r| {
            *w *= 1.0 + r;
            Some(*w)
        })
        .collect();
    max_drawdown(&wealth)
}

/// Risk of the weighted combination of per-instrument returns.
///
/// Only instruments present in both inputs count. Series are cut to the
/// shortest length, keeping the most recent observations, and the surviving
/// weights are re-normalized to sum to 1.
pub fn calculate_portfolio_risk(
    returns_by_code: &HashMap<String, Vec<f64>>,
    portfolio: &Portfolio,
) -> RiskMetricsRecord {
    let members: Vec<(&[f64], f64)> = portfolio
        .iter()
        .filter_map(|(code, weight)| {
            returns_by_code
                .get(code)
                .map(|r| (r.as_slice(), weight))
        })
        .collect();

    let Some(min_len) = members.iter().map(|(r, _)| r.len()).min() else {
        return RiskMetricsRecord::default();
    };
    let total_weight: f64 = members.iter().map(|(_, w)| w).sum();
    if total_weight == 0.0 || !total_weight.is_finite() {
        return RiskMetricsRecord::default();
    }

    let mut combined = vec![0.0; min_len];
    for (returns, weight) in &members {
        let tail = &returns[returns.len() - min_len..];
        let w = weight / total_weight;
        for (acc, r) in combined.iter_mut().zip(tail) {
            *acc += r * w;
        }
    }

    calculate_all_metrics(&combined)
}

/// Sensitivity of `asset` to `market` over their common trailing window.
/// Too little data or a flat market gives 1.0.
pub fn calculate_beta(asset: &[f64], market: &[f64]) -> f64 {
    if asset.len() < 2 || market.len() < 2 {
        return 1.0;
    }
    let (asset, market) = aligned_tails(asset, market);
    let market_std = sample_std(market);
    let market_var = market_std * market_std;
    if market_var == 0.0 {
        return 1.0;
    }
    let beta = sample_covariance(asset, market) / market_var;
    if beta.is_finite() { beta } else { 1.0 }
}

/// Pearson correlation over the common trailing window.
pub fn calculate_correlation(a: &[f64], b: &[f64]) -> f64 {
    if a.len() < 2 || b.len() < 2 {
        return 0.0;
    }
    let (a, b) = aligned_tails(a, b);
    correlation(a, b)
}

pub fn assess_risk_level(metrics: &RiskMetricsRecord) -> RiskLevel {
    if metrics.volatility > HIGH_RISK_THRESHOLD || metrics.max_drawdown > HIGH_RISK_THRESHOLD {
        RiskLevel::High
    } else if metrics.volatility > MEDIUM_RISK_THRESHOLD
        || metrics.max_drawdown > MEDIUM_RISK_THRESHOLD
    {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn recommendations(metrics: &RiskMetricsRecord) -> Vec<String> {
    let mut out = Vec::new();

    if metrics.volatility > HIGH_RISK_THRESHOLD {
        out.push("Volatility is very high; reduce position size or diversify".to_string());
    } else if metrics.volatility > MEDIUM_RISK_THRESHOLD {
        out.push("Volatility is elevated; watch risk controls".to_string());
    }
    if metrics.max_drawdown > STOP_LOSS_DRAWDOWN {
        out.push("Maximum drawdown is large; consider a stop-loss".to_string());
    }
    if metrics.var_95 < VAR_95_ALERT {
        out.push("95% VaR is high; significant downside risk".to_string());
    }
    if metrics.skewness < LEFT_TAIL_SKEW {
        out.push("Returns are left-skewed; heavy left tail".to_string());
    }

    if out.is_empty() {
        out.push("Risk metrics are normal; keep the current strategy".to_string());
    }
    out
}

pub fn risk_report(returns: &[f64], benchmark: Option<&[f64]>) -> RiskReport {
    let metrics = calculate_all_metrics(returns);
    let vs_benchmark = benchmark.map(|bench| BenchmarkComparison {
        beta: calculate_beta(returns, bench),
        correlation: calculate_correlation(returns, bench),
    });

    RiskReport {
        risk_level: assess_risk_level(&metrics),
        recommendations: recommendations(&metrics),
        metrics,
        vs_benchmark,
    }
}
