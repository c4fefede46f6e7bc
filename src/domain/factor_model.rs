//! Cross-sectional factor model.
//!
//! Six raw factors per instrument are min–max normalized across the universe,
//! combined into a weighted composite and ranked.

use crate::domain::error::QuantrankError;
use crate::domain::financial::FinancialSnapshot;
use crate::domain::indicator::sma::trailing_mean;
use crate::domain::price::PriceSeries;
use crate::domain::scorer::{NEUTRAL_SCORE, volume_bucket};
use crate::domain::stats::{TRADING_DAYS_PER_YEAR, pct_change, sample_std};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_MIN_SCORE: f64 = 50.0;

const MOMENTUM_MIN_BARS: usize = 60;
const VOLATILITY_MIN_RETURNS: usize = 10;
const WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Value,
    Quality,
    Momentum,
    Volatility,
    Size,
    Liquidity,
}

impl Factor {
    pub const ALL: [Factor; 6] = [
        Factor::Value,
        Factor::Quality,
        Factor::Momentum,
        Factor::Volatility,
        Factor::Size,
        Factor::Liquidity,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Factor::Value => "value",
            Factor::Quality => "quality",
            Factor::Momentum => "momentum",
            Factor::Volatility => "volatility",
            Factor::Size => "size",
            Factor::Liquidity => "liquidity",
        }
    }

    fn equal_weight() -> f64 {
        1.0 / Factor::ALL.len() as f64
    }
}

/// Composite weights. A factor without an entry weighs 1/6.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorWeights {
    weights: HashMap<Factor, f64>,
}

impl FactorWeights {
    pub fn set(&mut self, factor: Factor, weight: f64) {
        self.weights.insert(factor, weight);
    }

    pub fn get(&self, factor: Factor) -> f64 {
        self.weights
            .get(&factor)
            .copied()
            .unwrap_or_else(Factor::equal_weight)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FactorValues {
    pub value: f64,
    pub quality: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub size: f64,
    pub liquidity: f64,
}

impl FactorValues {
    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::Value => self.value,
            Factor::Quality => self.quality,
            Factor::Momentum => self.momentum,
            Factor::Volatility => self.volatility,
            Factor::Size => self.size,
            Factor::Liquidity => self.liquidity,
        }
    }

    fn set(&mut self, factor: Factor, v: f64) {
        match factor {
            Factor::Value => self.value = v,
            Factor::Quality => self.quality = v,
            Factor::Momentum => self.momentum = v,
            Factor::Volatility => self.volatility = v,
            Factor::Size => self.size = v,
            Factor::Liquidity => self.liquidity = v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorRow {
    pub code: String,
    pub raw: FactorValues,
    pub normalized: FactorValues,
    pub composite_score: f64,
    /// 1 = best; 0 until composite scores are computed.
    pub rank: usize,
}

pub fn factor_value(fin: &FinancialSnapshot) -> f64 {
    let pe = fin.pe.filter(|v| *v > 0.0).unwrap_or(20.0);
    let pb = fin.pb.filter(|v| *v > 0.0).unwrap_or(3.0);
    (0.6 / (pe + 1.0).ln() + 0.4 / (pb + 1.0).ln()) * 100.0
}

pub fn factor_quality(fin: &FinancialSnapshot) -> f64 {
    let roe = fin.roe.unwrap_or(10.0);
    let profit = fin.profit.unwrap_or(0.0);
    let revenue = fin.revenue.unwrap_or(1.0);
    let margin = if revenue > 0.0 { profit / revenue } else { 0.1 };
    (roe * 4.0).min(100.0) * 0.7 + (margin * 200.0).min(100.0) * 0.3
}

fn trailing_return(closes: &[f64], lookback: usize) -> f64 {
    let last = closes[closes.len() - 1];
    let base = closes[closes.len() - 1 - lookback];
    if base > 0.0 { last / base - 1.0 } else { 0.0 }
}

pub fn factor_momentum(closes: &[f64]) -> f64 {
    if closes.len() < MOMENTUM_MIN_BARS {
        return NEUTRAL_SCORE;
    }
    let r20 = trailing_return(closes, 20);
    let r60 = if closes.len() > 60 {
        trailing_return(closes, 60)
    } else {
        r20
    };
    let mom20 = (50.0 + r20 * 500.0).clamp(0.0, 100.0);
    let mom60 = (50.0 + r60 * 300.0).clamp(0.0, 100.0);
    mom20 * 0.6 + mom60 * 0.4
}

pub fn factor_volatility(closes: &[f64]) -> f64 {
    if closes.len() < WINDOW {
        return NEUTRAL_SCORE;
    }
    let returns = pct_change(closes);
    if returns.len() < VOLATILITY_MIN_RETURNS {
        return NEUTRAL_SCORE;
    }
    let vol = sample_std(&returns) * TRADING_DAYS_PER_YEAR.sqrt();
    if vol < 0.1 {
        100.0
    } else if vol < 0.2 {
        80.0
    } else if vol < 0.3 {
        60.0
    } else if vol < 0.5 {
        40.0
    } else {
        20.0
    }
}

pub fn factor_size(fin: &FinancialSnapshot) -> f64 {
    let cap = fin.market_cap.unwrap_or(1e10);
    if cap > 1e11 {
        80.0
    } else if cap > 5e10 {
        70.0
    } else if cap > 1e10 {
        60.0
    } else if cap > 5e9 {
        50.0
    } else {
        40.0
    }
}

pub fn factor_liquidity(volumes: &[f64]) -> f64 {
    if volumes.len() < WINDOW {
        return NEUTRAL_SCORE;
    }
    volume_bucket(trailing_mean(volumes, WINDOW))
}

/// Min–max scale into [0, 100]. A constant column maps to 50 everywhere.
pub fn normalize_factor(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !(range > 0.0) || !range.is_finite() {
        return vec![NEUTRAL_SCORE; values.len()];
    }
    values.iter().map(|v| (v - min) / range * 100.0).collect()
}

fn raw_factors(
    series: &PriceSeries,
    financial: Option<&FinancialSnapshot>,
) -> Result<FactorValues, QuantrankError> {
    if let Some(bar) = series.first_non_finite() {
        return Err(QuantrankError::InvalidSeries {
            code: series.code().to_string(),
            reason: format!("non-finite close or volume on {}", bar.date),
        });
    }
    let fin = financial.cloned().unwrap_or_default().sanitized();
    let closes = series.closes();
    Ok(FactorValues {
        value: factor_value(&fin),
        quality: factor_quality(&fin),
        momentum: factor_momentum(&closes),
        volatility: factor_volatility(&closes),
        size: factor_size(&fin),
        liquidity: factor_liquidity(&series.volumes()),
    })
}

/// Raw and normalized factors for every series, in input order.
/// Composite score and rank are left at zero.
pub fn calculate_factors(
    series: &[PriceSeries],
    financials: &HashMap<String, FinancialSnapshot>,
) -> Vec<FactorRow> {
    let raw: Vec<(String, Result<FactorValues, QuantrankError>)> = series
        .par_iter()
        .map(|s| (s.code().to_string(), raw_factors(s, financials.get(s.code()))))
        .collect();

    let mut rows: Vec<FactorRow> = raw
        .into_iter()
        .filter_map(|(code, r)| match r {
            Ok(raw) => Some(FactorRow {
                code,
                raw,
                normalized: FactorValues::default(),
                composite_score: 0.0,
                rank: 0,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "skipping instrument");
                None
            }
        })
        .collect();

    for factor in Factor::ALL {
        let column: Vec<f64> = rows.iter().map(|r| r.raw.get(factor)).collect();
        for (row, v) in rows.iter_mut().zip(normalize_factor(&column)) {
            row.normalized.set(factor, v);
        }
    }
    rows
}

/// Weighted sum of normalized factors, sorted best first and ranked 1..N.
/// Without weights every factor weighs 1/6.
pub fn calculate_composite_score(
    mut rows: Vec<FactorRow>,
    weights: Option<&FactorWeights>,
) -> Vec<FactorRow> {
    let default_weights = FactorWeights::default();
    let weights = weights.unwrap_or(&default_weights);

    for row in &mut rows {
        row.composite_score = Factor::ALL
            .iter()
            .map(|&f| row.normalized.get(f) * weights.get(f))
            .sum();
    }
    rows.sort_by(|a, b| b.composite_score.total_cmp(&a.composite_score));
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    rows
}

/// Codes with composite ≥ `min_score`, best first, at most `top_n`.
pub fn select_by_factors(rows: &[FactorRow], top_n: usize, min_score: f64) -> Vec<String> {
    rows.iter()
        .filter(|r| r.composite_score >= min_score)
        .take(top_n)
        .map(|r| r.code.clone())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorModelConfig {
    pub weights: FactorWeights,
    pub top_n: usize,
    pub min_score: f64,
}

impl Default for FactorModelConfig {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            top_n: DEFAULT_TOP_N,
            min_score: DEFAULT_MIN_SCORE,
        }
    }
}

/// Factor pipeline bound to one configuration.
#[derive(Debug, Clone, Default)]
pub struct FactorModel {
    config: FactorModelConfig,
}

impl FactorModel {
    pub fn new(config: FactorModelConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FactorModelConfig {
        &self.config
    }

    /// Factors, composite and rank in one pass.
    pub fn rank(
        &self,
        series: &[PriceSeries],
        financials: &HashMap<String, FinancialSnapshot>,
    ) -> Vec<FactorRow> {
        let rows = calculate_factors(series, financials);
        let ranked = calculate_composite_score(rows, Some(&self.config.weights));
        tracing::debug!(rows = ranked.len(), "factor ranking complete");
        ranked
    }

    pub fn select(&self, ranked: &[FactorRow]) -> Vec<String> {
        select_by_factors(ranked, self.config.top_n, self.config.min_score)
    }
}
