//! Fixed-breakpoint multi-factor stock scoring.
//!
//! Each instrument gets seven sub-scores in [0, 100] (PE, PB, ROE, momentum,
//! volatility, liquidity, sentiment). The total is the weighted sum of the
//! sub-scores; weights need not add up to 1.

use crate::domain::error::QuantrankError;
use crate::domain::financial::{FinancialSnapshot, NewsItem};
use crate::domain::indicator::sma::trailing_mean;
use crate::domain::price::PriceSeries;
use crate::domain::stats::{TRADING_DAYS_PER_YEAR, pct_change, sample_std};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

pub const NEUTRAL_SCORE: f64 = 50.0;
pub const DEFAULT_FALLBACK_WEIGHT: f64 = 0.1;
pub const DEFAULT_LIQUIDITY_MIN_BARS: usize = 20;

const TREND_WINDOW: usize = 20;
const MIN_RETURN_OBSERVATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreFactor {
    Pe,
    Pb,
    Roe,
    Momentum,
    Volatility,
    Liquidity,
    Sentiment,
}

impl ScoreFactor {
    pub const ALL: [ScoreFactor; 7] = [
        ScoreFactor::Pe,
        ScoreFactor::Pb,
        ScoreFactor::Roe,
        ScoreFactor::Momentum,
        ScoreFactor::Volatility,
        ScoreFactor::Liquidity,
        ScoreFactor::Sentiment,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ScoreFactor::Pe => "pe",
            ScoreFactor::Pb => "pb",
            ScoreFactor::Roe => "roe",
            ScoreFactor::Momentum => "momentum",
            ScoreFactor::Volatility => "volatility",
            ScoreFactor::Liquidity => "liquidity",
            ScoreFactor::Sentiment => "sentiment",
        }
    }
}

/// Per-factor weights. A factor without an entry uses `fallback`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringWeights {
    weights: HashMap<ScoreFactor, f64>,
    pub fallback: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        let weights = HashMap::from([
            (ScoreFactor::Pe, 0.15),
            (ScoreFactor::Pb, 0.10),
            (ScoreFactor::Roe, 0.20),
            (ScoreFactor::Momentum, 0.20),
            (ScoreFactor::Volatility, 0.10),
            (ScoreFactor::Liquidity, 0.10),
        ]);
        Self {
            weights,
            fallback: DEFAULT_FALLBACK_WEIGHT,
        }
    }
}

impl ScoringWeights {
    pub fn set(&mut self, factor: ScoreFactor, weight: f64) {
        self.weights.insert(factor, weight);
    }

    pub fn get(&self, factor: ScoreFactor) -> f64 {
        self.weights.get(&factor).copied().unwrap_or(self.fallback)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScorerConfig {
    pub weights: ScoringWeights,
    pub liquidity_min_bars: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            liquidity_min_bars: DEFAULT_LIQUIDITY_MIN_BARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorScoreSet {
    pub code: String,
    pub pe_score: f64,
    pub pb_score: f64,
    pub roe_score: f64,
    pub momentum_score: f64,
    pub volatility_score: f64,
    pub liquidity_score: f64,
    pub sentiment_score: f64,
    pub total_score: f64,
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub roe: Option<f64>,
    pub market_cap: Option<f64>,
    /// 1 = best; 0 until the set is ranked in a batch.
    pub rank: usize,
}

impl FactorScoreSet {
    fn sub_score(&self, factor: ScoreFactor) -> f64 {
        match factor {
            ScoreFactor::Pe => self.pe_score,
            ScoreFactor::Pb => self.pb_score,
            ScoreFactor::Roe => self.roe_score,
            ScoreFactor::Momentum => self.momentum_score,
            ScoreFactor::Volatility => self.volatility_score,
            ScoreFactor::Liquidity => self.liquidity_score,
            ScoreFactor::Sentiment => self.sentiment_score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Hold,
    Reduce,
    Sell,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::StrongBuy => "strong buy",
            Recommendation::Buy => "buy",
            Recommendation::Hold => "hold",
            Recommendation::Reduce => "reduce",
            Recommendation::Sell => "sell",
        };
        f.write_str(s)
    }
}

/// Map a total score to a recommendation tier.
pub fn recommend(score: f64) -> Recommendation {
    if score >= 80.0 {
        Recommendation::StrongBuy
    } else if score >= 65.0 {
        Recommendation::Buy
    } else if score >= 50.0 {
        Recommendation::Hold
    } else if score >= 35.0 {
        Recommendation::Reduce
    } else {
        Recommendation::Sell
    }
}

/// Lower PE is better. Absent or non-positive PE is neutral.
pub fn score_pe(pe: Option<f64>) -> f64 {
    match pe {
        Some(pe) if pe > 0.0 => {
            if pe < 10.0 {
                100.0
            } else if pe < 20.0 {
                80.0
            } else if pe < 30.0 {
                60.0
            } else if pe < 50.0 {
                40.0
            } else {
                20.0
            }
        }
        _ => NEUTRAL_SCORE,
    }
}

/// Lower PB is better. Absent or non-positive PB is neutral.
pub fn score_pb(pb: Option<f64>) -> f64 {
    match pb {
        Some(pb) if pb > 0.0 => {
            if pb < 1.0 {
                100.0
            } else if pb < 2.0 {
                80.0
            } else if pb < 3.0 {
                60.0
            } else if pb < 5.0 {
                40.0
            } else {
                20.0
            }
        }
        _ => NEUTRAL_SCORE,
    }
}

/// Higher ROE (percent) is better. Only an absent ROE is neutral.
pub fn score_roe(roe: Option<f64>) -> f64 {
    let Some(roe) = roe.filter(|r| r.is_finite()) else {
        return NEUTRAL_SCORE;
    };
    if roe > 25.0 {
        100.0
    } else if roe > 20.0 {
        85.0
    } else if roe > 15.0 {
        70.0
    } else if roe > 10.0 {
        55.0
    } else if roe > 5.0 {
        40.0
    } else {
        20.0
    }
}

/// 5-bar mean against 20-bar mean of the trailing closes.
pub fn score_momentum(closes: &[f64]) -> f64 {
    if closes.len() < TREND_WINDOW {
        return NEUTRAL_SCORE;
    }
    let ma5 = trailing_mean(closes, 5);
    let ma20 = trailing_mean(closes, TREND_WINDOW);

    if ma5 > ma20 * 1.05 {
        80.0
    } else if ma5 > ma20 {
        60.0
    } else if ma5 > ma20 * 0.95 {
        40.0
    } else {
        20.0
    }
}

/// Annualized volatility of close-to-close returns; calmer is better.
pub fn score_volatility(closes: &[f64]) -> f64 {
    if closes.len() < TREND_WINDOW {
        return NEUTRAL_SCORE;
    }
    let returns = pct_change(closes);
    if returns.len() < MIN_RETURN_OBSERVATIONS {
        return NEUTRAL_SCORE;
    }
    let vol = sample_std(&returns) * TRADING_DAYS_PER_YEAR.sqrt();

    if vol < 0.15 {
        100.0
    } else if vol < 0.25 {
        80.0
    } else if vol < 0.35 {
        60.0
    } else if vol < 0.5 {
        40.0
    } else {
        20.0
    }
}

/// Bucket a trailing mean volume. Shared with the factor model.
pub fn volume_bucket(avg_volume: f64) -> f64 {
    if avg_volume > 1e8 {
        100.0
    } else if avg_volume > 5e7 {
        80.0
    } else if avg_volume > 1e7 {
        60.0
    } else if avg_volume > 5e6 {
        40.0
    } else {
        20.0
    }
}

/// Trailing-20-bar mean volume, neutral below `min_bars`.
pub fn score_liquidity(volumes: &[f64], min_bars: usize) -> f64 {
    if volumes.len() < min_bars || volumes.is_empty() {
        return NEUTRAL_SCORE;
    }
    volume_bucket(trailing_mean(volumes, TREND_WINDOW))
}

/// Mean sentiment rescaled from [-1, 1] to [0, 100].
pub fn score_sentiment(news: &[NewsItem]) -> f64 {
    if news.is_empty() {
        return NEUTRAL_SCORE;
    }
    let avg = news.iter().map(|n| n.sentiment_score).sum::<f64>() / news.len() as f64;
    ((avg + 1.0) / 2.0 * 100.0).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Default)]
pub struct StockScorer {
    config: ScorerConfig,
}

impl StockScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Score one instrument. Fails only on a series with non-finite closes or
    /// volumes.
    pub fn score(
        &self,
        series: &PriceSeries,
        financial: Option<&FinancialSnapshot>,
        news: &[NewsItem],
    ) -> Result<FactorScoreSet, QuantrankError> {
        if let Some(bar) = series.first_non_finite() {
            return Err(QuantrankError::InvalidSeries {
                code: series.code().to_string(),
                reason: format!("non-finite close or volume on {}", bar.date),
            });
        }

        let financial = financial.cloned().unwrap_or_default().sanitized();
        let closes = series.closes();
        let volumes = series.volumes();

        let mut set = FactorScoreSet {
            code: series.code().to_string(),
            pe_score: score_pe(financial.pe),
            pb_score: score_pb(financial.pb),
            roe_score: score_roe(financial.roe),
            momentum_score: score_momentum(&closes),
            volatility_score: score_volatility(&closes),
            liquidity_score: score_liquidity(&volumes, self.config.liquidity_min_bars),
            sentiment_score: score_sentiment(news),
            total_score: 0.0,
            pe: financial.pe,
            pb: financial.pb,
            roe: financial.roe,
            market_cap: financial.market_cap,
            rank: 0,
        };
        set.total_score = ScoreFactor::ALL
            .iter()
            .map(|&f| set.sub_score(f) * self.config.weights.get(f))
            .sum();
        Ok(set)
    }

    /// Score every series in parallel and rank by descending total score.
    /// Instruments that fail to score are logged and left out.
    pub fn score_stocks(
        &self,
        series: &[PriceSeries],
        financials: &HashMap<String, FinancialSnapshot>,
        news: &HashMap<String, Vec<NewsItem>>,
    ) -> Vec<FactorScoreSet> {
        let results: Vec<Result<FactorScoreSet, QuantrankError>> = series
            .par_iter()
            .map(|s| {
                let items = news.get(s.code()).map(Vec::as_slice).unwrap_or(&[]);
                self.score(s, financials.get(s.code()), items)
            })
            .collect();

        let mut scores: Vec<FactorScoreSet> = results
            .into_iter()
            .filter_map(|r| match r {
                Ok(set) => Some(set),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping instrument");
                    None
                }
            })
            .collect();

        scores.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
        for (i, s) in scores.iter_mut().enumerate() {
            s.rank = i + 1;
        }
        tracing::debug!(scored = scores.len(), input = series.len(), "scoring complete");
        scores
    }
}

/// Codes of the first `n` entries of a ranked list.
pub fn top_codes(scores: &[FactorScoreSet], n: usize) -> Vec<String> {
    scores.iter().take(n).map(|s| s.code.clone()).collect()
}
