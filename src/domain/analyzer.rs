//! Technical signal generation and portfolio comparison.
//!
//! Returns and volatilities produced here are percentages (2.5 = 2.5%).

use crate::domain::indicator::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW, macd_lines};
use crate::domain::indicator::rsi::latest_rsi;
use crate::domain::indicator::sma::trailing_mean;
use crate::domain::price::PriceSeries;
use crate::domain::stats::{
    TRADING_DAYS_PER_YEAR, mean, pct_change, population_std, sample_covariance, sample_std,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const MIN_ANALYSIS_BARS: usize = 30;
const RSI_PERIOD: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Hold,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockAnalysis {
    pub code: String,
    pub current_price: Option<f64>,
    pub return_5d: f64,
    pub return_20d: f64,
    pub volatility: f64,
    pub ma5: Option<f64>,
    pub ma20: Option<f64>,
    pub signal: Signal,
    pub signal_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategySummary {
    pub avg_return_5d: f64,
    pub avg_return_20d: f64,
    pub avg_volatility: f64,
    pub avg_score: f64,
    pub best_performer: String,
    pub worst_performer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyReport {
    pub total_stocks: usize,
    pub analysis_date: NaiveDate,
    pub stocks: Vec<StockAnalysis>,
    pub summary: Option<StrategySummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortfolioPerformance {
    #[serde(rename = "return")]
    pub return_pct: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub stocks_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Winner {
    A,
    B,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyComparison {
    pub period_days: usize,
    pub portfolio_a: PortfolioPerformance,
    pub portfolio_b: PortfolioPerformance,
    pub winner: Winner,
    pub return_diff: f64,
}

/// Equal-weight allocation with its expected annual return and volatility
/// (percent) and Sharpe ratio.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeightOptimization {
    pub weights: BTreeMap<String, f64>,
    pub expected_return: f64,
    pub expected_volatility: f64,
    pub sharpe_ratio: f64,
}

/// Score a series from its moving averages, RSI(14) and MACD(12,26,9).
/// Fewer than 30 closes ⇒ hold at 50.
pub fn generate_signal(closes: &[f64]) -> (Signal, f64) {
    if closes.len() < MIN_ANALYSIS_BARS {
        return (Signal::Hold, 50.0);
    }

    let ma5 = trailing_mean(closes, 5);
    let ma10 = trailing_mean(closes, 10);
    let ma20 = trailing_mean(closes, 20);
    let current = closes[closes.len() - 1];
    let rsi = latest_rsi(closes, RSI_PERIOD);
    let (macd, signal_line) = macd_lines(closes, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
    let last = closes.len() - 1;

    let mut score: f64 = 50.0;

    if ma5 > ma10 && ma10 > ma20 {
        score += 20.0;
    } else if ma5 > ma20 {
        score += 10.0;
    }

    if current > ma5 {
        score += 10.0;
    }

    if rsi < 30.0 {
        score += 15.0;
    } else if rsi > 70.0 {
        score -= 15.0;
    } else if rsi < 50.0 {
        score += 5.0;
    }

    if macd[last] > signal_line[last] {
        score += 10.0;
    } else {
        score -= 5.0;
    }

    let score = score.clamp(0.0, 100.0);
    let signal = if score >= 70.0 {
        Signal::Buy
    } else if score <= 30.0 {
        Signal::Sell
    } else {
        Signal::Hold
    };
    (signal, score)
}

/// Percent return of the last close over the close `lookback` bars earlier.
fn lookback_return_pct(closes: &[f64], lookback: usize) -> f64 {
    if closes.len() <= lookback {
        return 0.0;
    }
    let base = closes[closes.len() - 1 - lookback];
    if base == 0.0 {
        return 0.0;
    }
    (closes[closes.len() - 1] / base - 1.0) * 100.0
}

pub fn analyze_stock(series: &PriceSeries) -> StockAnalysis {
    let closes = series.closes();
    if closes.len() < MIN_ANALYSIS_BARS {
        return StockAnalysis {
            code: series.code().to_string(),
            current_price: None,
            return_5d: 0.0,
            return_20d: 0.0,
            volatility: 0.0,
            ma5: None,
            ma20: None,
            signal: Signal::Hold,
            signal_score: 50.0,
        };
    }

    let returns = pct_change(&closes);
    let (signal, signal_score) = generate_signal(&closes);
    StockAnalysis {
        code: series.code().to_string(),
        current_price: series.last_close(),
        return_5d: lookback_return_pct(&closes, 5),
        return_20d: lookback_return_pct(&closes, 20),
        volatility: sample_std(&returns) * TRADING_DAYS_PER_YEAR.sqrt() * 100.0,
        ma5: Some(trailing_mean(&closes, 5)),
        ma20: Some(trailing_mean(&closes, 20)),
        signal,
        signal_score,
    }
}

fn summarize(stocks: &[StockAnalysis]) -> Option<StrategySummary> {
    let first = stocks.first()?;
    let mut best = first;
    let mut worst = first;
    for s in &stocks[1..] {
        if s.return_20d > best.return_20d {
            best = s;
        }
        if s.return_20d < worst.return_20d {
            worst = s;
        }
    }

    let avg = |f: fn(&StockAnalysis) -> f64| mean(&stocks.iter().map(f).collect::<Vec<_>>());
    Some(StrategySummary {
        avg_return_5d: avg(|s| s.return_5d),
        avg_return_20d: avg(|s| s.return_20d),
        avg_volatility: avg(|s| s.volatility),
        avg_score: avg(|s| s.signal_score),
        best_performer: best.code.clone(),
        worst_performer: worst.code.clone(),
    })
}

fn index_by_code(series: &[PriceSeries]) -> HashMap<&str, &PriceSeries> {
    series.iter().map(|s| (s.code(), s)).collect()
}

/// Analyze each requested code in order. Codes without a series are skipped.
pub fn analyze_strategy<S: AsRef<str>>(series: &[PriceSeries], codes: &[S]) -> StrategyReport {
    let by_code = index_by_code(series);
    let stocks: Vec<StockAnalysis> = codes
        .iter()
        .filter_map(|c| by_code.get(c.as_ref()))
        .map(|s| analyze_stock(s))
        .collect();

    StrategyReport {
        total_stocks: codes.len(),
        analysis_date: chrono::Local::now().date_naive(),
        summary: summarize(&stocks),
        stocks,
    }
}

fn portfolio_performance(
    by_code: &HashMap<&str, &PriceSeries>,
    codes: &[impl AsRef<str>],
    days: usize,
) -> PortfolioPerformance {
    let back = days.max(1);
    let returns: Vec<f64> = codes
        .iter()
        .filter_map(|c| by_code.get(c.as_ref()))
        .filter(|s| s.len() >= back)
        .filter_map(|s| {
            let closes = s.closes();
            let base = closes[closes.len() - back];
            (base != 0.0).then(|| closes[closes.len() - 1] / base - 1.0)
        })
        .collect();

    if returns.is_empty() {
        return PortfolioPerformance::default();
    }

    let return_pct = mean(&returns) * 100.0;
    let volatility = population_std(&returns) * TRADING_DAYS_PER_YEAR.sqrt() * 100.0;
    PortfolioPerformance {
        return_pct,
        volatility,
        sharpe: if volatility > 0.0 { return_pct / volatility } else { 0.0 },
        stocks_count: returns.len(),
    }
}

/// Compare two code lists by their mean trailing `days` return. A wins only
/// when strictly ahead.
pub fn compare_strategies<A: AsRef<str>, B: AsRef<str>>(
    series: &[PriceSeries],
    portfolio_a: &[A],
    portfolio_b: &[B],
    days: usize,
) -> StrategyComparison {
    let by_code = index_by_code(series);
    let a = portfolio_performance(&by_code, portfolio_a, days);
    let b = portfolio_performance(&by_code, portfolio_b, days);
    StrategyComparison {
        period_days: days,
        winner: if a.return_pct > b.return_pct {
            Winner::A
        } else {
            Winner::B
        },
        return_diff: a.return_pct - b.return_pct,
        portfolio_a: a,
        portfolio_b: b,
    }
}

/// Equal-weight the usable codes (at least 30 bars) and report the expected
/// annual return, volatility and Sharpe ratio. Fewer than two usable codes
/// yields an empty result.
pub fn optimize_weights<S: AsRef<str>>(
    series: &[PriceSeries],
    codes: &[S],
    risk_free_rate: f64,
) -> WeightOptimization {
    let by_code = index_by_code(series);
    let mut requested: Vec<&str> = Vec::with_capacity(codes.len());
    for code in codes {
        if !requested.contains(&code.as_ref()) {
            requested.push(code.as_ref());
        }
    }
    let usable: Vec<(&str, Vec<f64>)> = requested
        .iter()
        .filter_map(|c| by_code.get(c))
        .filter(|s| s.len() >= MIN_ANALYSIS_BARS)
        .map(|s| (s.code(), pct_change(&s.closes())))
        .collect();

    if usable.len() < 2 {
        return WeightOptimization::default();
    }

    let common = usable.iter().map(|(_, r)| r.len()).min().unwrap_or(0);
    let aligned: Vec<&[f64]> = usable
        .iter()
        .map(|(_, r)| &r[r.len() - common..])
        .collect();

    let n = aligned.len();
    let w = 1.0 / n as f64;
    let expected_return: f64 = aligned
        .iter()
        .map(|r| w * mean(r) * TRADING_DAYS_PER_YEAR)
        .sum();

    let mut variance = 0.0;
    for i in 0..n {
        for j in 0..n {
            variance += w * w * sample_covariance(aligned[i], aligned[j]) * TRADING_DAYS_PER_YEAR;
        }
    }
    let volatility = variance.max(0.0).sqrt();
    let sharpe_ratio = if volatility > 0.0 {
        (expected_return - risk_free_rate) / volatility
    } else {
        0.0
    };

    WeightOptimization {
        weights: usable.iter().map(|(c, _)| (c.to_string(), w)).collect(),
        expected_return: expected_return * 100.0,
        expected_volatility: volatility * 100.0,
        sharpe_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::PriceBar;
    use approx::assert_relative_eq;

    fn series_with(code: &str, closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar::flat(start + chrono::Days::new(i as u64), c, 1e6))
            .collect();
        PriceSeries::new(code, bars).unwrap()
    }

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn short_series_holds() {
        assert_eq!(generate_signal(&rising(29)), (Signal::Hold, 50.0));

        let analysis = analyze_stock(&series_with("A", &rising(10)));
        assert_eq!(analysis.signal, Signal::Hold);
        assert_eq!(analysis.signal_score, 50.0);
        assert_eq!(analysis.return_20d, 0.0);
        assert_eq!(analysis.volatility, 0.0);
        assert!(analysis.current_price.is_none());
    }

    #[test]
    fn steady_uptrend_scores_overbought() {
        // MAs aligned +20, price above MA5 +10, RSI 100 -15, MACD above signal +10
        let (signal, score) = generate_signal(&rising(40));
        assert_eq!(score, 75.0);
        assert_eq!(signal, Signal::Buy);
    }

    #[test]
    fn flat_series_holds() {
        // no MA bonus, RSI 50 adds nothing, MACD equal to signal -5
        let (signal, score) = generate_signal(&[100.0; 40]);
        assert_eq!(score, 45.0);
        assert_eq!(signal, Signal::Hold);
    }

    #[test]
    fn steady_downtrend_is_not_a_buy() {
        let closes: Vec<f64> = (0..40).map(|i| 200.0 - 2.0 * i as f64).collect();
        // RSI 0 +15, MACD below signal -5
        let (signal, score) = generate_signal(&closes);
        assert_eq!(score, 60.0);
        assert_eq!(signal, Signal::Hold);
    }

    #[test]
    fn analyze_stock_returns_in_percent() {
        let closes = rising(40);
        let a = analyze_stock(&series_with("A", &closes));
        assert_eq!(a.current_price, Some(139.0));
        assert_relative_eq!(a.return_5d, (139.0 / 134.0 - 1.0) * 100.0, epsilon = 1e-9);
        assert_relative_eq!(a.return_20d, (139.0 / 119.0 - 1.0) * 100.0, epsilon = 1e-9);
        assert_eq!(a.ma5, Some(137.0));
        assert_eq!(a.ma20, Some(129.5));
        assert!(a.volatility > 0.0);
    }

    #[test]
    fn analyze_strategy_skips_missing_and_summarizes() {
        let up = series_with("UP", &rising(40));
        let down = series_with("DOWN", &(0..40).map(|i| 200.0 - i as f64).collect::<Vec<_>>());
        let report = analyze_strategy(&[up, down], &["UP", "MISSING", "DOWN"]);

        assert_eq!(report.total_stocks, 3);
        assert_eq!(report.stocks.len(), 2);
        let summary = report.summary.unwrap();
        assert_eq!(summary.best_performer, "UP");
        assert_eq!(summary.worst_performer, "DOWN");
    }

    #[test]
    fn analyze_strategy_empty_has_no_summary() {
        let report = analyze_strategy::<&str>(&[], &[]);
        assert!(report.stocks.is_empty());
        assert!(report.summary.is_none());
    }

    #[test]
    fn summary_ties_keep_first() {
        let a = series_with("A", &[100.0; 35]);
        let b = series_with("B", &[100.0; 35]);
        let report = analyze_strategy(&[a, b], &["A", "B"]);
        let summary = report.summary.unwrap();
        assert_eq!(summary.best_performer, "A");
        assert_eq!(summary.worst_performer, "A");
    }

    #[test]
    fn compare_strategies_picks_winner() {
        let mut up = vec![100.0; 30];
        up.push(110.0);
        let flat = vec![100.0; 31];
        let series = vec![series_with("UP", &up), series_with("FLAT", &flat)];

        let cmp = compare_strategies(&series, &["UP"], &["FLAT"], 30);
        assert_relative_eq!(cmp.portfolio_a.return_pct, 10.0, epsilon = 1e-9);
        assert_eq!(cmp.portfolio_a.volatility, 0.0);
        assert_eq!(cmp.portfolio_a.sharpe, 0.0);
        assert_eq!(cmp.portfolio_a.stocks_count, 1);
        assert_eq!(cmp.winner, Winner::A);
        assert_relative_eq!(cmp.return_diff, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn compare_strategies_tie_goes_to_b() {
        let series = vec![series_with("X", &[100.0; 31])];
        let cmp = compare_strategies(&series, &["X"], &["X"], 30);
        assert_eq!(cmp.winner, Winner::B);
        assert_eq!(cmp.return_diff, 0.0);
    }

    #[test]
    fn compare_strategies_ignores_short_series() {
        let series = vec![series_with("SHORT", &[100.0; 10])];
        let cmp = compare_strategies(&series, &["SHORT"], &["NONE"], 30);
        assert_eq!(cmp.portfolio_a, PortfolioPerformance::default());
        assert_eq!(cmp.portfolio_b, PortfolioPerformance::default());
    }

    #[test]
    fn compare_strategies_dispersion() {
        let mut a = vec![100.0; 30];
        a.push(110.0);
        let mut b = vec![100.0; 30];
        b.push(90.0);
        let series = vec![series_with("A", &a), series_with("B", &b)];
        let cmp = compare_strategies(&series, &["A", "B"], &["A"], 30);

        // returns +10% and -10%: mean 0, population std 0.1
        assert_relative_eq!(cmp.portfolio_a.return_pct, 0.0, epsilon = 1e-9);
        assert_relative_eq!(
            cmp.portfolio_a.volatility,
            0.1 * 252.0_f64.sqrt() * 100.0,
            epsilon = 1e-9
        );
        assert_eq!(cmp.winner, Winner::B);
    }

    #[test]
    fn optimize_weights_needs_two_usable() {
        let series = vec![
            series_with("A", &rising(40)),
            series_with("SHORT", &rising(10)),
        ];
        assert_eq!(
            optimize_weights(&series, &["A", "SHORT"], 0.03),
            WeightOptimization::default()
        );
        assert_eq!(
            optimize_weights(&series, &["A"], 0.03),
            WeightOptimization::default()
        );
    }

    #[test]
    fn optimize_weights_equal_split() {
        let a: Vec<f64> = (0..40)
            .map(|i| if i % 2 == 0 { 100.0 } else { 102.0 })
            .collect();
        let b: Vec<f64> = (0..50)
            .map(|i| if i % 2 == 0 { 50.0 } else { 49.0 })
            .collect();
        let series = vec![series_with("A", &a), series_with("B", &b)];

        let opt = optimize_weights(&series, &["A", "B"], 0.03);
        assert_eq!(opt.weights.len(), 2);
        assert_eq!(opt.weights["A"], 0.5);
        assert_eq!(opt.weights["B"], 0.5);
        assert!(opt.expected_volatility > 0.0);

        let expected_sharpe =
            (opt.expected_return / 100.0 - 0.03) / (opt.expected_volatility / 100.0);
        assert_relative_eq!(opt.sharpe_ratio, expected_sharpe, epsilon = 1e-9);
    }

    #[test]
    fn optimize_weights_constant_prices_zero_sharpe() {
        let series = vec![
            series_with("A", &[10.0; 30]),
            series_with("B", &[20.0; 30]),
        ];
        let opt = optimize_weights(&series, &["A", "B"], 0.03);
        assert_eq!(opt.expected_volatility, 0.0);
        assert_eq!(opt.sharpe_ratio, 0.0);
    }
}
