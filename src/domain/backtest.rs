//! Fixed-weight portfolio simulation over a merged trading calendar.
//!
//! The engine values a weighted basket once per calendar date, then derives
//! return-based metrics from the resulting value curve.

use crate::domain::execution::{EntryResult, ExecutionConfig, buy_with_budget};
use crate::domain::metrics::{PerformanceMetrics, ValuePoint, daily_returns};
use crate::domain::portfolio::Portfolio;
use crate::domain::price::{PriceSeries, build_trading_calendar};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 1_000_000.0;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.03;
/// Trading dates in the window when no start date is given.
pub const DEFAULT_LOOKBACK_DAYS: usize = 252;

/// How holdings are valued across the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceMode {
    /// Buy each holding once at its first price, then let it drift.
    #[default]
    BuyAndHold,
    /// Re-target every holding to `initial_capital * weight` on each date.
    FixedExposure,
}

impl FromStr for RebalanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy_and_hold" => Ok(RebalanceMode::BuyAndHold),
            "fixed_exposure" => Ok(RebalanceMode::FixedExposure),
            other => Err(format!(
                "unknown rebalance mode '{other}' (expected buy_and_hold or fixed_exposure)"
            )),
        }
    }
}

impl fmt::Display for RebalanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebalanceMode::BuyAndHold => write!(f, "buy_and_hold"),
            RebalanceMode::FixedExposure => write!(f, "fixed_exposure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Annual rate as a fraction.
    pub risk_free_rate: f64,
    pub execution: ExecutionConfig,
    pub rebalance: RebalanceMode,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            execution: ExecutionConfig::default(),
            rebalance: RebalanceMode::default(),
            start_date: None,
            end_date: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub initial_capital: f64,
    pub final_value: f64,
    #[serde(flatten)]
    pub metrics: PerformanceMetrics,
    pub trading_days: usize,
    pub values: Vec<ValuePoint>,
}

impl BacktestResult {
    fn empty(initial_capital: f64) -> Self {
        Self {
            label: None,
            start_date: None,
            end_date: None,
            initial_capital,
            final_value: initial_capital,
            metrics: PerformanceMetrics::default(),
            trading_days: 0,
            values: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// One line of a strategy comparison table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub strategy: String,
    pub total_return: f64,
    pub annual_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub volatility: f64,
    pub win_rate: f64,
}

pub fn compare_strategies(results: &[BacktestResult]) -> Vec<ComparisonRow> {
    results
        .iter()
        .enumerate()
        .map(|(i, r)| ComparisonRow {
            strategy: r
                .label
                .clone()
                .unwrap_or_else(|| format!("Strategy {}", i + 1)),
            total_return: r.metrics.total_return,
            annual_return: r.metrics.annual_return,
            max_drawdown: r.metrics.max_drawdown,
            sharpe_ratio: r.metrics.sharpe_ratio,
            sortino_ratio: r.metrics.sortino_ratio,
            calmar_ratio: r.metrics.calmar_ratio,
            volatility: r.metrics.volatility,
            win_rate: r.metrics.win_rate,
        })
        .collect()
}

/// Per-holding state while walking the calendar.
enum Holding<'a> {
    Waiting { series: &'a PriceSeries, budget: f64 },
    Held { series: &'a PriceSeries, quantity: f64 },
    /// Entry was impossible; the allocation stays in cash.
    Cash,
}

pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Simulate `portfolio` over `series`. Explicit dates override the
    /// configured window.
    pub fn run_backtest(
        &self,
        series: &[PriceSeries],
        portfolio: &Portfolio,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> BacktestResult {
        let initial_capital = self.config.initial_capital;
        if portfolio.is_empty() {
            return BacktestResult::empty(initial_capital);
        }

        let by_code: HashMap<&str, &PriceSeries> =
            series.iter().map(|s| (s.code(), s)).collect();
        for code in portfolio.codes() {
            if !by_code.contains_key(code) {
                tracing::warn!(code, "no price series for holding; allocation kept as cash");
            }
        }

        let end = end
            .or(self.config.end_date)
            .unwrap_or_else(|| Local::now().date_naive());
        let start = start.or(self.config.start_date);
        let calendar = window(&build_trading_calendar(series), start, end);
        let (Some(&first), Some(&last)) = (calendar.first(), calendar.last()) else {
            tracing::warn!(%end, "no trading dates in backtest window");
            return BacktestResult::empty(initial_capital);
        };

        tracing::debug!(
            holdings = portfolio.len(),
            dates = calendar.len(),
            mode = %self.config.rebalance,
            "running backtest"
        );

        let curve = match self.config.rebalance {
            RebalanceMode::BuyAndHold => self.buy_and_hold(&calendar, &by_code, portfolio),
            RebalanceMode::FixedExposure => self.fixed_exposure(&calendar, &by_code, portfolio),
        };

        let returns = daily_returns(&curve);
        let values: Vec<ValuePoint> = calendar
            .iter()
            .zip(curve.iter().zip(returns))
            .map(|(&date, (&value, daily_return))| ValuePoint {
                date,
                value,
                daily_return,
            })
            .collect();

        let metrics =
            PerformanceMetrics::compute(&values, initial_capital, self.config.risk_free_rate);
        let final_value = values.last().map_or(initial_capital, |p| p.value);

        BacktestResult {
            label: None,
            start_date: Some(first),
            end_date: Some(last),
            initial_capital,
            final_value,
            metrics,
            trading_days: values.len(),
            values,
        }
    }

    fn buy_and_hold(
        &self,
        calendar: &[NaiveDate],
        by_code: &HashMap<&str, &PriceSeries>,
        portfolio: &Portfolio,
    ) -> Vec<f64> {
        let initial_capital = self.config.initial_capital;
        let mut cash = initial_capital;
        let mut holdings: Vec<Holding> = portfolio
            .iter()
            .map(|(code, weight)| match by_code.get(code) {
                Some(&series) => Holding::Waiting {
                    series,
                    budget: initial_capital * weight,
                },
                None => Holding::Cash,
            })
            .collect();

        let mut curve = Vec::with_capacity(calendar.len());
        for &date in calendar {
            let mut market_value = 0.0;
            for holding in holdings.iter_mut() {
                if let Holding::Waiting { series, budget } = *holding {
                    let Some(price) = series.close_on_or_before(date) else {
                        continue;
                    };
                    *holding = match buy_with_budget(budget, price, &self.config.execution) {
                        EntryResult::Entered {
                            quantity,
                            cost,
                            commission,
                            ..
                        } => {
                            cash -= cost + commission;
                            Holding::Held { series, quantity }
                        }
                        EntryResult::InsufficientCapital => {
                            tracing::warn!(code = series.code(), %date, "entry failed; allocation kept as cash");
                            Holding::Cash
                        }
                    };
                }
                if let Holding::Held { series, quantity } = *holding {
                    if let Some(price) = series.close_on_or_before(date) {
                        market_value += quantity * price;
                    }
                }
            }
            curve.push(cash + market_value);
        }
        curve
    }

    fn fixed_exposure(
        &self,
        calendar: &[NaiveDate],
        by_code: &HashMap<&str, &PriceSeries>,
        portfolio: &Portfolio,
    ) -> Vec<f64> {
        let initial_capital = self.config.initial_capital;
        calendar
            .iter()
            .map(|&date| {
                portfolio
                    .iter()
                    .filter_map(|(code, weight)| {
                        let price = by_code.get(code)?.close_on_or_before(date)?;
                        if price > 0.0 {
                            let shares = initial_capital * weight / price;
                            Some(shares * price)
                        } else {
                            None
                        }
                    })
                    .sum()
            })
            .collect()
    }
}

/// Trading dates in `[start, end]`; without a start, the trailing
/// `DEFAULT_LOOKBACK_DAYS` dates on or before `end`.
fn window(calendar: &[NaiveDate], start: Option<NaiveDate>, end: NaiveDate) -> Vec<NaiveDate> {
    let upto: Vec<NaiveDate> = calendar.iter().copied().filter(|d| *d <= end).collect();
    match start {
        Some(start) => upto.into_iter().filter(|d| *d >= start).collect(),
        None => {
            let skip = upto.len().saturating_sub(DEFAULT_LOOKBACK_DAYS);
            upto[skip..].to_vec()
        }
    }
}
