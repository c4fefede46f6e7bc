//! CLI definition and dispatch.
//!
//! Every command loads an INI config, resolves the data directory and the
//! instrument universe, runs one pipeline and writes JSON to stdout. Progress
//! and summaries go to stderr.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::analyzer::{
    StrategyComparison, StrategyReport, WeightOptimization, analyze_strategy,
    compare_strategies as compare_code_lists, optimize_weights,
};
use crate::domain::backtest::{
    BacktestConfig, BacktestEngine, BacktestResult, ComparisonRow, DEFAULT_RISK_FREE_RATE,
    compare_strategies,
};
use crate::domain::config_validation::{
    read_date, read_double, read_rebalance, read_usize, validate_backtest_config,
    validate_config, validate_factor_config, validate_scoring_config, validate_universe_config,
};
use crate::domain::error::QuantrankError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::factor_model::{Factor, FactorModel, FactorModelConfig, FactorRow, FactorWeights};
use crate::domain::financial::{FinancialSnapshot, NewsItem};
use crate::domain::indicator_helpers::{TechnicalSnapshot, technical_indicator_set};
use crate::domain::portfolio::Portfolio;
use crate::domain::price::PriceSeries;
use crate::domain::risk::{
    RiskMetricsRecord, RiskReport, calculate_all_metrics, calculate_portfolio_risk, risk_report,
};
use crate::domain::scorer::{
    FactorScoreSet, Recommendation, ScoreFactor, ScorerConfig, ScoringWeights, StockScorer,
    recommend, top_codes,
};
use crate::domain::stats::pct_change;
use crate::domain::universe::{MIN_PRICE_BARS, parse_codes, parse_weights, validate_universe};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

const DEFAULT_COMPARE_DAYS: usize = 20;

#[derive(Parser, Debug)]
#[command(name = "quantrank", about = "Stock scoring, factor ranking and portfolio backtesting")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CommonArgs {
    /// INI configuration file
    #[arg(short, long)]
    pub config: PathBuf,
    /// Directory of price CSVs; overrides [data] dir
    #[arg(short, long)]
    pub data: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score and rank the universe on fundamentals, trend and sentiment
    Score {
        #[command(flatten)]
        common: CommonArgs,
        /// Number of top codes to list
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Rank the universe on the six-factor composite
    Factors {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Technical analysis of the universe
    Analyze {
        #[command(flatten)]
        common: CommonArgs,
        /// Compare the universe against this comma-separated code list
        #[arg(long)]
        compare: Option<String>,
        /// Trailing window for --compare
        #[arg(long, default_value_t = DEFAULT_COMPARE_DAYS)]
        days: usize,
        /// Include the equal-weight allocation
        #[arg(long)]
        optimize: bool,
        /// Include the latest indicator values per code
        #[arg(long)]
        indicators: bool,
    },
    /// Backtest the configured portfolio
    Backtest {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Also run an equal-weight portfolio and print a comparison
        #[arg(long)]
        compare_equal: bool,
    },
    /// Risk report for the configured portfolio
    Risk {
        #[command(flatten)]
        common: CommonArgs,
        /// Benchmark code for beta and correlation
        #[arg(long)]
        benchmark: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Score { common, top } => run_score(&common, top),
        Command::Factors { common } => run_factors(&common),
        Command::Analyze {
            common,
            compare,
            days,
            optimize,
            indicators,
        } => run_analyze(
            &common,
            &AnalyzeOptions {
                compare: compare.as_deref(),
                days,
                optimize,
                indicators,
            },
        ),
        Command::Backtest {
            common,
            start,
            end,
            compare_equal,
        } => run_backtest(&common, start, end, compare_equal),
        Command::Risk { common, benchmark } => run_risk(&common, benchmark.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, QuantrankError> {
    tracing::info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), QuantrankError> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    println!("{json}");
    Ok(())
}

pub fn build_scorer_config(config: &dyn ConfigPort) -> Result<ScorerConfig, QuantrankError> {
    validate_scoring_config(config)?;
    let defaults = ScorerConfig::default();
    let mut weights: ScoringWeights = defaults.weights;
    weights.fallback = read_double(config, "scoring", "fallback_weight", weights.fallback)?;
    for factor in ScoreFactor::ALL {
        if config.get_string("scoring", factor.key()).is_some() {
            weights.set(factor, read_double(config, "scoring", factor.key(), 0.0)?);
        }
    }
    Ok(ScorerConfig {
        weights,
        liquidity_min_bars: read_usize(
            config,
            "scoring",
            "liquidity_min_bars",
            defaults.liquidity_min_bars,
        )?,
    })
}

pub fn build_factor_config(config: &dyn ConfigPort) -> Result<FactorModelConfig, QuantrankError> {
    validate_factor_config(config)?;
    let defaults = FactorModelConfig::default();
    let mut weights = FactorWeights::default();
    for factor in Factor::ALL {
        if config.get_string("factors", factor.key()).is_some() {
            weights.set(factor, read_double(config, "factors", factor.key(), 0.0)?);
        }
    }
    Ok(FactorModelConfig {
        weights,
        top_n: read_usize(config, "factors", "top_n", defaults.top_n)?,
        min_score: read_double(config, "factors", "min_score", defaults.min_score)?,
    })
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, QuantrankError> {
    validate_backtest_config(config)?;
    let defaults = BacktestConfig::default();
    Ok(BacktestConfig {
        initial_capital: read_double(
            config,
            "backtest",
            "initial_capital",
            defaults.initial_capital,
        )?,
        risk_free_rate: read_double(config, "backtest", "risk_free_rate", defaults.risk_free_rate)?,
        execution: ExecutionConfig {
            commission_per_trade: read_double(config, "backtest", "commission_per_trade", 0.0)?,
            commission_pct: read_double(config, "backtest", "commission_pct", 0.0)?,
            slippage_pct: read_double(config, "backtest", "slippage_pct", 0.0)?,
        },
        rebalance: read_rebalance(config)?,
        start_date: read_date(config, "backtest", "start_date")?,
        end_date: read_date(config, "backtest", "end_date")?,
    })
}

/// `--data` wins over `[data] dir`; one of them is required.
pub fn resolve_data_dir(
    data_override: Option<&Path>,
    config: &dyn ConfigPort,
) -> Result<PathBuf, QuantrankError> {
    if let Some(dir) = data_override {
        return Ok(dir.to_path_buf());
    }
    config
        .get_string("data", "dir")
        .map(PathBuf::from)
        .ok_or_else(|| QuantrankError::ConfigMissing {
            section: "data".into(),
            key: "dir".into(),
        })
}

/// `[universe] codes`, or every code the data source serves.
pub fn resolve_codes(
    config: &dyn ConfigPort,
    data_port: &dyn DataPort,
) -> Result<Vec<String>, QuantrankError> {
    let codes = match config.get_string("universe", "codes") {
        Some(raw) => parse_codes(&raw)?,
        None => data_port.list_codes()?,
    };
    if codes.is_empty() {
        return Err(QuantrankError::NoData {
            code: "universe".into(),
        });
    }
    Ok(codes)
}

/// Portfolio over `codes` using `[universe] weights` when given.
pub fn build_portfolio(
    config: &dyn ConfigPort,
    codes: &[String],
) -> Result<Portfolio, QuantrankError> {
    validate_universe_config(config)?;
    let weights = config.get_string("universe", "weights");
    Ok(parse_weights(codes, weights.as_deref())?)
}

fn fetch_optional<T: Default>(
    what: &str,
    fetch: impl FnOnce() -> Result<T, QuantrankError>,
) -> Result<T, QuantrankError> {
    match fetch() {
        Ok(v) => Ok(v),
        Err(QuantrankError::NoData { .. }) => {
            tracing::warn!(source = what, "no data; continuing without it");
            Ok(T::default())
        }
        Err(e) => Err(e),
    }
}

struct Session {
    config: FileConfigAdapter,
    data: CsvAdapter,
}

fn open_session(common: &CommonArgs) -> Result<Session, QuantrankError> {
    let config = load_config(&common.config)?;
    let dir = resolve_data_dir(common.data.as_deref(), &config)?;
    tracing::info!(dir = %dir.display(), "using data directory");
    Ok(Session {
        config,
        data: CsvAdapter::new(dir),
    })
}

#[derive(Debug, Serialize)]
pub struct ScoredCode {
    #[serde(flatten)]
    pub scores: FactorScoreSet,
    pub recommendation: Recommendation,
}

#[derive(Debug, Serialize)]
pub struct ScoreOutput {
    pub scores: Vec<ScoredCode>,
    pub top: Vec<String>,
}

pub fn score_pipeline(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
    top: usize,
) -> Result<ScoreOutput, QuantrankError> {
    let scorer = StockScorer::new(build_scorer_config(config)?);
    let codes = resolve_codes(config, data_port)?;
    let series = data_port.fetch_prices(&codes, None, None)?;
    let financials: HashMap<String, FinancialSnapshot> =
        fetch_optional("financials", || data_port.fetch_financials(&codes))?;
    let news: HashMap<String, Vec<NewsItem>> =
        fetch_optional("news", || data_port.fetch_news(&codes))?;

    tracing::info!(codes = series.len(), "scoring");
    let scores = scorer.score_stocks(&series, &financials, &news);
    let top = top_codes(&scores, top);
    Ok(ScoreOutput {
        scores: scores
            .into_iter()
            .map(|s| ScoredCode {
                recommendation: recommend(s.total_score),
                scores: s,
            })
            .collect(),
        top,
    })
}

fn run_score(common: &CommonArgs, top: usize) -> Result<(), QuantrankError> {
    let session = open_session(common)?;
    let output = score_pipeline(&session.data, &session.config, top)?;

    eprintln!("\n=== Scores ===");
    for s in &output.scores {
        eprintln!(
            "  #{:<3} {:<10} {:>6.1}  {}",
            s.scores.rank, s.scores.code, s.scores.total_score, s.recommendation
        );
    }
    print_json(&output)
}

#[derive(Debug, Serialize)]
pub struct FactorOutput {
    pub rows: Vec<FactorRow>,
    pub selected: Vec<String>,
}

pub fn factors_pipeline(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
) -> Result<FactorOutput, QuantrankError> {
    let model = FactorModel::new(build_factor_config(config)?);
    let codes = resolve_codes(config, data_port)?;
    let series = data_port.fetch_prices(&codes, None, None)?;
    let financials = fetch_optional("financials", || data_port.fetch_financials(&codes))?;

    let rows = model.rank(&series, &financials);
    let selected = model.select(&rows);
    Ok(FactorOutput { rows, selected })
}

fn run_factors(common: &CommonArgs) -> Result<(), QuantrankError> {
    let session = open_session(common)?;
    let output = factors_pipeline(&session.data, &session.config)?;

    eprintln!("\n=== Factor Ranking ===");
    for row in &output.rows {
        eprintln!(
            "  #{:<3} {:<10} {:>6.1}",
            row.rank, row.code, row.composite_score
        );
    }
    eprintln!("Selected: {}", output.selected.join(", "));
    print_json(&output)
}

pub struct AnalyzeOptions<'a> {
    pub compare: Option<&'a str>,
    pub days: usize,
    pub optimize: bool,
    pub indicators: bool,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeOutput {
    pub report: StrategyReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<StrategyComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimization: Option<WeightOptimization>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub indicators: Vec<TechnicalSnapshot>,
}

pub fn analyze_pipeline(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
    options: &AnalyzeOptions<'_>,
) -> Result<AnalyzeOutput, QuantrankError> {
    let codes = resolve_codes(config, data_port)?;
    let other = options.compare.map(parse_codes).transpose()?;

    let mut wanted = codes.clone();
    for code in other.iter().flatten() {
        if !wanted.contains(code) {
            wanted.push(code.clone());
        }
    }
    let series = data_port.fetch_prices(&wanted, None, None)?;

    let report = analyze_strategy(&series, &codes);
    let comparison = other
        .as_ref()
        .map(|b| compare_code_lists(&series, &codes, b, options.days));
    let optimization = if options.optimize {
        let rf = read_double(config, "backtest", "risk_free_rate", DEFAULT_RISK_FREE_RATE)?;
        Some(optimize_weights(&series, &codes, rf))
    } else {
        None
    };
    let indicators = if options.indicators {
        series
            .iter()
            .filter(|s| codes.iter().any(|c| c == s.code()))
            .map(technical_indicator_set)
            .collect()
    } else {
        Vec::new()
    };

    Ok(AnalyzeOutput {
        report,
        comparison,
        optimization,
        indicators,
    })
}

fn run_analyze(common: &CommonArgs, options: &AnalyzeOptions<'_>) -> Result<(), QuantrankError> {
    let session = open_session(common)?;
    let output = analyze_pipeline(&session.data, &session.config, options)?;

    eprintln!("\n=== Analysis ({}) ===", output.report.analysis_date);
    for stock in &output.report.stocks {
        eprintln!(
            "  {:<10} 5d {:>7.2}%  20d {:>7.2}%  {:?} ({:.0})",
            stock.code, stock.return_5d, stock.return_20d, stock.signal, stock.signal_score
        );
    }
    if let Some(cmp) = &output.comparison {
        eprintln!(
            "Comparison over {} days: winner {:?} by {:.2}%",
            cmp.period_days, cmp.winner, cmp.return_diff
        );
    }
    print_json(&output)
}

#[derive(Debug, Serialize)]
pub struct BacktestOutput {
    pub results: Vec<BacktestResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub comparison: Vec<ComparisonRow>,
}

pub fn backtest_pipeline(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    compare_equal: bool,
) -> Result<BacktestOutput, QuantrankError> {
    let bt_config = build_backtest_config(config)?;
    let codes = resolve_codes(config, data_port)?;
    let portfolio = build_portfolio(config, &codes)?;
    portfolio.validate()?;

    let validation = validate_universe(data_port, &codes, None, None, MIN_PRICE_BARS)?;
    let engine = BacktestEngine::new(bt_config);

    tracing::info!(
        codes = validation.series.len(),
        skipped = validation.skipped.len(),
        "running backtest"
    );
    let mut results = vec![
        engine
            .run_backtest(&validation.series, &portfolio, start, end)
            .with_label("Configured"),
    ];
    let mut comparison = Vec::new();
    if compare_equal {
        let equal = Portfolio::equal_weight(&validation.codes());
        results.push(
            engine
                .run_backtest(&validation.series, &equal, start, end)
                .with_label("Equal weight"),
        );
        comparison = compare_strategies(&results);
    }

    Ok(BacktestOutput {
        results,
        comparison,
    })
}

fn run_backtest(
    common: &CommonArgs,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    compare_equal: bool,
) -> Result<(), QuantrankError> {
    let session = open_session(common)?;
    let output = backtest_pipeline(&session.data, &session.config, start, end, compare_equal)?;

    for result in &output.results {
        let m = &result.metrics;
        eprintln!(
            "\n=== {} ===",
            result.label.as_deref().unwrap_or("Backtest")
        );
        if let (Some(s), Some(e)) = (result.start_date, result.end_date) {
            eprintln!("Period:           {s} to {e} ({} days)", result.trading_days);
        }
        eprintln!("Final Value:      {:.2}", result.final_value);
        eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
        eprintln!("Annualized:       {:.2}%", m.annual_return * 100.0);
        eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
        eprintln!("Sortino Ratio:    {:.2}", m.sortino_ratio);
        eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
        eprintln!("Win Rate:         {:.1}%", m.win_rate * 100.0);
    }
    print_json(&output)
}

#[derive(Debug, Serialize)]
pub struct RiskOutput {
    pub report: RiskReport,
    pub portfolio_risk: RiskMetricsRecord,
    pub by_code: HashMap<String, RiskMetricsRecord>,
}

pub fn risk_pipeline(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
    benchmark: Option<&str>,
) -> Result<RiskOutput, QuantrankError> {
    let bt_config = build_backtest_config(config)?;
    let codes = resolve_codes(config, data_port)?;
    let portfolio = build_portfolio(config, &codes)?;
    portfolio.validate()?;

    let validation = validate_universe(data_port, &codes, None, None, MIN_PRICE_BARS)?;
    let result = BacktestEngine::new(bt_config).run_backtest(
        &validation.series,
        &portfolio,
        None,
        None,
    );
    let (start, end) = (result.start_date, result.end_date);

    let returns_by_code: HashMap<String, Vec<f64>> = validation
        .series
        .iter()
        .map(|s| (s.code().to_string(), window_returns(s, start, end)))
        .collect();
    let by_code = returns_by_code
        .iter()
        .map(|(code, r)| (code.clone(), calculate_all_metrics(r)))
        .collect();

    // the first valuation point has no prior value
    let portfolio_returns: Vec<f64> = result
        .values
        .iter()
        .skip(1)
        .map(|p| p.daily_return)
        .collect();

    let benchmark_returns = match benchmark {
        Some(code) => {
            let series = data_port.fetch_series(&code.to_uppercase(), start, end)?;
            Some(pct_change(&series.closes()))
        }
        None => None,
    };

    Ok(RiskOutput {
        report: risk_report(&portfolio_returns, benchmark_returns.as_deref()),
        portfolio_risk: calculate_portfolio_risk(&returns_by_code, &portfolio),
        by_code,
    })
}

fn window_returns(series: &PriceSeries, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<f64> {
    let closes: Vec<f64> = series
        .bars()
        .iter()
        .filter(|b| start.is_none_or(|s| b.date >= s) && end.is_none_or(|e| b.date <= e))
        .map(|b| b.close)
        .collect();
    pct_change(&closes)
}

fn run_risk(common: &CommonArgs, benchmark: Option<&str>) -> Result<(), QuantrankError> {
    let session = open_session(common)?;
    let output = risk_pipeline(&session.data, &session.config, benchmark)?;

    let m = &output.report.metrics;
    eprintln!("\n=== Risk Report ({}) ===", output.report.risk_level);
    eprintln!("Volatility:       {:.2}%", m.volatility * 100.0);
    eprintln!("VaR 95%:          {:.2}%", m.var_95 * 100.0);
    eprintln!("CVaR 95%:         {:.2}%", m.cvar_95 * 100.0);
    eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
    for rec in &output.report.recommendations {
        eprintln!("  - {rec}");
    }
    print_json(&output)
}

fn run_validate(config_path: &Path) -> Result<(), QuantrankError> {
    let config = load_config(config_path)?;
    validate_config(&config)?;

    let scorer = build_scorer_config(&config)?;
    let factors = build_factor_config(&config)?;
    let backtest = build_backtest_config(&config)?;

    eprintln!("\nScoring weights:");
    for factor in ScoreFactor::ALL {
        eprintln!("  {:<12} {:.3}", factor.key(), scorer.weights.get(factor));
    }
    eprintln!("  liquidity_min_bars: {}", scorer.liquidity_min_bars);

    eprintln!("\nFactor weights:");
    for factor in Factor::ALL {
        eprintln!("  {:<12} {:.3}", factor.key(), factors.weights.get(factor));
    }
    eprintln!("  top_n: {}, min_score: {}", factors.top_n, factors.min_score);

    eprintln!("\nBacktest:");
    eprintln!("  initial_capital: {:.2}", backtest.initial_capital);
    eprintln!("  rebalance:       {}", backtest.rebalance);
    if let Some(raw) = config.get_string("universe", "codes") {
        let codes = parse_codes(&raw)?;
        let portfolio = build_portfolio(&config, &codes)?;
        portfolio.validate()?;
        eprintln!("\nUniverse: {}", codes.join(", "));
    }

    eprintln!("\nConfiguration is valid.");
    Ok(())
}
