//! End-to-end tests over the domain pipelines with a mock data port.
//!
//! Tests cover:
//! - Batch scoring with fundamentals, news and short histories
//! - Factor ranking and selection
//! - Backtests: empty portfolio, doubling prices, flat prices, partial data
//! - Risk statistics on backtest returns and per-code returns
//! - Universe validation with failing and short codes

mod common;

use approx::assert_relative_eq;
use common::*;
use proptest::prelude::*;
use quantrank::domain::analyzer::{Signal, analyze_strategy, optimize_weights};
use quantrank::domain::backtest::{
    BacktestConfig, BacktestEngine, RebalanceMode, compare_strategies,
};
use quantrank::domain::error::QuantrankError;
use quantrank::domain::factor_model::{FactorModel, FactorModelConfig, normalize_factor};
use quantrank::domain::financial::FinancialSnapshot;
use quantrank::domain::portfolio::Portfolio;
use quantrank::domain::risk::{RiskLevel, calculate_portfolio_risk, risk_report};
use quantrank::domain::scorer::{ScorerConfig, StockScorer, top_codes};
use quantrank::domain::stats::pct_change;
use quantrank::domain::universe::{SkipReason, validate_universe};
use quantrank::ports::data_port::DataPort;
use std::collections::HashMap;

fn codes(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

mod scoring {
    use super::*;

    #[test]
    fn cheap_profitable_stock_tops_the_ranking() {
        let port = MockDataPort::new()
            .with_bars("CHEAP", generate_bars("2024-01-01", 60, 10.0, 0.1))
            .with_bars("PRICEY", generate_bars("2024-01-01", 60, 10.0, 0.1))
            .with_financials(
                "CHEAP",
                FinancialSnapshot {
                    pe: Some(8.0),
                    pb: Some(0.9),
                    roe: Some(28.0),
                    ..Default::default()
                },
            )
            .with_financials(
                "PRICEY",
                FinancialSnapshot {
                    pe: Some(80.0),
                    pb: Some(9.0),
                    roe: Some(3.0),
                    ..Default::default()
                },
            );

        let wanted = codes(&["PRICEY", "CHEAP"]);
        let series = port.fetch_prices(&wanted, None, None).unwrap();
        let financials = port.fetch_financials(&wanted).unwrap();
        let scores = StockScorer::new(ScorerConfig::default()).score_stocks(
            &series,
            &financials,
            &HashMap::new(),
        );

        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].code, "CHEAP");
        assert_eq!(scores[0].rank, 1);
        assert_eq!(scores[0].pe_score, 100.0);
        assert_eq!(scores[0].pb_score, 100.0);
        assert_eq!(scores[0].roe_score, 100.0);
        assert_eq!(scores[1].pe_score, 20.0);
        assert_eq!(scores[1].roe_score, 20.0);
        assert_eq!(top_codes(&scores, 1), vec!["CHEAP"]);
    }

    #[test]
    fn short_history_scores_neutral_on_price_factors() {
        let port =
            MockDataPort::new().with_bars("NEW", generate_bars("2024-01-01", 10, 10.0, 1.0));
        let series = port.fetch_prices(&codes(&["NEW"]), None, None).unwrap();
        let scores = StockScorer::new(ScorerConfig::default()).score_stocks(
            &series,
            &HashMap::new(),
            &HashMap::new(),
        );
        let s = &scores[0];
        assert_eq!(s.momentum_score, 50.0);
        assert_eq!(s.volatility_score, 50.0);
        assert_eq!(s.liquidity_score, 50.0);
        assert_eq!(s.pe_score, 50.0);
    }

    #[test]
    fn news_moves_sentiment() {
        let port = MockDataPort::new()
            .with_bars("A", generate_bars("2024-01-01", 30, 10.0, 0.0))
            .with_bars("B", generate_bars("2024-01-01", 30, 10.0, 0.0))
            .with_news("A", "Upgrade", 1.0)
            .with_news("B", "Downgrade", -1.0);
        let wanted = codes(&["A", "B"]);
        let series = port.fetch_prices(&wanted, None, None).unwrap();
        let news = port.fetch_news(&wanted).unwrap();
        let scores = StockScorer::new(ScorerConfig::default()).score_stocks(
            &series,
            &HashMap::new(),
            &news,
        );
        let a = scores.iter().find(|s| s.code == "A").unwrap();
        let b = scores.iter().find(|s| s.code == "B").unwrap();
        assert_eq!(a.sentiment_score, 100.0);
        assert_eq!(b.sentiment_score, 0.0);
        assert!(a.total_score > b.total_score);
    }

    #[test]
    fn non_finite_series_is_left_out() {
        let mut bad = generate_bars("2024-01-01", 30, 10.0, 0.0);
        bad[5].close = f64::NAN;
        let series = vec![
            make_series("BAD", bad),
            make_series("GOOD", generate_bars("2024-01-01", 30, 10.0, 0.0)),
        ];
        let scores = StockScorer::new(ScorerConfig::default()).score_stocks(
            &series,
            &HashMap::new(),
            &HashMap::new(),
        );
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].code, "GOOD");
        assert_eq!(scores[0].rank, 1);
    }
}

mod factor_ranking {
    use super::*;

    #[test]
    fn ranks_are_dense_and_ordered() {
        let series = vec![
            make_series("UP", generate_bars("2024-01-01", 60, 10.0, 0.5)),
            make_series("FLAT", generate_bars("2024-01-01", 60, 10.0, 0.0)),
            make_series("DOWN", generate_bars("2024-01-01", 60, 40.0, -0.5)),
        ];
        let model = FactorModel::new(FactorModelConfig::default());
        let rows = model.rank(&series, &HashMap::new());

        let ranks: Vec<usize> = rows.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        for pair in rows.windows(2) {
            assert!(pair[0].composite_score >= pair[1].composite_score);
        }
        for row in &rows {
            for v in [
                row.normalized.value,
                row.normalized.quality,
                row.normalized.momentum,
                row.normalized.volatility,
                row.normalized.size,
                row.normalized.liquidity,
            ] {
                assert!((0.0..=100.0).contains(&v));
            }
        }
    }

    #[test]
    fn selection_respects_top_n() {
        let series: Vec<PriceSeries> = (0..5)
            .map(|i| {
                make_series(
                    &format!("S{i}"),
                    generate_bars("2024-01-01", 60, 10.0, i as f64 * 0.1),
                )
            })
            .collect();
        let model = FactorModel::new(FactorModelConfig {
            top_n: 2,
            min_score: 0.0,
            ..Default::default()
        });
        let rows = model.rank(&series, &HashMap::new());
        let selected = model.select(&rows);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0], rows[0].code);
    }

    proptest! {
        #[test]
        fn normalized_values_stay_in_range(values in proptest::collection::vec(-1e6f64..1e6, 1..40)) {
            let normalized = normalize_factor(&values);
            prop_assert_eq!(normalized.len(), values.len());
            for v in normalized {
                prop_assert!((0.0..=100.0).contains(&v));
            }
        }
    }
}

mod analysis {
    use super::*;

    #[test]
    fn uptrend_is_not_a_sell() {
        let series = vec![
            make_series("UP", generate_bars("2024-01-01", 60, 10.0, 0.2)),
            make_series("DOWN", generate_bars("2024-01-01", 60, 30.0, -0.2)),
        ];
        let report = analyze_strategy(&series, &codes(&["UP", "DOWN", "MISSING"]));
        assert_eq!(report.total_stocks, 3);
        assert_eq!(report.stocks.len(), 2);
        assert_ne!(report.stocks[0].signal, Signal::Sell);
        let summary = report.summary.unwrap();
        assert_eq!(summary.best_performer, "UP");
        assert_eq!(summary.worst_performer, "DOWN");
    }

    #[test]
    fn equal_weight_optimization() {
        let series = vec![
            make_series("A", generate_bars("2024-01-01", 40, 10.0, 0.1)),
            make_series("B", generate_bars("2024-01-01", 40, 20.0, 0.1)),
        ];
        let opt = optimize_weights(&series, &codes(&["A", "B"]), 0.03);
        assert_eq!(opt.weights.len(), 2);
        assert_relative_eq!(opt.weights["A"], 0.5);
        assert!(opt.expected_return > 0.0);
    }
}

mod backtesting {
    use super::*;

    fn engine() -> BacktestEngine {
        BacktestEngine::new(BacktestConfig::default())
    }

    #[test]
    fn empty_inputs_give_zero_result() {
        let result = engine().run_backtest(&[], &Portfolio::new(), None, None);
        assert_eq!(result.metrics.total_return, 0.0);
        assert_eq!(result.metrics.max_drawdown, 0.0);
        assert!(result.values.is_empty());
    }

    #[test]
    fn doubling_portfolio() {
        let series = vec![
            make_series("A", bars_from_closes("2024-03-01", &[10.0, 20.0], 1_000.0)),
            make_series("B", bars_from_closes("2024-03-01", &[4.0, 8.0], 1_000.0)),
        ];
        let portfolio = Portfolio::from_weights([("A", 0.5), ("B", 0.5)]);
        let result = engine().run_backtest(
            &series,
            &portfolio,
            Some(date(2024, 3, 1)),
            Some(date(2024, 3, 2)),
        );
        assert_relative_eq!(result.metrics.total_return, 1.0, epsilon = 1e-12);
        assert_eq!(result.trading_days, 2);
    }

    #[test]
    fn flat_year() {
        let series = vec![make_series(
            "A",
            bars_from_closes("2023-01-01", &[100.0; 252], 1_000.0),
        )];
        let portfolio = Portfolio::from_weights([("A", 1.0)]);
        let result = engine().run_backtest(&series, &portfolio, None, Some(date(2024, 6, 1)));
        assert_eq!(result.trading_days, 252);
        assert_eq!(result.metrics.total_return, 0.0);
        assert_eq!(result.metrics.volatility, 0.0);
        assert_eq!(result.metrics.sharpe_ratio, 0.0);
        assert_eq!(result.metrics.sortino_ratio, 0.0);
        assert_eq!(result.metrics.max_drawdown, 0.0);
    }

    #[test]
    fn modes_agree_on_flat_prices_and_compare() {
        let series = vec![make_series(
            "A",
            bars_from_closes("2024-01-01", &[50.0; 30], 1_000.0),
        )];
        let portfolio = Portfolio::from_weights([("A", 1.0)]);
        let hold = engine().run_backtest(&series, &portfolio, None, Some(date(2024, 12, 31)));
        let fixed = BacktestEngine::new(BacktestConfig {
            rebalance: RebalanceMode::FixedExposure,
            ..Default::default()
        })
        .run_backtest(&series, &portfolio, None, Some(date(2024, 12, 31)));

        assert_relative_eq!(hold.final_value, fixed.final_value, epsilon = 1e-6);
        let rows = compare_strategies(&[hold.with_label("hold"), fixed]);
        assert_eq!(rows[0].strategy, "hold");
        assert_eq!(rows[1].strategy, "Strategy 2");
    }

    proptest! {
        #[test]
        fn drawdown_non_negative_and_deterministic(
            closes in proptest::collection::vec(1.0f64..500.0, 2..80)
        ) {
            let series = vec![make_series("P", bars_from_closes("2024-01-01", &closes, 1_000.0))];
            let portfolio = Portfolio::from_weights([("P", 1.0)]);
            let end = Some(date(2030, 1, 1));
            let a = engine().run_backtest(&series, &portfolio, None, end);
            let b = engine().run_backtest(&series, &portfolio, None, end);
            prop_assert!(a.metrics.max_drawdown >= 0.0);
            prop_assert!(a.metrics.max_drawdown <= 1.0);
            prop_assert_eq!(a.metrics.max_drawdown, b.metrics.max_drawdown);
            prop_assert_eq!(a.values.len(), closes.len());
        }
    }
}

mod risk {
    use super::*;

    #[test]
    fn risk_report_on_backtest_returns() {
        let closes: Vec<f64> = (0..120)
            .map(|i| 100.0 * (1.0 + 0.05 * ((i as f64) * 0.7).sin()))
            .collect();
        let series = vec![make_series("A", bars_from_closes("2024-01-01", &closes, 1_000.0))];
        let portfolio = Portfolio::from_weights([("A", 1.0)]);
        let result = BacktestEngine::new(BacktestConfig::default()).run_backtest(
            &series,
            &portfolio,
            None,
            Some(date(2030, 1, 1)),
        );
        let returns: Vec<f64> = result.values.iter().skip(1).map(|p| p.daily_return).collect();
        let asset = pct_change(&closes);

        let report = risk_report(&returns, Some(&asset));
        assert!(report.metrics.volatility > 0.0);
        assert!(report.metrics.var_95 < 0.0);
        assert!(!report.recommendations.is_empty());
        let bench = report.vs_benchmark.unwrap();
        assert_relative_eq!(bench.correlation, 1.0, epsilon = 1e-9);
        assert_relative_eq!(bench.beta, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn calm_portfolio_is_low_risk() {
        let returns: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 0.001 } else { -0.0005 }).collect();
        let report = risk_report(&returns, None);
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert_eq!(report.recommendations.len(), 1);
    }

    #[test]
    fn portfolio_risk_from_per_code_returns() {
        let mut by_code = HashMap::new();
        by_code.insert("A".to_string(), vec![0.01, -0.02, 0.015, 0.003]);
        by_code.insert("B".to_string(), vec![0.02, -0.01, 0.005, -0.004]);
        let portfolio = Portfolio::from_weights([("A", 0.5), ("B", 0.5)]);
        let record = calculate_portfolio_risk(&by_code, &portfolio);
        assert!(record.volatility > 0.0);
        assert!(record.beta.is_none());
    }
}

mod universe_validation {
    use super::*;

    #[test]
    fn failing_and_short_codes_are_skipped() {
        let port = MockDataPort::new()
            .with_bars("GOOD", generate_bars("2024-01-01", 30, 10.0, 0.1))
            .with_bars("SHORT", generate_bars("2024-01-01", 1, 10.0, 0.0))
            .with_error("BROKEN", "disk on fire");

        let result = validate_universe(
            &port,
            &codes(&["GOOD", "SHORT", "BROKEN", "MISSING"]),
            None,
            None,
            2,
        )
        .unwrap();

        assert_eq!(result.codes(), vec!["GOOD"]);
        assert_eq!(result.skipped.len(), 3);
        assert_eq!(
            result.skipped[0].reason,
            SkipReason::InsufficientBars { bars: 1 }
        );
        assert_eq!(result.skipped[1].reason, SkipReason::NoData);
    }

    #[test]
    fn nothing_left_is_no_data() {
        let port = MockDataPort::new();
        let result = validate_universe(&port, &codes(&["X"]), None, None, 2);
        assert!(matches!(result, Err(QuantrankError::NoData { .. })));
    }
}
