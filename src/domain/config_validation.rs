//! Configuration validation.
//!
//! Every section is optional; present values must parse and fall in range.
//! The typed readers here are shared with the config builders.

use crate::domain::backtest::RebalanceMode;
use crate::domain::error::QuantrankError;
use crate::domain::factor_model::Factor;
use crate::domain::scorer::ScoreFactor;
use crate::domain::universe::{parse_codes, parse_weights};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> QuantrankError {
    QuantrankError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// A float key, or `default` when absent. Present but unparseable is an error.
pub fn read_double(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, QuantrankError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid(section, key, format!("'{raw}' is not a number"))),
    }
}

/// A non-negative integer key, or `default` when absent.
pub fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, QuantrankError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| invalid(section, key, format!("'{raw}' is not a non-negative integer"))),
    }
}

/// An optional `YYYY-MM-DD` date key.
pub fn read_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<NaiveDate>, QuantrankError> {
    config
        .get_string(section, key)
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, DATE_FORMAT)
                .map_err(|_| invalid(section, key, format!("invalid {key} format, expected YYYY-MM-DD")))
        })
        .transpose()
}

pub fn read_rebalance(config: &dyn ConfigPort) -> Result<RebalanceMode, QuantrankError> {
    match config.get_string("backtest", "rebalance") {
        None => Ok(RebalanceMode::default()),
        Some(raw) => raw
            .parse()
            .map_err(|reason: String| invalid("backtest", "rebalance", reason)),
    }
}

fn non_negative(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<(), QuantrankError> {
    let value = read_double(config, section, key, 0.0)?;
    if value < 0.0 {
        return Err(invalid(section, key, format!("{key} must be non-negative")));
    }
    Ok(())
}

/// Validate every section.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), QuantrankError> {
    validate_scoring_config(config)?;
    validate_factor_config(config)?;
    validate_backtest_config(config)?;
    validate_universe_config(config)?;
    Ok(())
}

pub fn validate_scoring_config(config: &dyn ConfigPort) -> Result<(), QuantrankError> {
    for factor in ScoreFactor::ALL {
        non_negative(config, "scoring", factor.key())?;
    }
    non_negative(config, "scoring", "fallback_weight")?;
    if read_usize(config, "scoring", "liquidity_min_bars", 1)? == 0 {
        return Err(invalid(
            "scoring",
            "liquidity_min_bars",
            "liquidity_min_bars must be at least 1",
        ));
    }
    Ok(())
}

pub fn validate_factor_config(config: &dyn ConfigPort) -> Result<(), QuantrankError> {
    for factor in Factor::ALL {
        non_negative(config, "factors", factor.key())?;
    }
    if read_usize(config, "factors", "top_n", 1)? == 0 {
        return Err(invalid("factors", "top_n", "top_n must be at least 1"));
    }
    let min_score = read_double(config, "factors", "min_score", 0.0)?;
    if !(0.0..=100.0).contains(&min_score) {
        return Err(invalid(
            "factors",
            "min_score",
            "min_score must be between 0 and 100",
        ));
    }
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), QuantrankError> {
    validate_initial_capital(config)?;
    validate_costs(config)?;
    validate_risk_free_rate(config)?;
    read_rebalance(config)?;
    validate_dates(config)?;
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), QuantrankError> {
    if config.get_string("backtest", "initial_capital").is_none() {
        return Ok(());
    }
    let value = read_double(config, "backtest", "initial_capital", 0.0)?;
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_costs(config: &dyn ConfigPort) -> Result<(), QuantrankError> {
    non_negative(config, "backtest", "commission_per_trade")?;
    for key in ["commission_pct", "slippage_pct"] {
        let value = read_double(config, "backtest", key, 0.0)?;
        if !(0.0..100.0).contains(&value) {
            return Err(invalid(
                "backtest",
                key,
                format!("{key} must be a percentage in [0, 100)"),
            ));
        }
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), QuantrankError> {
    let value = read_double(config, "backtest", "risk_free_rate", 0.0)?;
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            "backtest",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), QuantrankError> {
    let start = read_date(config, "backtest", "start_date")?;
    let end = read_date(config, "backtest", "end_date")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(invalid(
                "backtest",
                "start_date",
                "start_date must be before end_date",
            ));
        }
    }
    Ok(())
}

pub fn validate_universe_config(config: &dyn ConfigPort) -> Result<(), QuantrankError> {
    let weights = config.get_string("universe", "weights");
    match config.get_string("universe", "codes") {
        Some(raw) => {
            let codes = parse_codes(&raw)?;
            parse_weights(&codes, weights.as_deref())?;
        }
        None if weights.is_some() => {
            return Err(QuantrankError::ConfigMissing {
                section: "universe".to_string(),
                key: "codes".to_string(),
            });
        }
        None => {}
    }
    Ok(())
}
