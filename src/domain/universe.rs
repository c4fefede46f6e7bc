//! Instrument universe: code lists and portfolio weights from configuration,
//! and screening of codes against the data source.

use crate::domain::error::QuantrankError;
use crate::domain::portfolio::Portfolio;
use crate::domain::price::PriceSeries;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;

/// Bars an instrument needs before it takes part in a run.
pub const MIN_PRICE_BARS: usize = 2;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),

    #[error("invalid weight '{0}'")]
    InvalidWeight(String),

    #[error("{weights} weights given for {codes} codes")]
    WeightCountMismatch { codes: usize, weights: usize },
}

/// Split a comma-separated code list. Codes are trimmed and upper-cased;
/// empty tokens and repeats are rejected.
pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

/// Pair `codes` with a comma-separated weight list. `None` means equal
/// weights. Weights are taken as written; `Portfolio::validate` checks them.
pub fn parse_weights(codes: &[String], input: Option<&str>) -> Result<Portfolio, UniverseError> {
    let Some(input) = input else {
        return Ok(Portfolio::equal_weight(codes));
    };

    let weights = input
        .split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<f64>()
                .ok()
                .filter(|w| w.is_finite())
                .ok_or_else(|| UniverseError::InvalidWeight(token.to_string()))
        })
        .collect::<Result<Vec<f64>, _>>()?;

    if weights.len() != codes.len() {
        return Err(UniverseError::WeightCountMismatch {
            codes: codes.len(),
            weights: weights.len(),
        });
    }

    Ok(Portfolio::from_weights(
        codes.iter().map(String::as_str).zip(weights),
    ))
}

#[derive(Debug, Clone)]
pub struct SkippedCode {
    pub code: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientBars { bars: usize },
}

pub struct UniverseValidationResult {
    pub series: Vec<PriceSeries>,
    pub skipped: Vec<SkippedCode>,
}

impl UniverseValidationResult {
    pub fn codes(&self) -> Vec<String> {
        self.series.iter().map(|s| s.code().to_string()).collect()
    }
}

/// Fetch every code and keep those with at least `min_bars` bars.
/// Fails with `NoData` when nothing survives.
pub fn validate_universe(
    data_port: &dyn DataPort,
    codes: &[String],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    min_bars: usize,
) -> Result<UniverseValidationResult, QuantrankError> {
    let mut series = Vec::new();
    let mut skipped = Vec::new();

    for code in codes {
        let s = match data_port.fetch_series(code, start, end) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(code = code.as_str(), error = %e, "skipping code");
                skipped.push(SkippedCode {
                    code: code.clone(),
                    reason: SkipReason::NoData,
                });
                continue;
            }
        };

        if s.len() < min_bars {
            tracing::warn!(
                code = code.as_str(),
                bars = s.len(),
                minimum = min_bars,
                "skipping code with too few bars"
            );
            skipped.push(SkippedCode {
                code: code.clone(),
                reason: SkipReason::InsufficientBars { bars: s.len() },
            });
            continue;
        }

        tracing::debug!(code = code.as_str(), bars = s.len(), "code ok");
        series.push(s);
    }

    if series.is_empty() {
        return Err(QuantrankError::NoData {
            code: "all".to_string(),
        });
    }

    if !skipped.is_empty() {
        tracing::info!(
            kept = series.len(),
            total = codes.len(),
            "universe reduced after validation"
        );
    }

    Ok(UniverseValidationResult { series, skipped })
}
