//! Core domain types and analytics.

pub mod analyzer;
pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod factor_model;
pub mod financial;
pub mod indicator;
pub mod indicator_helpers;
pub mod metrics;
pub mod portfolio;
pub mod price;
pub mod risk;
pub mod scorer;
pub mod stats;
pub mod universe;
