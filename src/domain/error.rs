//! Domain error types.

/// Top-level error type for quantrank.
///
/// Analytics never fail on short or degenerate data (those resolve to neutral
/// defaults). Errors are reserved for malformed inputs, configuration and
/// data access.
#[derive(Debug, thiserror::Error)]
pub enum QuantrankError {
    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("no data for {code}")]
    NoData { code: String },

    #[error("invalid price series for {code}: {reason}")]
    InvalidSeries { code: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid portfolio: {reason}")]
    InvalidPortfolio { reason: String },

    #[error(transparent)]
    Universe(#[from] crate::domain::universe::UniverseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&QuantrankError> for std::process::ExitCode {
    fn from(err: &QuantrankError) -> Self {
        let code: u8 = match err {
            QuantrankError::Io(_) => 1,
            QuantrankError::ConfigParse { .. }
            | QuantrankError::ConfigMissing { .. }
            | QuantrankError::ConfigInvalid { .. }
            | QuantrankError::Universe(_) => 2,
            QuantrankError::DataSource { .. } | QuantrankError::InvalidSeries { .. } => 3,
            QuantrankError::InvalidPortfolio { .. } => 4,
            QuantrankError::NoData { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
