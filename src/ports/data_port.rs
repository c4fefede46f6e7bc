//! Market data access port.

use crate::domain::error::QuantrankError;
use crate::domain::financial::{FinancialSnapshot, NewsItem};
use crate::domain::price::PriceSeries;
use chrono::NaiveDate;
use std::collections::HashMap;

pub trait DataPort {
    /// Bars for one instrument within `[start, end]` (either bound optional).
    /// An instrument with no bars is `Err(NoData)`.
    fn fetch_series(
        &self,
        code: &str,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<PriceSeries, QuantrankError>;

    fn fetch_financials(
        &self,
        codes: &[String],
    ) -> Result<HashMap<String, FinancialSnapshot>, QuantrankError>;

    fn fetch_news(&self, codes: &[String])
    -> Result<HashMap<String, Vec<NewsItem>>, QuantrankError>;

    /// Every instrument the source can serve, sorted.
    fn list_codes(&self) -> Result<Vec<String>, QuantrankError>;

    /// Series for each code in input order. Instruments that fail are logged
    /// and omitted; if none succeed the result is `Err(NoData)`.
    fn fetch_prices(
        &self,
        codes: &[String],
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PriceSeries>, QuantrankError> {
        let mut out = Vec::with_capacity(codes.len());
        for code in codes {
            match self.fetch_series(code, start, end) {
                Ok(series) => out.push(series),
                Err(e) => tracing::warn!(code = code.as_str(), error = %e, "skipping instrument"),
            }
        }
        if out.is_empty() {
            return Err(QuantrankError::NoData {
                code: codes.join(","),
            });
        }
        Ok(out)
    }
}
