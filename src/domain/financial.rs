//! Fundamental snapshot and news sentiment inputs.

use serde::Serialize;

/// Latest fundamentals for one instrument. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FinancialSnapshot {
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub roe: Option<f64>,
    pub revenue: Option<f64>,
    pub profit: Option<f64>,
    pub market_cap: Option<f64>,
    pub ps: Option<f64>,
}

impl FinancialSnapshot {
    /// Drop non-finite values so downstream scoring only sees real numbers.
    pub fn sanitized(self) -> Self {
        let keep = |v: Option<f64>| v.filter(|x| x.is_finite());
        Self {
            pe: keep(self.pe),
            pb: keep(self.pb),
            roe: keep(self.roe),
            revenue: keep(self.revenue),
            profit: keep(self.profit),
            market_cap: keep(self.market_cap),
            ps: keep(self.ps),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsItem {
    pub title: String,
    /// In [-1, 1]; negative is bearish.
    pub sentiment_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitized_drops_non_finite() {
        let snap = FinancialSnapshot {
            pe: Some(f64::NAN),
            pb: Some(1.5),
            roe: Some(f64::INFINITY),
            ..Default::default()
        }
        .sanitized();

        assert_eq!(snap.pe, None);
        assert_eq!(snap.pb, Some(1.5));
        assert_eq!(snap.roe, None);
        assert_eq!(snap.market_cap, None);
    }
}
