//! Fill simulation for portfolio entries.
//!
//! Commission and slippage are expressed in percent (0.1 = 0.1%).

/// Costs applied when a holding is bought.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

/// Calculate commission: flat_fee + (trade_value * pct / 100).
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Buy-side slippage: execution_price = market_price * (1 + slippage_pct / 100)
pub fn apply_slippage_buy(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered {
        quantity: f64,
        execution_price: f64,
        cost: f64,
        commission: f64,
    },
    InsufficientCapital,
}

/// Spend `budget` on one holding at `market_price`.
///
/// 1. Apply slippage to the execution price
/// 2. Size the trade so that cost + commission equals the budget
/// 3. Fractional quantities are allowed
pub fn buy_with_budget(budget: f64, market_price: f64, config: &ExecutionConfig) -> EntryResult {
    let execution_price = apply_slippage_buy(market_price, config.slippage_pct);
    if !(execution_price > 0.0) || !execution_price.is_finite() {
        return EntryResult::InsufficientCapital;
    }

    let cost = (budget - config.commission_per_trade) / (1.0 + config.commission_pct / 100.0);
    if !(cost > 0.0) {
        return EntryResult::InsufficientCapital;
    }

    EntryResult::Entered {
        quantity: cost / execution_price,
        execution_price,
        cost,
        commission: calculate_commission(cost, config),
    }
}
