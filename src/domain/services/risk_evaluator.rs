//! Risk rule evaluation
//!
//! Stateless predicates over (portfolio, proposed trade). Evaluation reads
//! rule parameters decoded at load time and mutates nothing; alert side
//! effects belong to the risk monitor.

use crate::domain::entities::portfolio::Portfolio;
use crate::domain::entities::risk_rule::{RiskRule, RuleParams};
use crate::domain::entities::trade::{ProposedTrade, TradeSide};
use crate::persistence::models::TradeRecord;

/// Historical-NAV lookup consumed by the daily_loss and drawdown rules.
///
/// The shipped implementation is a stub: until a real NAV series exists,
/// today's realized P&L reads as 0 and the peak as the current value, so
/// those two rules cannot fire. The seam is here so a real implementation
/// can replay the trade log (see `max_drawdown_from_nav`) without touching
/// the evaluator.
pub trait NavHistory: Send + Sync {
    /// Realized P&L accumulated today for the portfolio.
    fn daily_realized_pnl(&self, portfolio_id: i64) -> f64;

    /// Historical peak of the portfolio's total value, if known.
    fn peak_value(&self, portfolio_id: i64) -> Option<f64>;
}

/// Stub NAV history: no daily loss, no known peak.
pub struct NoNavHistory;

impl NavHistory for NoNavHistory {
    fn daily_realized_pnl(&self, _portfolio_id: i64) -> f64 {
        0.0
    }

    fn peak_value(&self, _portfolio_id: i64) -> Option<f64> {
        None
    }
}

/// Everything a rule may inspect during one evaluation pass.
pub struct RiskContext<'a> {
    pub portfolio: &'a Portfolio,
    /// Present when gating a trade; absent for passive portfolio monitoring.
    pub proposed: Option<&'a ProposedTrade>,
    /// Trades already executed today in this portfolio.
    pub trades_today: u32,
    pub nav: &'a dyn NavHistory,
}

/// Evaluate one rule. Returns (violated, reason). A misconfigured or
/// unknown rule reports `(false, Some("unknown rule type"))` instead of
/// failing, so it can never block trading.
pub fn evaluate(rule: &RiskRule, ctx: &RiskContext) -> (bool, Option<String>) {
    match &rule.params {
        RuleParams::PositionSize {
            max_position_size,
            max_position_percentage,
        } => check_position_size(ctx, *max_position_size, *max_position_percentage),
        RuleParams::DailyLoss {
            max_daily_loss,
            max_daily_loss_percentage,
        } => check_daily_loss(ctx, *max_daily_loss, *max_daily_loss_percentage),
        RuleParams::Drawdown {
            max_drawdown_percentage,
        } => check_drawdown(ctx, *max_drawdown_percentage),
        RuleParams::MaxTradesPerDay { max_trades } => check_max_trades(ctx, *max_trades),
        RuleParams::Unknown { .. } => (false, Some("unknown rule type".to_string())),
    }
}

fn check_position_size(
    ctx: &RiskContext,
    max_position_size: f64,
    max_position_percentage: f64,
) -> (bool, Option<String>) {
    // Only meaningful against a concrete proposal.
    let Some(proposed) = ctx.proposed else {
        return (false, None);
    };

    let trade_value = proposed.value();
    if trade_value > max_position_size {
        return (
            true,
            Some(format!(
                "trade value {:.2} exceeds max position size {:.2}",
                trade_value, max_position_size
            )),
        );
    }

    if max_position_percentage > 0.0 {
        let portfolio_value = ctx.portfolio.total_value();
        if portfolio_value > 0.0 {
            let position_percentage = trade_value / portfolio_value * 100.0;
            if position_percentage > max_position_percentage {
                return (
                    true,
                    Some(format!(
                        "trade value is {:.2}% of portfolio, above the {:.2}% limit",
                        position_percentage, max_position_percentage
                    )),
                );
            }
        }
    }

    (false, None)
}

fn check_daily_loss(
    ctx: &RiskContext,
    max_daily_loss: f64,
    max_daily_loss_percentage: f64,
) -> (bool, Option<String>) {
    let daily_pnl = ctx.nav.daily_realized_pnl(ctx.portfolio.id);

    if daily_pnl < -max_daily_loss {
        return (
            true,
            Some(format!(
                "daily loss {:.2} exceeds max daily loss {:.2}",
                daily_pnl.abs(),
                max_daily_loss
            )),
        );
    }

    if max_daily_loss_percentage > 0.0 {
        let portfolio_value = ctx.portfolio.total_value();
        if portfolio_value > 0.0 {
            let loss_percentage = daily_pnl.abs() / portfolio_value * 100.0;
            if daily_pnl < 0.0 && loss_percentage > max_daily_loss_percentage {
                return (
                    true,
                    Some(format!(
                        "daily loss is {:.2}% of portfolio, above the {:.2}% limit",
                        loss_percentage, max_daily_loss_percentage
                    )),
                );
            }
        }
    }

    (false, None)
}

fn check_drawdown(ctx: &RiskContext, max_drawdown_percentage: f64) -> (bool, Option<String>) {
    if max_drawdown_percentage <= 0.0 {
        return (false, None);
    }

    let current_value = ctx.portfolio.total_value();
    let peak_value = ctx.nav.peak_value(ctx.portfolio.id).unwrap_or(current_value);
    if peak_value <= 0.0 {
        return (false, None);
    }

    let drawdown_percentage = (peak_value - current_value) / peak_value * 100.0;
    if drawdown_percentage > max_drawdown_percentage {
        return (
            true,
            Some(format!(
                "drawdown {:.2}% exceeds max drawdown {:.2}%",
                drawdown_percentage, max_drawdown_percentage
            )),
        );
    }

    (false, None)
}

fn check_max_trades(ctx: &RiskContext, max_trades: u32) -> (bool, Option<String>) {
    if max_trades > 0 && ctx.trades_today >= max_trades {
        return (
            true,
            Some(format!(
                "{} trades today reaches the daily limit of {}",
                ctx.trades_today, max_trades
            )),
        );
    }

    (false, None)
}

/// Maximum drawdown percentage of a NAV series replayed from the trade log:
/// cash-flow view starting at initial capital, buys subtracting and sells
/// adding the gross amount. Building block for a real `NavHistory`.
pub fn max_drawdown_from_nav(initial_capital: f64, trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }

    let mut value = initial_capital;
    let mut peak = f64::MIN;
    let mut max_drawdown: f64 = 0.0;

    for trade in trades {
        match TradeSide::parse(&trade.side) {
            Ok(TradeSide::Buy) => value -= trade.amount,
            Ok(TradeSide::Sell) => value += trade.amount,
            Err(_) => continue,
        }
        if peak == f64::MIN {
            peak = value;
        }
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let drawdown = (peak - value) / peak;
            max_drawdown = max_drawdown.max(drawdown);
        }
    }

    max_drawdown * 100.0
}
