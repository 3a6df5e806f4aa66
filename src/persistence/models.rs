//! Database Models
//!
//! Row records and create-inputs for the ledger tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::domain::entities::order::{Order, OrderStatus, OrderType};
use crate::domain::entities::position::Position;
use crate::domain::entities::risk_rule::{RiskRule, RuleParams};
use crate::domain::entities::trade::TradeSide;
use crate::domain::errors::ValidationError;

/// Portfolio row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PortfolioRecord {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub initial_capital: f64,
    pub current_value: f64,
    pub cash_balance: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Position row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PositionRecord {
    pub id: i64,
    pub portfolio_id: i64,
    pub symbol: String,
    pub quantity: f64,
    pub average_price: f64,
    pub current_price: f64,
    pub realized_pnl: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PositionRecord> for Position {
    fn from(record: PositionRecord) -> Self {
        Position {
            id: Some(record.id),
            portfolio_id: record.portfolio_id,
            symbol: record.symbol,
            quantity: record.quantity,
            average_price: record.average_price,
            current_price: record.current_price,
            realized_pnl: record.realized_pnl,
        }
    }
}

/// Trade row. Append-only audit record; `pnl` is the realized P&L attributed
/// to this trade (0 for buys).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TradeRecord {
    pub id: i64,
    pub portfolio_id: i64,
    pub strategy_execution_id: Option<i64>,
    pub symbol: String,
    pub side: String,
    pub quantity: f64,
    pub price: f64,
    pub amount: f64,
    pub fee: f64,
    pub pnl: f64,
    pub status: String,
    pub executed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TradeRecord {
    /// Amount net of fee.
    pub fn net_amount(&self) -> f64 {
        self.amount - self.fee
    }
}

/// Order row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderRecord {
    pub id: i64,
    pub portfolio_id: i64,
    pub strategy_execution_id: Option<i64>,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub quantity: f64,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub status: String,
    pub filled_quantity: f64,
    pub average_fill_price: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRecord {
    pub fn remaining_quantity(&self) -> f64 {
        self.quantity - self.filled_quantity
    }
}

impl TryFrom<OrderRecord> for Order {
    type Error = ValidationError;

    /// Rehydrate the domain order so lifecycle transitions (fill, cancel)
    /// run through the entity rather than ad-hoc SQL.
    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        Ok(Order {
            id: Some(record.id),
            portfolio_id: record.portfolio_id,
            strategy_execution_id: record.strategy_execution_id,
            symbol: record.symbol,
            side: TradeSide::parse(&record.side)?,
            order_type: OrderType::parse(&record.order_type)?,
            quantity: record.quantity,
            price: record.price,
            stop_price: record.stop_price,
            status: OrderStatus::parse(&record.status)?,
            filled_quantity: record.filled_quantity,
            average_fill_price: record.average_fill_price,
        })
    }
}

/// Risk rule row; parameters stay encoded here and are decoded into
/// `RuleParams` when loaded for evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RiskRuleRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub rule_type: String,
    pub parameters: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RiskRuleRecord> for RiskRule {
    fn from(record: RiskRuleRecord) -> Self {
        let params = RuleParams::decode(&record.rule_type, record.parameters.as_deref());
        RiskRule {
            id: record.id,
            name: record.name,
            params,
            is_active: record.is_active,
        }
    }
}

/// Risk alert row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RiskAlertRecord {
    pub id: i64,
    pub risk_rule_id: i64,
    pub portfolio_id: i64,
    pub severity: String,
    pub message: String,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Create portfolio input
#[derive(Debug, Clone)]
pub struct CreatePortfolio {
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub initial_capital: f64,
}

/// Create trade input
#[derive(Debug, Clone)]
pub struct CreateTrade {
    pub portfolio_id: i64,
    pub strategy_execution_id: Option<i64>,
    pub symbol: String,
    pub side: String,
    pub quantity: f64,
    pub price: f64,
    pub amount: f64,
    pub fee: f64,
    pub pnl: f64,
}

/// Create order input
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub portfolio_id: i64,
    pub strategy_execution_id: Option<i64>,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub quantity: f64,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
}

/// Create risk rule input
#[derive(Debug, Clone)]
pub struct CreateRiskRule {
    pub name: String,
    pub description: Option<String>,
    pub rule_type: String,
    pub parameters: Option<String>,
}

/// Create risk alert input
#[derive(Debug, Clone)]
pub struct CreateRiskAlert {
    pub risk_rule_id: i64,
    pub portfolio_id: i64,
    pub severity: String,
    pub message: String,
}
