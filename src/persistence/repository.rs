//! Database Repository
//!
//! Data access for portfolios, positions, trades, orders, and risk
//! rules/alerts. Ledger-mutating writes (trade + cash + position) do not
//! live here; they go through `ledger::LedgerStore` so they share one
//! transaction.

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use super::models::*;
use super::{DatabaseError, DbPool};

/// Portfolio repository
pub struct PortfolioRepository {
    pool: DbPool,
}

impl PortfolioRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: CreatePortfolio) -> Result<PortfolioRecord, DatabaseError> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, PortfolioRecord>(
            r#"
            INSERT INTO portfolios (
                user_id, name, description, initial_capital, current_value,
                cash_balance, is_active, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?4, ?4, 1, ?5, ?5)
            RETURNING *
            "#,
        )
        .bind(input.user_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.initial_capital)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create portfolio: {}", e);
            DatabaseError::QueryError(format!("Failed to create portfolio: {}", e))
        })?;

        debug!("Created portfolio {} ({})", record.id, record.name);
        Ok(record)
    }

    pub async fn get(&self, id: i64) -> Result<Option<PortfolioRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, PortfolioRecord>("SELECT * FROM portfolios WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to get portfolio {}: {}", id, e);
                DatabaseError::QueryError(format!("Failed to get portfolio: {}", e))
            })?;

        Ok(record)
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<PortfolioRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, PortfolioRecord>(
            "SELECT * FROM portfolios WHERE user_id = ?1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("Failed to list portfolios: {}", e)))?;

        Ok(records)
    }

    /// Soft-deactivate. Portfolios with trade history are never deleted.
    pub async fn deactivate(&self, id: i64) -> Result<(), DatabaseError> {
        let rows = sqlx::query(
            "UPDATE portfolios SET is_active = 0, updated_at = ?1 WHERE id = ?2",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("Failed to deactivate portfolio: {}", e)))?
        .rows_affected();

        if rows == 0 {
            return Err(DatabaseError::QueryError(format!(
                "Portfolio not found: {}",
                id
            )));
        }

        debug!("Deactivated portfolio {}", id);
        Ok(())
    }
}

/// Position repository (reads only; writes go through the ledger)
pub struct PositionRepository {
    pool: DbPool,
}

impl PositionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn for_portfolio(
        &self,
        portfolio_id: i64,
    ) -> Result<Vec<PositionRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, PositionRecord>(
            "SELECT * FROM positions WHERE portfolio_id = ?1 ORDER BY symbol",
        )
        .bind(portfolio_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get positions for portfolio {}: {}", portfolio_id, e);
            DatabaseError::QueryError(format!("Failed to get positions: {}", e))
        })?;

        Ok(records)
    }

    pub async fn get_by_symbol(
        &self,
        portfolio_id: i64,
        symbol: &str,
    ) -> Result<Option<PositionRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, PositionRecord>(
            "SELECT * FROM positions WHERE portfolio_id = ?1 AND symbol = ?2",
        )
        .bind(portfolio_id)
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("Failed to get position: {}", e)))?;

        Ok(record)
    }

    /// Refresh the mark price of a position outside a trade (market-data
    /// updates). Ledger-affecting writes stay in the ledger store.
    pub async fn mark(
        &self,
        portfolio_id: i64,
        symbol: &str,
        price: f64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE positions SET current_price = ?1, updated_at = ?2 \
             WHERE portfolio_id = ?3 AND symbol = ?4",
        )
        .bind(price)
        .bind(Utc::now())
        .bind(portfolio_id)
        .bind(symbol)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("Failed to mark position: {}", e)))?;

        Ok(())
    }
}

/// Trade repository (reads; inserts happen inside the ledger transaction)
pub struct TradeRepository {
    pool: DbPool,
}

impl TradeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<TradeRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, TradeRecord>("SELECT * FROM trades WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("Failed to get trade: {}", e)))?;

        Ok(record)
    }

    /// Trades for a portfolio, optionally bounded by an execution-time
    /// window (inclusive bounds, matching the reporting contract).
    pub async fn for_portfolio(
        &self,
        portfolio_id: i64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<TradeRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, TradeRecord>(
            r#"
            SELECT * FROM trades
            WHERE portfolio_id = ?1
              AND (?2 IS NULL OR executed_at >= ?2)
              AND (?3 IS NULL OR executed_at <= ?3)
            ORDER BY executed_at
            "#,
        )
        .bind(portfolio_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get trades for portfolio {}: {}", portfolio_id, e);
            DatabaseError::QueryError(format!("Failed to get trades: {}", e))
        })?;

        Ok(records)
    }

    /// Count of trades executed on the UTC calendar day containing `at`.
    /// Half-open day bounds keep the comparison in chrono types.
    pub async fn count_on_day(
        &self,
        portfolio_id: i64,
        at: DateTime<Utc>,
    ) -> Result<u32, DatabaseError> {
        let day_start = at
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time")
            .and_utc();
        let day_end = day_start + chrono::Duration::days(1);

        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM trades \
             WHERE portfolio_id = ?1 AND executed_at >= ?2 AND executed_at < ?3",
        )
        .bind(portfolio_id)
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("Failed to count trades: {}", e)))?;

        Ok(row.0 as u32)
    }
}

/// Order repository
pub struct OrderRepository {
    pool: DbPool,
}

impl OrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: CreateOrder) -> Result<OrderRecord, DatabaseError> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, OrderRecord>(
            r#"
            INSERT INTO orders (
                portfolio_id, strategy_execution_id, symbol, side, order_type,
                quantity, price, stop_price, status, filled_quantity,
                created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', 0, ?9, ?9)
            RETURNING *
            "#,
        )
        .bind(input.portfolio_id)
        .bind(input.strategy_execution_id)
        .bind(&input.symbol)
        .bind(&input.side)
        .bind(&input.order_type)
        .bind(input.quantity)
        .bind(input.price)
        .bind(input.stop_price)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create order: {}", e);
            DatabaseError::QueryError(format!("Failed to create order: {}", e))
        })?;

        debug!("Created order {} for {}", record.id, record.symbol);
        Ok(record)
    }

    pub async fn get(&self, id: i64) -> Result<Option<OrderRecord>, DatabaseError> {
        let record = sqlx::query_as::<_, OrderRecord>("SELECT * FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("Failed to get order: {}", e)))?;

        Ok(record)
    }

    /// Persist fill progress and the resulting status in one write.
    pub async fn record_fill(
        &self,
        id: i64,
        filled_quantity: f64,
        average_fill_price: f64,
        status: &str,
    ) -> Result<OrderRecord, DatabaseError> {
        let record = sqlx::query_as::<_, OrderRecord>(
            r#"
            UPDATE orders
            SET filled_quantity = ?1, average_fill_price = ?2, status = ?3, updated_at = ?4
            WHERE id = ?5
            RETURNING *
            "#,
        )
        .bind(filled_quantity)
        .bind(average_fill_price)
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to record fill for order {}: {}", id, e);
            DatabaseError::QueryError(format!("Failed to record fill: {}", e))
        })?;

        Ok(record)
    }

    pub async fn set_status(&self, id: i64, status: &str) -> Result<OrderRecord, DatabaseError> {
        let record = sqlx::query_as::<_, OrderRecord>(
            "UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3 RETURNING *",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to set status for order {}: {}", id, e);
            DatabaseError::QueryError(format!("Failed to set order status: {}", e))
        })?;

        Ok(record)
    }
}

/// Risk rule repository
pub struct RiskRuleRepository {
    pool: DbPool,
}

impl RiskRuleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: CreateRiskRule) -> Result<RiskRuleRecord, DatabaseError> {
        let now = Utc::now();
        let record = sqlx::query_as::<_, RiskRuleRecord>(
            r#"
            INSERT INTO risk_rules (name, description, rule_type, parameters, is_active,
                                    created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
            RETURNING *
            "#,
        )
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.rule_type)
        .bind(&input.parameters)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create risk rule: {}", e);
            DatabaseError::QueryError(format!("Failed to create risk rule: {}", e))
        })?;

        debug!("Created risk rule {} ({})", record.id, record.rule_type);
        Ok(record)
    }

    pub async fn active(&self) -> Result<Vec<RiskRuleRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, RiskRuleRecord>(
            "SELECT * FROM risk_rules WHERE is_active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("Failed to get risk rules: {}", e)))?;

        Ok(records)
    }

    pub async fn set_active(&self, id: i64, is_active: bool) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE risk_rules SET is_active = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(is_active)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryError(format!("Failed to update risk rule: {}", e)))?;

        Ok(())
    }
}

/// Risk alert repository
pub struct RiskAlertRepository {
    pool: DbPool,
}

impl RiskAlertRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: CreateRiskAlert) -> Result<RiskAlertRecord, DatabaseError> {
        let record = sqlx::query_as::<_, RiskAlertRecord>(
            r#"
            INSERT INTO risk_alerts (risk_rule_id, portfolio_id, severity, message,
                                     is_resolved, created_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5)
            RETURNING *
            "#,
        )
        .bind(input.risk_rule_id)
        .bind(input.portfolio_id)
        .bind(&input.severity)
        .bind(&input.message)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create risk alert: {}", e);
            DatabaseError::QueryError(format!("Failed to create risk alert: {}", e))
        })?;

        Ok(record)
    }

    /// Unresolved alerts, optionally scoped to one portfolio.
    pub async fn active(
        &self,
        portfolio_id: Option<i64>,
    ) -> Result<Vec<RiskAlertRecord>, DatabaseError> {
        let records = sqlx::query_as::<_, RiskAlertRecord>(
            r#"
            SELECT * FROM risk_alerts
            WHERE is_resolved = 0 AND (?1 IS NULL OR portfolio_id = ?1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(portfolio_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("Failed to get risk alerts: {}", e)))?;

        Ok(records)
    }

    pub async fn resolve(&self, id: i64) -> Result<RiskAlertRecord, DatabaseError> {
        let record = sqlx::query_as::<_, RiskAlertRecord>(
            "UPDATE risk_alerts SET is_resolved = 1, resolved_at = ?1 WHERE id = ?2 RETURNING *",
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("Failed to resolve alert: {}", e)))?;

        Ok(record)
    }
}
