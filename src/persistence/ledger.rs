//! Ledger commit
//!
//! A committed trade touches three tables at once: the append-only trade
//! log, the portfolio cash balance, and the position row. Partial
//! application of any subset silently corrupts financial state, so all of
//! it goes through one transaction here.

use chrono::Utc;
use tracing::{debug, error};

use super::models::{CreateTrade, PortfolioRecord, PositionRecord, TradeRecord};
use super::{DatabaseError, DbPool};
use crate::domain::entities::portfolio::Portfolio;
use crate::domain::entities::position::Position;
use crate::domain::entities::trade::TradeStatus;

/// Position mutation carried by a trade commit.
#[derive(Debug, Clone)]
pub enum PositionChange {
    /// First buy of a symbol in this portfolio.
    Create(Position),
    /// Subsequent buy or partial sell of an existing row.
    Update(Position),
    /// Sell that reduced the quantity to exactly zero.
    Delete { id: i64 },
}

/// Everything a single trade changes, computed up front by the executor.
#[derive(Debug, Clone)]
pub struct TradeCommit {
    pub trade: CreateTrade,
    pub new_cash_balance: f64,
    /// Post-mutation aggregate snapshot for the denormalized
    /// `current_value` cache.
    pub new_current_value: f64,
    pub position_change: PositionChange,
}

/// Transactional store for the trade ledger.
#[derive(Clone)]
pub struct LedgerStore {
    pool: DbPool,
}

impl LedgerStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Load a portfolio aggregate: the row plus its open positions.
    pub async fn load_portfolio(&self, id: i64) -> Result<Option<Portfolio>, DatabaseError> {
        let record =
            sqlx::query_as::<_, PortfolioRecord>("SELECT * FROM portfolios WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DatabaseError::QueryError(format!("Failed to get portfolio: {}", e)))?;

        let Some(record) = record else {
            return Ok(None);
        };

        let positions = sqlx::query_as::<_, PositionRecord>(
            "SELECT * FROM positions WHERE portfolio_id = ?1 ORDER BY symbol",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DatabaseError::QueryError(format!("Failed to get positions: {}", e)))?;

        Ok(Some(Portfolio {
            id: record.id,
            user_id: record.user_id,
            name: record.name,
            initial_capital: record.initial_capital,
            cash_balance: record.cash_balance,
            current_value: record.current_value,
            is_active: record.is_active,
            positions: positions.into_iter().map(Position::from).collect(),
        }))
    }

    /// Apply a trade commit atomically: insert the trade record, write the
    /// new cash balance and current-value snapshot, and apply the position
    /// change. Either all of it persists or none of it does.
    pub async fn commit_trade(&self, commit: TradeCommit) -> Result<TradeRecord, DatabaseError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin trade transaction: {}", e);
            DatabaseError::ConnectionError(e)
        })?;

        let trade = sqlx::query_as::<_, TradeRecord>(
            r#"
            INSERT INTO trades (
                portfolio_id, strategy_execution_id, symbol, side, quantity,
                price, amount, fee, pnl, status, executed_at, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
            RETURNING *
            "#,
        )
        .bind(commit.trade.portfolio_id)
        .bind(commit.trade.strategy_execution_id)
        .bind(&commit.trade.symbol)
        .bind(&commit.trade.side)
        .bind(commit.trade.quantity)
        .bind(commit.trade.price)
        .bind(commit.trade.amount)
        .bind(commit.trade.fee)
        .bind(commit.trade.pnl)
        .bind(TradeStatus::Completed.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to insert trade: {}", e);
            DatabaseError::QueryError(format!("Failed to insert trade: {}", e))
        })?;

        sqlx::query(
            "UPDATE portfolios SET cash_balance = ?1, current_value = ?2, updated_at = ?3 \
             WHERE id = ?4",
        )
        .bind(commit.new_cash_balance)
        .bind(commit.new_current_value)
        .bind(now)
        .bind(commit.trade.portfolio_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to update portfolio cash: {}", e);
            DatabaseError::QueryError(format!("Failed to update portfolio: {}", e))
        })?;

        match &commit.position_change {
            PositionChange::Create(position) => {
                sqlx::query(
                    r#"
                    INSERT INTO positions (
                        portfolio_id, symbol, quantity, average_price,
                        current_price, realized_pnl, created_at, updated_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                    "#,
                )
                .bind(position.portfolio_id)
                .bind(&position.symbol)
                .bind(position.quantity)
                .bind(position.average_price)
                .bind(position.current_price)
                .bind(position.realized_pnl)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    error!("Failed to create position: {}", e);
                    DatabaseError::QueryError(format!("Failed to create position: {}", e))
                })?;
            }
            PositionChange::Update(position) => {
                let id = position.id.ok_or_else(|| {
                    DatabaseError::QueryError("position update without row id".to_string())
                })?;
                sqlx::query(
                    r#"
                    UPDATE positions
                    SET quantity = ?1, average_price = ?2, current_price = ?3,
                        realized_pnl = ?4, updated_at = ?5
                    WHERE id = ?6
                    "#,
                )
                .bind(position.quantity)
                .bind(position.average_price)
                .bind(position.current_price)
                .bind(position.realized_pnl)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    error!("Failed to update position: {}", e);
                    DatabaseError::QueryError(format!("Failed to update position: {}", e))
                })?;
            }
            PositionChange::Delete { id } => {
                sqlx::query("DELETE FROM positions WHERE id = ?1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        error!("Failed to delete position: {}", e);
                        DatabaseError::QueryError(format!("Failed to delete position: {}", e))
                    })?;
            }
        }

        tx.commit().await.map_err(|e| {
            error!("Failed to commit trade transaction: {}", e);
            DatabaseError::ConnectionError(e)
        })?;

        debug!(
            "Committed trade {} ({} {} {}@{})",
            trade.id, trade.symbol, trade.side, trade.quantity, trade.price
        );
        Ok(trade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;
    use crate::persistence::models::CreatePortfolio;
    use crate::persistence::repository::{PortfolioRepository, PositionRepository};

    async fn seeded_pool() -> (DbPool, i64) {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let portfolio = PortfolioRepository::new(pool.clone())
            .create(CreatePortfolio {
                user_id: 1,
                name: "ledger".to_string(),
                description: None,
                initial_capital: 10000.0,
            })
            .await
            .unwrap();
        (pool, portfolio.id)
    }

    fn buy_commit(portfolio_id: i64) -> TradeCommit {
        TradeCommit {
            trade: CreateTrade {
                portfolio_id,
                strategy_execution_id: None,
                symbol: "AAPL".to_string(),
                side: "buy".to_string(),
                quantity: 10.0,
                price: 150.0,
                amount: 1500.0,
                fee: 1.5,
                pnl: 0.0,
            },
            new_cash_balance: 8501.5,
            new_current_value: 10001.5,
            position_change: PositionChange::Create(Position::open(
                portfolio_id,
                "AAPL",
                10.0,
                150.0,
            )),
        }
    }

    #[tokio::test]
    async fn test_commit_persists_trade_cash_and_position_together() {
        let (pool, portfolio_id) = seeded_pool().await;
        let store = LedgerStore::new(pool.clone());

        let trade = store.commit_trade(buy_commit(portfolio_id)).await.unwrap();
        assert_eq!(trade.status, "completed");
        assert_eq!(trade.net_amount(), 1498.5);

        let portfolio = store.load_portfolio(portfolio_id).await.unwrap().unwrap();
        assert_eq!(portfolio.cash_balance, 8501.5);
        assert_eq!(portfolio.positions.len(), 1);
        assert_eq!(portfolio.position("AAPL").unwrap().quantity, 10.0);
    }

    #[tokio::test]
    async fn test_aborted_transaction_rolls_back_trade_and_cash_together() {
        let (pool, portfolio_id) = seeded_pool().await;

        // Replay the commit's first two writes by hand, then drop the
        // transaction before the commit point (a storage failure mid-commit
        // takes exactly this path).
        {
            let mut tx = pool.begin().await.unwrap();
            sqlx::query(
                "INSERT INTO trades (portfolio_id, symbol, side, quantity, price, amount, fee, \
                 pnl, status) VALUES (?1, 'AAPL', 'buy', 10.0, 150.0, 1500.0, 1.5, 0.0, \
                 'completed')",
            )
            .bind(portfolio_id)
            .execute(&mut *tx)
            .await
            .unwrap();
            sqlx::query("UPDATE portfolios SET cash_balance = 8501.5 WHERE id = ?1")
                .bind(portfolio_id)
                .execute(&mut *tx)
                .await
                .unwrap();
            // tx dropped here without commit
        }

        let trades: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trades")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(trades.0, 0);

        let store = LedgerStore::new(pool);
        let portfolio = store.load_portfolio(portfolio_id).await.unwrap().unwrap();
        assert_eq!(portfolio.cash_balance, 10000.0);
    }

    #[tokio::test]
    async fn test_delete_position_on_full_close() {
        let (pool, portfolio_id) = seeded_pool().await;
        let store = LedgerStore::new(pool.clone());
        store.commit_trade(buy_commit(portfolio_id)).await.unwrap();

        let position = PositionRepository::new(pool.clone())
            .get_by_symbol(portfolio_id, "AAPL")
            .await
            .unwrap()
            .unwrap();

        let sell = TradeCommit {
            trade: CreateTrade {
                portfolio_id,
                strategy_execution_id: None,
                symbol: "AAPL".to_string(),
                side: "sell".to_string(),
                quantity: 10.0,
                price: 160.0,
                amount: 1600.0,
                fee: 1.6,
                pnl: 100.0,
            },
            new_cash_balance: 10099.9,
            new_current_value: 10099.9,
            position_change: PositionChange::Delete { id: position.id },
        };
        store.commit_trade(sell).await.unwrap();

        let gone = PositionRepository::new(pool)
            .get_by_symbol(portfolio_id, "AAPL")
            .await
            .unwrap();
        assert!(gone.is_none());
    }
}
