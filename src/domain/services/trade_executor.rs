//! Trade executor
//!
//! The engine's write path. A trade request runs validation, the risk gate,
//! and the cash/holdings checks before any state changes; the resulting
//! ledger mutation (trade row, cash balance, position change) is computed on
//! the in-memory aggregate and committed atomically by the ledger store. A
//! rejected request mutates nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::domain::entities::order::{Order, OrderStatus, OrderType};
use crate::domain::entities::position::Position;
use crate::domain::entities::trade::{ProposedTrade, TradeSide};
use crate::domain::errors::{ExecutionError, ValidationError};
use crate::domain::repositories::price_source::PriceSource;
use crate::domain::services::risk_evaluator::NavHistory;
use crate::domain::services::risk_monitor::RiskMonitor;
use crate::domain::value_objects::pnl::PnL;
use crate::domain::value_objects::price::Price;
use crate::domain::value_objects::quantity::Quantity;
use crate::persistence::ledger::{LedgerStore, PositionChange, TradeCommit};
use crate::persistence::models::{CreateOrder, CreateTrade, OrderRecord, TradeRecord};
use crate::persistence::repository::{OrderRepository, TradeRepository};
use crate::persistence::{DatabaseError, DbPool};

/// A request to execute a trade immediately at a known price.
#[derive(Debug, Clone)]
pub struct TradeRequest {
    pub portfolio_id: i64,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: f64,
    pub price: f64,
    pub strategy_execution_id: Option<i64>,
}

impl TradeRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.symbol.is_empty() {
            return Err(ValidationError::InvalidSymbol(self.symbol.clone()));
        }
        Quantity::positive(self.quantity)?;
        Price::positive(self.price)?;
        Ok(())
    }
}

/// A request to place an order. Market orders execute synchronously at the
/// price source's current quote; limit and stop orders rest as pending.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub portfolio_id: i64,
    pub symbol: String,
    pub side: TradeSide,
    pub order_type: OrderType,
    pub quantity: f64,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub strategy_execution_id: Option<i64>,
}

/// Aggregate trade statistics for a portfolio over an optional time window.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub total_trades: u32,
    pub winning_trades: u32,
    /// Percentage of trades with strictly positive realized P&L.
    pub win_rate: f64,
    pub total_pnl: f64,
    pub total_fees: f64,
    pub net_pnl: f64,
}

pub struct TradeExecutor {
    pool: DbPool,
    ledger: LedgerStore,
    risk: RiskMonitor,
    prices: Arc<dyn PriceSource>,
    fee_rate: f64,
}

impl TradeExecutor {
    pub fn new(pool: DbPool, config: &EngineConfig, prices: Arc<dyn PriceSource>) -> Self {
        Self {
            ledger: LedgerStore::new(pool.clone()),
            risk: RiskMonitor::new(pool.clone()),
            pool,
            prices,
            fee_rate: config.fee_rate,
        }
    }

    /// Like `new`, with a real NAV history backing the daily-loss and
    /// drawdown rules.
    pub fn with_nav_history(
        pool: DbPool,
        config: &EngineConfig,
        prices: Arc<dyn PriceSource>,
        nav: Arc<dyn NavHistory>,
    ) -> Self {
        Self {
            ledger: LedgerStore::new(pool.clone()),
            risk: RiskMonitor::with_nav_history(pool.clone(), nav),
            pool,
            prices,
            fee_rate: config.fee_rate,
        }
    }

    pub fn risk(&self) -> &RiskMonitor {
        &self.risk
    }

    /// Execute a trade against a portfolio.
    ///
    /// The pipeline is strictly check-then-mutate: validation, risk gate,
    /// and sufficiency checks all run before the aggregate is touched, and
    /// the resulting mutation lands in one ledger transaction. Any error
    /// return therefore guarantees the stored portfolio is unchanged.
    pub async fn execute_trade(
        &self,
        request: &TradeRequest,
    ) -> Result<TradeRecord, ExecutionError> {
        request.validate()?;

        let mut portfolio = self
            .ledger
            .load_portfolio(request.portfolio_id)
            .await?
            .ok_or(ExecutionError::NotFound {
                entity: "portfolio",
                id: request.portfolio_id,
            })?;

        let proposed = ProposedTrade {
            symbol: request.symbol.clone(),
            side: request.side,
            quantity: request.quantity,
            price: request.price,
        };
        let violations = self.risk.check_trade_risk(&portfolio, &proposed).await?;
        if !violations.is_empty() {
            return Err(ExecutionError::RiskViolation {
                reasons: violations,
            });
        }

        let amount = request.quantity * request.price;
        let fee = amount * self.fee_rate;
        let net_amount = amount - fee;

        let (realized_pnl, position_change) = match request.side {
            TradeSide::Buy => {
                if portfolio.cash_balance < net_amount {
                    return Err(ExecutionError::InsufficientFunds {
                        required: net_amount,
                        available: portfolio.cash_balance,
                    });
                }
                portfolio.cash_balance -= net_amount;
                let change = match portfolio.position_mut(&request.symbol) {
                    Some(position) => {
                        position.add(request.quantity, request.price);
                        position.mark(request.price);
                        PositionChange::Update(position.clone())
                    }
                    None => {
                        let position = Position::open(
                            portfolio.id,
                            &request.symbol,
                            request.quantity,
                            request.price,
                        );
                        portfolio.positions.push(position.clone());
                        PositionChange::Create(position)
                    }
                };
                (0.0, change)
            }
            TradeSide::Sell => {
                let held = portfolio
                    .position(&request.symbol)
                    .map(|p| p.quantity)
                    .unwrap_or(0.0);
                if held < request.quantity {
                    return Err(ExecutionError::InsufficientHoldings {
                        requested: request.quantity,
                        held,
                    });
                }
                portfolio.cash_balance += net_amount;

                // The holdings check above guarantees the position exists.
                let Some(position) = portfolio.position_mut(&request.symbol) else {
                    return Err(ExecutionError::InsufficientHoldings {
                        requested: request.quantity,
                        held: 0.0,
                    });
                };
                let realized = position.realized_on_sale(request.quantity, request.price);
                position.realized_pnl += realized;
                position.mark(request.price);
                position.reduce(request.quantity);

                let change = if position.is_flat() {
                    let id = position.id.ok_or_else(|| {
                        DatabaseError::QueryError("closing a position without a row id".to_string())
                    })?;
                    // Drop the flat row from the aggregate so the value
                    // snapshot below matches what will be stored.
                    portfolio.positions.retain(|p| p.id != Some(id));
                    PositionChange::Delete { id }
                } else {
                    PositionChange::Update(position.clone())
                };
                (realized, change)
            }
        };

        let commit = TradeCommit {
            trade: CreateTrade {
                portfolio_id: request.portfolio_id,
                strategy_execution_id: request.strategy_execution_id,
                symbol: request.symbol.clone(),
                side: request.side.as_str().to_string(),
                quantity: request.quantity,
                price: request.price,
                amount,
                fee,
                pnl: realized_pnl,
            },
            new_cash_balance: portfolio.cash_balance,
            new_current_value: portfolio.total_value(),
            position_change,
        };

        let trade = self.ledger.commit_trade(commit).await?;
        info!(
            trade_id = trade.id,
            portfolio_id = trade.portfolio_id,
            symbol = %trade.symbol,
            side = %trade.side,
            quantity = trade.quantity,
            price = trade.price,
            "trade executed"
        );
        Ok(trade)
    }

    /// Place an order. Limit and stop orders rest as pending; market orders
    /// execute immediately at the price source's quote and come back filled,
    /// or rejected if execution failed.
    pub async fn create_order(
        &self,
        request: &OrderRequest,
    ) -> Result<OrderRecord, ExecutionError> {
        let order = Order::new(
            request.portfolio_id,
            &request.symbol,
            request.side,
            request.order_type,
            request.quantity,
            request.price,
            request.stop_price,
            request.strategy_execution_id,
        )?;

        self.ledger
            .load_portfolio(request.portfolio_id)
            .await?
            .ok_or(ExecutionError::NotFound {
                entity: "portfolio",
                id: request.portfolio_id,
            })?;

        let record = OrderRepository::new(self.pool.clone())
            .create(CreateOrder {
                portfolio_id: order.portfolio_id,
                strategy_execution_id: order.strategy_execution_id,
                symbol: order.symbol.clone(),
                side: order.side.as_str().to_string(),
                order_type: order.order_type.as_str().to_string(),
                quantity: order.quantity,
                price: order.price,
                stop_price: order.stop_price,
            })
            .await?;

        if request.order_type == OrderType::Market {
            return self.execute_market_order(record).await;
        }

        Ok(record)
    }

    /// Cancel a resting order. Only pending orders can be cancelled; filled,
    /// cancelled, and rejected orders report an invalid-state error.
    pub async fn cancel_order(&self, order_id: i64) -> Result<OrderRecord, ExecutionError> {
        let repo = OrderRepository::new(self.pool.clone());
        let record = repo.get(order_id).await?.ok_or(ExecutionError::NotFound {
            entity: "order",
            id: order_id,
        })?;

        let mut order = Order::try_from(record)?;
        order
            .cancel()
            .map_err(|e| ExecutionError::InvalidState(e.to_string()))?;

        Ok(repo.set_status(order_id, order.status.as_str()).await?)
    }

    /// Realized performance over an optional execution-time window.
    pub async fn portfolio_performance(
        &self,
        portfolio_id: i64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<PerformanceReport, ExecutionError> {
        self.ledger
            .load_portfolio(portfolio_id)
            .await?
            .ok_or(ExecutionError::NotFound {
                entity: "portfolio",
                id: portfolio_id,
            })?;

        let trades = TradeRepository::new(self.pool.clone())
            .for_portfolio(portfolio_id, start, end)
            .await?;

        let mut total_pnl = PnL::zero();
        let mut total_fees = 0.0;
        let mut winning_trades = 0u32;
        for trade in &trades {
            let pnl = PnL::new(trade.pnl)?;
            if pnl.is_profit() {
                winning_trades += 1;
            }
            total_pnl = total_pnl + pnl;
            total_fees += trade.fee;
        }

        let total_trades = trades.len() as u32;
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };

        Ok(PerformanceReport {
            total_trades,
            winning_trades,
            win_rate,
            total_pnl: total_pnl.value(),
            total_fees,
            net_pnl: total_pnl.value() - total_fees,
        })
    }

    async fn execute_market_order(
        &self,
        record: OrderRecord,
    ) -> Result<OrderRecord, ExecutionError> {
        match self.fill_market_order(&record).await {
            Ok(filled) => Ok(filled),
            Err(e) => {
                // A failed market order must not linger as pending.
                if let Err(status_err) = OrderRepository::new(self.pool.clone())
                    .set_status(record.id, OrderStatus::Rejected.as_str())
                    .await
                {
                    error!(
                        order_id = record.id,
                        error = %status_err,
                        "failed to mark order rejected"
                    );
                }
                Err(e)
            }
        }
    }

    async fn fill_market_order(&self, record: &OrderRecord) -> Result<OrderRecord, ExecutionError> {
        let quote = self
            .prices
            .latest_price(&record.symbol)
            .await
            .ok_or_else(|| ExecutionError::PriceUnavailable {
                symbol: record.symbol.clone(),
            })?;

        let mut order = Order::try_from(record.clone())?;
        let trade_request = TradeRequest {
            portfolio_id: record.portfolio_id,
            symbol: record.symbol.clone(),
            side: order.side,
            quantity: record.quantity,
            price: quote.price,
            strategy_execution_id: record.strategy_execution_id,
        };
        self.execute_trade(&trade_request).await?;

        order.fill(record.quantity, quote.price);
        let average_fill_price = order.average_fill_price.unwrap_or(quote.price);
        let updated = OrderRepository::new(self.pool.clone())
            .record_fill(
                record.id,
                order.filled_quantity,
                average_fill_price,
                order.status.as_str(),
            )
            .await?;

        info!(
            order_id = updated.id,
            symbol = %updated.symbol,
            price = quote.price,
            "market order filled"
        );
        Ok(updated)
    }
}
