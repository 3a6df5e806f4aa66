//! Execution-path tests: rejection guarantees, the risk gate, and the order
//! lifecycle, run end to end against an in-memory database.

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::domain::entities::order::OrderType;
use crate::domain::entities::trade::TradeSide;
use crate::domain::errors::ExecutionError;
use crate::domain::repositories::price_source::StaticPriceSource;
use crate::domain::services::trade_executor::{OrderRequest, TradeExecutor, TradeRequest};
use crate::persistence::models::{CreatePortfolio, CreateRiskRule};
use crate::persistence::repository::{PortfolioRepository, RiskRuleRepository};
use crate::persistence::{init_database, DbPool};

async fn setup() -> (DbPool, i64, TradeExecutor) {
    let pool = init_database("sqlite::memory:").await.unwrap();
    let portfolio = PortfolioRepository::new(pool.clone())
        .create(CreatePortfolio {
            user_id: 1,
            name: "execution".to_string(),
            description: None,
            initial_capital: 10000.0,
        })
        .await
        .unwrap();

    let prices = Arc::new(
        StaticPriceSource::new()
            .with_price("AAPL", 150.0)
            .with_price("MSFT", 300.0),
    );
    let executor = TradeExecutor::new(pool.clone(), &EngineConfig::default(), prices);
    (pool, portfolio.id, executor)
}

fn buy(portfolio_id: i64, symbol: &str, quantity: f64, price: f64) -> TradeRequest {
    TradeRequest {
        portfolio_id,
        symbol: symbol.to_string(),
        side: TradeSide::Buy,
        quantity,
        price,
        strategy_execution_id: None,
    }
}

fn sell(portfolio_id: i64, symbol: &str, quantity: f64, price: f64) -> TradeRequest {
    TradeRequest {
        portfolio_id,
        symbol: symbol.to_string(),
        side: TradeSide::Sell,
        quantity,
        price,
        strategy_execution_id: None,
    }
}

async fn trade_count(pool: &DbPool) -> i64 {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trades")
        .fetch_one(pool)
        .await
        .unwrap();
    row.0
}

async fn cash_balance(pool: &DbPool, portfolio_id: i64) -> f64 {
    let row: (f64,) = sqlx::query_as("SELECT cash_balance FROM portfolios WHERE id = ?1")
        .bind(portfolio_id)
        .fetch_one(pool)
        .await
        .unwrap();
    row.0
}

#[tokio::test]
async fn test_invalid_quantity_rejected_before_any_lookup() {
    let (pool, portfolio_id, executor) = setup().await;

    let err = executor
        .execute_trade(&buy(portfolio_id, "AAPL", 0.0, 150.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::InvalidInput(_)));
    assert_eq!(trade_count(&pool).await, 0);
}

#[tokio::test]
async fn test_unknown_portfolio() {
    let (_pool, _portfolio_id, executor) = setup().await;

    let err = executor
        .execute_trade(&buy(9999, "AAPL", 1.0, 150.0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::NotFound {
            entity: "portfolio",
            id: 9999
        }
    ));
}

#[tokio::test]
async fn test_insufficient_funds_leaves_ledger_untouched() {
    let (pool, portfolio_id, executor) = setup().await;

    // 100 * 150 = 15000 net of fee, more than the 10000 available.
    let err = executor
        .execute_trade(&buy(portfolio_id, "AAPL", 100.0, 150.0))
        .await
        .unwrap_err();
    match err {
        ExecutionError::InsufficientFunds {
            required,
            available,
        } => {
            assert!((required - 14985.0).abs() < 1e-9);
            assert_eq!(available, 10000.0);
        }
        other => panic!("expected InsufficientFunds, got {:?}", other),
    }

    assert_eq!(trade_count(&pool).await, 0);
    assert_eq!(cash_balance(&pool, portfolio_id).await, 10000.0);
}

#[tokio::test]
async fn test_insufficient_holdings_leaves_ledger_untouched() {
    let (pool, portfolio_id, executor) = setup().await;

    executor
        .execute_trade(&buy(portfolio_id, "AAPL", 5.0, 150.0))
        .await
        .unwrap();
    let cash_after_buy = cash_balance(&pool, portfolio_id).await;

    let err = executor
        .execute_trade(&sell(portfolio_id, "AAPL", 10.0, 150.0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::InsufficientHoldings {
            requested,
            held
        } if requested == 10.0 && held == 5.0
    ));

    // Selling a symbol never held reports zero holdings.
    let err = executor
        .execute_trade(&sell(portfolio_id, "TSLA", 1.0, 100.0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::InsufficientHoldings { held, .. } if held == 0.0
    ));

    assert_eq!(trade_count(&pool).await, 1);
    assert_eq!(cash_balance(&pool, portfolio_id).await, cash_after_buy);
}

#[tokio::test]
async fn test_risk_gate_blocks_and_persists_alert() {
    let (pool, portfolio_id, executor) = setup().await;
    RiskRuleRepository::new(pool.clone())
        .create(CreateRiskRule {
            name: "size cap".to_string(),
            description: None,
            rule_type: "position_size".to_string(),
            parameters: Some(r#"{"max_position_size": 1000.0}"#.to_string()),
        })
        .await
        .unwrap();

    // 10 * 150 = 1500 > 1000: blocked.
    let err = executor
        .execute_trade(&buy(portfolio_id, "AAPL", 10.0, 150.0))
        .await
        .unwrap_err();
    match &err {
        ExecutionError::RiskViolation { reasons } => assert_eq!(reasons.len(), 1),
        other => panic!("expected RiskViolation, got {:?}", other),
    }
    assert!(err.is_rejection());
    assert_eq!(trade_count(&pool).await, 0);

    let alerts = executor.risk().active_alerts(Some(portfolio_id)).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, "warning");

    // 5 * 150 = 750 <= 1000: allowed.
    executor
        .execute_trade(&buy(portfolio_id, "AAPL", 5.0, 150.0))
        .await
        .unwrap();
    assert_eq!(trade_count(&pool).await, 1);
}

#[tokio::test]
async fn test_daily_trade_cap() {
    let (pool, portfolio_id, executor) = setup().await;
    RiskRuleRepository::new(pool.clone())
        .create(CreateRiskRule {
            name: "trade cap".to_string(),
            description: None,
            rule_type: "max_trades_per_day".to_string(),
            parameters: Some(r#"{"max_trades": 3}"#.to_string()),
        })
        .await
        .unwrap();

    for _ in 0..3 {
        executor
            .execute_trade(&buy(portfolio_id, "AAPL", 1.0, 100.0))
            .await
            .unwrap();
    }

    let err = executor
        .execute_trade(&buy(portfolio_id, "AAPL", 1.0, 100.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::RiskViolation { .. }));
    assert_eq!(trade_count(&pool).await, 3);
}

#[tokio::test]
async fn test_market_order_fills_immediately() {
    let (pool, portfolio_id, executor) = setup().await;

    let order = executor
        .create_order(&OrderRequest {
            portfolio_id,
            symbol: "AAPL".to_string(),
            side: TradeSide::Buy,
            order_type: OrderType::Market,
            quantity: 10.0,
            price: None,
            stop_price: None,
            strategy_execution_id: None,
        })
        .await
        .unwrap();

    assert_eq!(order.status, "filled");
    assert_eq!(order.filled_quantity, 10.0);
    assert_eq!(order.average_fill_price, Some(150.0));

    // The fill went through the trade pipeline.
    assert_eq!(trade_count(&pool).await, 1);
    assert!((cash_balance(&pool, portfolio_id).await - 8501.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_market_order_without_price_is_rejected() {
    let (pool, portfolio_id, executor) = setup().await;

    let err = executor
        .create_order(&OrderRequest {
            portfolio_id,
            symbol: "TSLA".to_string(),
            side: TradeSide::Buy,
            order_type: OrderType::Market,
            quantity: 1.0,
            price: None,
            stop_price: None,
            strategy_execution_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::PriceUnavailable { .. }));

    // The order row exists but was flipped to rejected, not left pending.
    let row: (String,) = sqlx::query_as("SELECT status FROM orders")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.0, "rejected");
    assert_eq!(trade_count(&pool).await, 0);
}

#[tokio::test]
async fn test_failed_market_execution_rejects_the_order() {
    let (pool, portfolio_id, executor) = setup().await;

    // 1000 * 300 is far beyond the available cash.
    let err = executor
        .create_order(&OrderRequest {
            portfolio_id,
            symbol: "MSFT".to_string(),
            side: TradeSide::Buy,
            order_type: OrderType::Market,
            quantity: 1000.0,
            price: None,
            stop_price: None,
            strategy_execution_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::InsufficientFunds { .. }));

    let row: (String,) = sqlx::query_as("SELECT status FROM orders")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.0, "rejected");
    assert_eq!(cash_balance(&pool, portfolio_id).await, 10000.0);
}

#[tokio::test]
async fn test_limit_order_rests_and_cancels() {
    let (_pool, portfolio_id, executor) = setup().await;

    let order = executor
        .create_order(&OrderRequest {
            portfolio_id,
            symbol: "AAPL".to_string(),
            side: TradeSide::Buy,
            order_type: OrderType::Limit,
            quantity: 10.0,
            price: Some(140.0),
            stop_price: None,
            strategy_execution_id: None,
        })
        .await
        .unwrap();
    assert_eq!(order.status, "pending");

    let cancelled = executor.cancel_order(order.id).await.unwrap();
    assert_eq!(cancelled.status, "cancelled");

    // Cancelling again is an invalid transition.
    let err = executor.cancel_order(order.id).await.unwrap_err();
    assert!(matches!(err, ExecutionError::InvalidState(_)));
}

#[tokio::test]
async fn test_cancel_filled_order_is_invalid() {
    let (_pool, portfolio_id, executor) = setup().await;

    let order = executor
        .create_order(&OrderRequest {
            portfolio_id,
            symbol: "AAPL".to_string(),
            side: TradeSide::Buy,
            order_type: OrderType::Market,
            quantity: 1.0,
            price: None,
            stop_price: None,
            strategy_execution_id: None,
        })
        .await
        .unwrap();
    assert_eq!(order.status, "filled");

    let err = executor.cancel_order(order.id).await.unwrap_err();
    assert!(matches!(err, ExecutionError::InvalidState(_)));
}

#[tokio::test]
async fn test_cancel_unknown_order() {
    let (_pool, _portfolio_id, executor) = setup().await;
    let err = executor.cancel_order(424242).await.unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::NotFound {
            entity: "order",
            ..
        }
    ));
}

#[tokio::test]
async fn test_limit_order_without_price_rejected_up_front() {
    let (pool, portfolio_id, executor) = setup().await;

    let err = executor
        .create_order(&OrderRequest {
            portfolio_id,
            symbol: "AAPL".to_string(),
            side: TradeSide::Buy,
            order_type: OrderType::Limit,
            quantity: 10.0,
            price: None,
            stop_price: None,
            strategy_execution_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::InvalidInput(_)));

    // Nothing was persisted for the malformed request.
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.0, 0);
}
