use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quantfolio::config::EngineConfig;
use quantfolio::domain::repositories::price_source::StaticPriceSource;
use quantfolio::domain::services::trade_executor::TradeExecutor;
use quantfolio::persistence::ledger::LedgerStore;
use quantfolio::persistence::models::CreatePortfolio;
use quantfolio::persistence::repository::PortfolioRepository;
use quantfolio::persistence::{init_database, DbPool};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // .env is optional; environment variables win either way.
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quantfolio=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env();
    info!(
        database_url = %config.database_url,
        fee_rate = config.fee_rate,
        "starting trade engine"
    );

    let pool = init_database(&config.database_url).await?;
    let portfolio_id = ensure_default_portfolio(&pool, &config).await?;

    let prices = Arc::new(
        StaticPriceSource::new()
            .with_price("AAPL", 150.0)
            .with_price("MSFT", 300.0),
    );
    let executor = TradeExecutor::new(pool.clone(), &config, prices);

    if let Some(portfolio) = LedgerStore::new(pool.clone())
        .load_portfolio(portfolio_id)
        .await?
    {
        info!(
            portfolio_id,
            cash_balance = portfolio.cash_balance,
            total_value = portfolio.total_value(),
            total_pnl = portfolio.total_pnl(),
            total_pnl_pct = portfolio.total_pnl_percentage(),
            open_positions = portfolio.positions.len(),
            "portfolio valuation"
        );
    }

    let report = executor
        .portfolio_performance(portfolio_id, None, None)
        .await?;
    info!(
        portfolio_id,
        total_trades = report.total_trades,
        win_rate = report.win_rate,
        net_pnl = report.net_pnl,
        "portfolio performance"
    );

    let alerts = executor.risk().active_alerts(Some(portfolio_id)).await?;
    if !alerts.is_empty() {
        warn!(count = alerts.len(), "unresolved risk alerts");
        for alert in &alerts {
            warn!(
                alert_id = alert.id,
                severity = %alert.severity,
                message = %alert.message,
                "active risk alert"
            );
        }
    }

    info!("engine ready");
    Ok(())
}

/// Use the first portfolio of the configured user, creating one on an empty
/// database so the engine always has something to operate on.
async fn ensure_default_portfolio(
    pool: &DbPool,
    config: &EngineConfig,
) -> Result<i64, Box<dyn std::error::Error>> {
    let repo = PortfolioRepository::new(pool.clone());
    let existing = repo.list_for_user(config.default_user_id).await?;
    if let Some(first) = existing.first() {
        return Ok(first.id);
    }

    let created = repo
        .create(CreatePortfolio {
            user_id: config.default_user_id,
            name: "default".to_string(),
            description: Some("created on first start".to_string()),
            initial_capital: 10000.0,
        })
        .await?;
    info!(portfolio_id = created.id, "created default portfolio");
    Ok(created.id)
}
