//! Risk monitor
//!
//! Runs every active rule against a portfolio (and optionally a proposed
//! trade), persisting one alert per violation. All rules are evaluated on
//! every pass; a violation never short-circuits the rest, so the caller
//! gets the complete list of reasons and the alert log stays complete.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::domain::entities::portfolio::Portfolio;
use crate::domain::entities::risk_rule::{AlertSeverity, RiskRule};
use crate::domain::entities::trade::ProposedTrade;
use crate::domain::services::risk_evaluator::{self, NavHistory, NoNavHistory, RiskContext};
use crate::persistence::models::{CreateRiskAlert, RiskAlertRecord};
use crate::persistence::repository::{RiskAlertRepository, RiskRuleRepository, TradeRepository};
use crate::persistence::{DatabaseError, DbPool};

pub struct RiskMonitor {
    pool: DbPool,
    nav: Arc<dyn NavHistory>,
}

impl RiskMonitor {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            nav: Arc::new(NoNavHistory),
        }
    }

    pub fn with_nav_history(pool: DbPool, nav: Arc<dyn NavHistory>) -> Self {
        Self { pool, nav }
    }

    /// Gate a proposed trade. Returns the messages of every violated rule;
    /// an empty vec means the trade may proceed. Each violation is also
    /// persisted as a warning-severity alert.
    pub async fn check_trade_risk(
        &self,
        portfolio: &Portfolio,
        proposed: &ProposedTrade,
    ) -> Result<Vec<String>, DatabaseError> {
        self.run_checks(portfolio, Some(proposed), AlertSeverity::Warning)
            .await
    }

    /// Passive portfolio scan with no trade in flight (daily loss, drawdown,
    /// anything not tied to a proposal). Violations are persisted at error
    /// severity since they describe the portfolio itself, not a rejected
    /// intent.
    pub async fn check_portfolio_risk(
        &self,
        portfolio: &Portfolio,
    ) -> Result<Vec<String>, DatabaseError> {
        self.run_checks(portfolio, None, AlertSeverity::Error).await
    }

    async fn run_checks(
        &self,
        portfolio: &Portfolio,
        proposed: Option<&ProposedTrade>,
        severity: AlertSeverity,
    ) -> Result<Vec<String>, DatabaseError> {
        let rules: Vec<RiskRule> = RiskRuleRepository::new(self.pool.clone())
            .active()
            .await?
            .into_iter()
            .map(RiskRule::from)
            .collect();

        if rules.is_empty() {
            return Ok(Vec::new());
        }

        let trades_today = TradeRepository::new(self.pool.clone())
            .count_on_day(portfolio.id, Utc::now())
            .await?;

        let ctx = RiskContext {
            portfolio,
            proposed,
            trades_today,
            nav: self.nav.as_ref(),
        };

        let alerts = RiskAlertRepository::new(self.pool.clone());
        let mut violations = Vec::new();
        for rule in &rules {
            let (violated, reason) = risk_evaluator::evaluate(rule, &ctx);
            if !violated {
                continue;
            }
            let message = reason.unwrap_or_else(|| format!("rule '{}' violated", rule.name));
            warn!(
                rule = %rule.name,
                portfolio_id = portfolio.id,
                %message,
                "risk rule violated"
            );
            alerts
                .create(CreateRiskAlert {
                    risk_rule_id: rule.id,
                    portfolio_id: portfolio.id,
                    severity: severity.as_str().to_string(),
                    message: message.clone(),
                })
                .await?;
            violations.push(message);
        }

        Ok(violations)
    }

    /// Unresolved alerts, optionally scoped to one portfolio.
    pub async fn active_alerts(
        &self,
        portfolio_id: Option<i64>,
    ) -> Result<Vec<RiskAlertRecord>, DatabaseError> {
        RiskAlertRepository::new(self.pool.clone())
            .active(portfolio_id)
            .await
    }

    pub async fn resolve_alert(&self, id: i64) -> Result<RiskAlertRecord, DatabaseError> {
        RiskAlertRepository::new(self.pool.clone()).resolve(id).await
    }
}
