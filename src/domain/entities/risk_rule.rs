use serde::Deserialize;
use tracing::warn;

/// A risk rule with its parameter bag decoded into typed fields.
///
/// The stored form is a `rule_type` string plus a JSON parameter blob;
/// decoding happens once at load time so evaluation never touches raw JSON.
#[derive(Debug, Clone)]
pub struct RiskRule {
    pub id: i64,
    pub name: String,
    pub params: RuleParams,
    pub is_active: bool,
}

/// Typed parameters per rule type. Missing keys default to 0, matching the
/// stored-JSON contract where absent parameters read as zero.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleParams {
    PositionSize {
        max_position_size: f64,
        max_position_percentage: f64,
    },
    DailyLoss {
        max_daily_loss: f64,
        max_daily_loss_percentage: f64,
    },
    Drawdown {
        max_drawdown_percentage: f64,
    },
    MaxTradesPerDay {
        max_trades: u32,
    },
    /// Unrecognized rule_type or undecodable parameters. Never violates and
    /// never blocks trading.
    Unknown { rule_type: String },
}

#[derive(Debug, Default, Deserialize)]
struct PositionSizeParams {
    #[serde(default)]
    max_position_size: f64,
    #[serde(default)]
    max_position_percentage: f64,
}

#[derive(Debug, Default, Deserialize)]
struct DailyLossParams {
    #[serde(default)]
    max_daily_loss: f64,
    #[serde(default)]
    max_daily_loss_percentage: f64,
}

#[derive(Debug, Default, Deserialize)]
struct DrawdownParams {
    #[serde(default)]
    max_drawdown_percentage: f64,
}

#[derive(Debug, Default, Deserialize)]
struct MaxTradesParams {
    #[serde(default)]
    max_trades: u32,
}

impl RuleParams {
    /// Decode a stored rule_type + JSON parameter blob. A misconfigured rule
    /// must never block trading, so decode failures degrade to `Unknown`.
    pub fn decode(rule_type: &str, parameters: Option<&str>) -> Self {
        let raw = parameters.unwrap_or("{}");
        match rule_type {
            "position_size" => match serde_json::from_str::<PositionSizeParams>(raw) {
                Ok(p) => RuleParams::PositionSize {
                    max_position_size: p.max_position_size,
                    max_position_percentage: p.max_position_percentage,
                },
                Err(e) => Self::undecodable(rule_type, e),
            },
            "daily_loss" => match serde_json::from_str::<DailyLossParams>(raw) {
                Ok(p) => RuleParams::DailyLoss {
                    max_daily_loss: p.max_daily_loss,
                    max_daily_loss_percentage: p.max_daily_loss_percentage,
                },
                Err(e) => Self::undecodable(rule_type, e),
            },
            "drawdown" => match serde_json::from_str::<DrawdownParams>(raw) {
                Ok(p) => RuleParams::Drawdown {
                    max_drawdown_percentage: p.max_drawdown_percentage,
                },
                Err(e) => Self::undecodable(rule_type, e),
            },
            "max_trades_per_day" => match serde_json::from_str::<MaxTradesParams>(raw) {
                Ok(p) => RuleParams::MaxTradesPerDay {
                    max_trades: p.max_trades,
                },
                Err(e) => Self::undecodable(rule_type, e),
            },
            other => RuleParams::Unknown {
                rule_type: other.to_string(),
            },
        }
    }

    fn undecodable(rule_type: &str, e: serde_json::Error) -> Self {
        warn!(rule_type, error = %e, "undecodable risk rule parameters, treating rule as inert");
        RuleParams::Unknown {
            rule_type: rule_type.to_string(),
        }
    }

    pub fn rule_type(&self) -> &str {
        match self {
            RuleParams::PositionSize { .. } => "position_size",
            RuleParams::DailyLoss { .. } => "daily_loss",
            RuleParams::Drawdown { .. } => "drawdown",
            RuleParams::MaxTradesPerDay { .. } => "max_trades_per_day",
            RuleParams::Unknown { rule_type } => rule_type,
        }
    }
}

/// Severity attached to a persisted risk alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertSeverity {
    Warning,
    Error,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Warning => "warning",
            AlertSeverity::Error => "error",
            AlertSeverity::Critical => "critical",
        }
    }
}
