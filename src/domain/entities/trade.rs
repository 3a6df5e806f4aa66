use crate::domain::errors::ValidationError;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "buy" => Ok(TradeSide::Buy),
            "sell" => Ok(TradeSide::Sell),
            other => Err(ValidationError::InvalidOrder(format!(
                "unknown trade side: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trade record status. Trades are created already completed; there is no
/// resting-trade model (resting state lives on Order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStatus {
    Completed,
    Pending,
    Cancelled,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Completed => "completed",
            TradeStatus::Pending => "pending",
            TradeStatus::Cancelled => "cancelled",
        }
    }
}

/// A trade intent under risk evaluation, before any money math has run.
#[derive(Debug, Clone)]
pub struct ProposedTrade {
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: f64,
    pub price: f64,
}

impl ProposedTrade {
    /// Gross notional value of the proposal.
    pub fn value(&self) -> f64 {
        self.quantity * self.price
    }
}
