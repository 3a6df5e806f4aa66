use crate::domain::entities::trade::TradeSide;
use crate::domain::errors::ValidationError;
use crate::domain::value_objects::averaging::weighted_average;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
            OrderType::Stop => "stop",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "market" => Ok(OrderType::Market),
            "limit" => Ok(OrderType::Limit),
            "stop" => Ok(OrderType::Stop),
            other => Err(ValidationError::InvalidOrder(format!(
                "unknown order type: {}",
                other
            ))),
        }
    }
}

/// Order status. `Filled`, `Cancelled`, and `Rejected` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Filled => "filled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "filled" => Ok(OrderStatus::Filled),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "rejected" => Ok(OrderStatus::Rejected),
            other => Err(ValidationError::InvalidOrder(format!(
                "unknown order status: {}",
                other
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

/// An order resting until filled, cancelled, or rejected. Market orders are
/// expected to go pending -> filled in one synchronous execution pass.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: Option<i64>,
    pub portfolio_id: i64,
    pub strategy_execution_id: Option<i64>,
    pub symbol: String,
    pub side: TradeSide,
    pub order_type: OrderType,
    pub quantity: f64,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub status: OrderStatus,
    pub filled_quantity: f64,
    pub average_fill_price: Option<f64>,
}

impl Order {
    pub fn new(
        portfolio_id: i64,
        symbol: &str,
        side: TradeSide,
        order_type: OrderType,
        quantity: f64,
        price: Option<f64>,
        stop_price: Option<f64>,
        strategy_execution_id: Option<i64>,
    ) -> Result<Self, ValidationError> {
        if symbol.is_empty() {
            return Err(ValidationError::InvalidSymbol(symbol.to_string()));
        }
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(ValidationError::MustBePositive);
        }
        if matches!(order_type, OrderType::Limit) && price.is_none() {
            return Err(ValidationError::InvalidOrder(
                "limit orders must have a price".to_string(),
            ));
        }
        if matches!(order_type, OrderType::Stop) && stop_price.is_none() {
            return Err(ValidationError::InvalidOrder(
                "stop orders must have a stop price".to_string(),
            ));
        }

        Ok(Order {
            id: None,
            portfolio_id,
            strategy_execution_id,
            symbol: symbol.to_string(),
            side,
            order_type,
            quantity,
            price,
            stop_price,
            status: OrderStatus::Pending,
            filled_quantity: 0.0,
            average_fill_price: None,
        })
    }

    pub fn remaining_quantity(&self) -> f64 {
        self.quantity - self.filled_quantity
    }

    pub fn is_fully_filled(&self) -> bool {
        self.filled_quantity >= self.quantity
    }

    /// Apply a (partial) fill. The fill is clamped to the remaining
    /// quantity, the average fill price is volume-weighted across fills,
    /// and the order flips to filled once nothing remains. Returns the
    /// quantity actually filled.
    pub fn fill(&mut self, quantity: f64, price: f64) -> f64 {
        let fill_quantity = quantity.min(self.remaining_quantity());
        let prev_filled = self.filled_quantity;
        let prev_avg = self.average_fill_price.unwrap_or(0.0);

        self.average_fill_price =
            Some(weighted_average(prev_filled, prev_avg, fill_quantity, price));
        self.filled_quantity += fill_quantity;

        if self.is_fully_filled() {
            self.status = OrderStatus::Filled;
        }

        fill_quantity
    }

    /// Cancel a resting order. Terminal states are absorbing.
    pub fn cancel(&mut self) -> Result<(), ValidationError> {
        if self.status != OrderStatus::Pending {
            return Err(ValidationError::InvalidOrder(format!(
                "cannot cancel order in status {}",
                self.status.as_str()
            )));
        }
        self.status = OrderStatus::Cancelled;
        Ok(())
    }

    pub fn reject(&mut self) {
        self.status = OrderStatus::Rejected;
    }
}
