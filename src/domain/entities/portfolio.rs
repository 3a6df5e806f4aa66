use crate::domain::entities::position::Position;

/// Portfolio aggregate: cash plus the open positions loaded alongside it.
///
/// `current_value` is a denormalized snapshot refreshed by the trade
/// executor on every commit; authoritative totals always come from
/// `total_value()`. Cash is mutated exclusively by the executor's commit.
#[derive(Debug, Clone)]
pub struct Portfolio {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub initial_capital: f64,
    pub cash_balance: f64,
    pub current_value: f64,
    pub is_active: bool,
    pub positions: Vec<Position>,
}

impl Portfolio {
    /// Cash plus the market value of every open position. Pure read.
    pub fn total_value(&self) -> f64 {
        self.cash_balance + self.positions.iter().map(Position::value).sum::<f64>()
    }

    pub fn total_pnl(&self) -> f64 {
        self.total_value() - self.initial_capital
    }

    pub fn total_pnl_percentage(&self) -> f64 {
        if self.initial_capital == 0.0 {
            return 0.0;
        }
        self.total_pnl() / self.initial_capital * 100.0
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }

    pub fn position_mut(&mut self, symbol: &str) -> Option<&mut Position> {
        self.positions.iter_mut().find(|p| p.symbol == symbol)
    }
}
