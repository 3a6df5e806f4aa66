use crate::domain::value_objects::averaging::weighted_average;

/// Per-(portfolio, symbol) holding with weighted-average cost basis.
///
/// Invariant: `quantity` and `average_price` are both zero or both positive.
/// A reduce that empties the position resets the cost basis, so a later buy
/// behaves exactly like a first-ever buy.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: Option<i64>,
    pub portfolio_id: i64,
    pub symbol: String,
    pub quantity: f64,
    pub average_price: f64,
    pub current_price: f64,
    pub realized_pnl: f64,
}

impl Position {
    /// Open a fresh position from a first buy. The mark price is seeded with
    /// the execution price.
    pub fn open(portfolio_id: i64, symbol: &str, quantity: f64, price: f64) -> Self {
        Position {
            id: None,
            portfolio_id,
            symbol: symbol.to_string(),
            quantity,
            average_price: price,
            current_price: price,
            realized_pnl: 0.0,
        }
    }

    /// Add a bought lot, recomputing the volume-weighted average cost.
    /// Positivity of inputs is the execution engine's responsibility.
    pub fn add(&mut self, quantity: f64, price: f64) {
        self.average_price = weighted_average(self.quantity, self.average_price, quantity, price);
        self.quantity += quantity;
    }

    /// Reduce the holding after a sell. The average cost is untouched on a
    /// partial reduce and reset to zero on a full close. Realized P&L for
    /// the reduced portion must be computed from the pre-reduction average
    /// cost before calling this (see `realized_on_sale`).
    pub fn reduce(&mut self, quantity: f64) {
        if quantity >= self.quantity {
            self.quantity = 0.0;
            self.average_price = 0.0;
        } else {
            self.quantity -= quantity;
        }
    }

    /// Realized P&L of selling `quantity` units at `price` against the
    /// current cost basis.
    pub fn realized_on_sale(&self, quantity: f64, price: f64) -> f64 {
        (price - self.average_price) * quantity
    }

    /// Update the mark price. P&L stays derived, nothing else changes.
    pub fn mark(&mut self, price: f64) {
        self.current_price = price;
    }

    /// Market value at the current mark.
    pub fn value(&self) -> f64 {
        self.quantity * self.current_price
    }

    /// Paper gain/loss against the cost basis, recomputed on every read.
    pub fn unrealized_pnl(&self) -> f64 {
        (self.current_price - self.average_price) * self.quantity
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(quantity: f64, price: f64) -> Position {
        Position::open(1, "AAPL", quantity, price)
    }

    #[test]
    fn test_open_seeds_cost_and_mark() {
        let p = pos(10.0, 150.0);
        assert_eq!(p.quantity, 10.0);
        assert_eq!(p.average_price, 150.0);
        assert_eq!(p.current_price, 150.0);
        assert_eq!(p.realized_pnl, 0.0);
    }

    #[test]
    fn test_add_reweights_average_cost() {
        let mut p = pos(10.0, 150.0);
        p.add(10.0, 160.0);
        assert_eq!(p.quantity, 20.0);
        assert_eq!(p.average_price, 155.0);
    }

    #[test]
    fn test_buy_sequence_equals_volume_weighted_mean() {
        let buys = [(10.0, 150.0), (5.0, 130.0), (20.0, 171.5), (1.0, 99.0)];
        let mut p = pos(buys[0].0, buys[0].1);
        for (q, price) in &buys[1..] {
            p.add(*q, *price);
        }
        let total_cost: f64 = buys.iter().map(|(q, pr)| q * pr).sum();
        let total_qty: f64 = buys.iter().map(|(q, _)| q).sum();
        assert!((p.average_price - total_cost / total_qty).abs() < 1e-9);
        assert_eq!(p.quantity, total_qty);
    }

    #[test]
    fn test_partial_reduce_keeps_average_cost() {
        let mut p = pos(20.0, 155.0);
        p.reduce(15.0);
        assert_eq!(p.quantity, 5.0);
        assert_eq!(p.average_price, 155.0);
    }

    #[test]
    fn test_full_close_resets_cost_basis() {
        let mut p = pos(10.0, 150.0);
        p.reduce(10.0);
        assert_eq!(p.quantity, 0.0);
        assert_eq!(p.average_price, 0.0);
        assert!(p.is_flat());
    }

    #[test]
    fn test_over_reduce_clamps_to_flat() {
        let mut p = pos(10.0, 150.0);
        p.reduce(25.0);
        assert_eq!(p.quantity, 0.0);
        assert_eq!(p.average_price, 0.0);
    }

    #[test]
    fn test_rebuy_after_full_close_acts_like_first_buy() {
        let mut p = pos(10.0, 150.0);
        p.reduce(10.0);
        p.add(4.0, 200.0);
        assert_eq!(p.quantity, 4.0);
        assert_eq!(p.average_price, 200.0);
    }

    #[test]
    fn test_realized_on_sale_uses_pre_reduction_basis() {
        let mut p = pos(20.0, 155.0);
        let realized = p.realized_on_sale(15.0, 170.0);
        assert_eq!(realized, 225.0); // (170 - 155) * 15
        p.realized_pnl += realized;
        p.reduce(15.0);
        assert_eq!(p.quantity, 5.0);
        assert_eq!(p.realized_pnl, 225.0);
    }

    #[test]
    fn test_unrealized_pnl_derived_from_mark() {
        let mut p = pos(10.0, 150.0);
        p.mark(162.5);
        assert_eq!(p.value(), 1625.0);
        assert_eq!(p.unrealized_pnl(), 125.0);
    }
}
