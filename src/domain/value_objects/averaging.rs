//! Volume-weighted averaging shared by position cost basis and order fills.
//!
//! Both the position ledger (average cost after a buy) and the order
//! lifecycle (average fill price across partial fills) use the same formula;
//! keeping it in one place stops the two from drifting apart.

/// Volume-weighted average of an existing lot and an incoming fill.
///
/// `prev_qty == 0` means the incoming fill defines the average outright.
pub fn weighted_average(prev_qty: f64, prev_avg: f64, fill_qty: f64, fill_price: f64) -> f64 {
    if prev_qty <= 0.0 {
        return fill_price;
    }
    let total_qty = prev_qty + fill_qty;
    (prev_qty * prev_avg + fill_qty * fill_price) / total_qty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_fill_sets_average() {
        assert_eq!(weighted_average(0.0, 0.0, 10.0, 150.0), 150.0);
    }

    #[test]
    fn test_equal_lots_average_midpoint() {
        // (10*150 + 10*160) / 20 = 155
        assert_eq!(weighted_average(10.0, 150.0, 10.0, 160.0), 155.0);
    }

    #[test]
    fn test_unequal_lots_weighting() {
        // (30*100 + 10*140) / 40 = 110
        let avg = weighted_average(30.0, 100.0, 10.0, 140.0);
        assert!((avg - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_sequence_matches_volume_weighted_mean() {
        let fills = [(5.0, 100.0), (3.0, 120.0), (12.0, 95.0), (0.5, 200.0)];
        let mut qty = 0.0;
        let mut avg = 0.0;
        for (q, p) in fills {
            avg = weighted_average(qty, avg, q, p);
            qty += q;
        }
        let total_cost: f64 = fills.iter().map(|(q, p)| q * p).sum();
        let total_qty: f64 = fills.iter().map(|(q, _)| q).sum();
        assert!((avg - total_cost / total_qty).abs() < 1e-9);
    }
}
