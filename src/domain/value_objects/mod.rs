pub mod averaging;
pub mod pnl;
pub mod price;
pub mod quantity;
