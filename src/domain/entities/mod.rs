pub mod order;
pub mod portfolio;
pub mod position;
pub mod risk_rule;
pub mod trade;
