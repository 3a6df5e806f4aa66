pub mod risk_evaluator;
pub mod risk_monitor;
pub mod trade_executor;
