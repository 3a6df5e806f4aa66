//! Quantfolio Accounting Core
//!
//! Portfolio accounting, trade execution, and risk-rule evaluation for a
//! personal quantitative-trading bookkeeping system. The HTTP surface,
//! authentication, and market-data scraping live outside this crate; callers
//! supply prices and portfolio identifiers, this crate owns the ledger.

pub mod config;
pub mod domain;
pub mod persistence;
