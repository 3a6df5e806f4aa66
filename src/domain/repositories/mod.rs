pub mod price_source;
