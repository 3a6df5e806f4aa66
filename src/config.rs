//! Configuration
//!
//! Engine settings with sane defaults, overridable from the environment.

use tracing::warn;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite connection string.
    pub database_url: String,
    /// Proportional commission charged on gross trade value.
    pub fee_rate: f64,
    /// User id that owns portfolios created by the seed path.
    pub default_user_id: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/quantfolio.db".to_string(),
            fee_rate: 0.001,
            default_user_id: 1,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the environment, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or(defaults.database_url);

        let fee_rate = match std::env::var("FEE_RATE") {
            Ok(raw) => match raw.parse::<f64>() {
                Ok(rate) if rate.is_finite() && (0.0..1.0).contains(&rate) => rate,
                _ => {
                    warn!(raw = %raw, "invalid FEE_RATE, using default");
                    defaults.fee_rate
                }
            },
            Err(_) => defaults.fee_rate,
        };

        let default_user_id = std::env::var("DEFAULT_USER_ID")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(defaults.default_user_id);

        Self {
            database_url,
            fee_rate,
            default_user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.fee_rate, 0.001);
        assert_eq!(config.database_url, "sqlite://data/quantfolio.db");
        assert_eq!(config.default_user_id, 1);
    }
}
