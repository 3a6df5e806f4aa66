use crate::domain::errors::ValidationError;

/// Profit and Loss value object.
///
/// Unlike Price, PnL can be negative to represent losses. Values are
/// guaranteed finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct PnL(f64);

impl PnL {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        Ok(PnL(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// A win for performance-report purposes: strictly positive.
    pub fn is_profit(&self) -> bool {
        self.0 > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.0 < 0.0
    }

    pub fn zero() -> Self {
        PnL(0.0)
    }
}

impl std::fmt::Display for PnL {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 >= 0.0 {
            write!(f, "+{:.2}", self.0)
        } else {
            write!(f, "-{:.2}", self.0.abs())
        }
    }
}

impl std::ops::Add for PnL {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        // Sum of finite numbers stays finite for any realistic ledger.
        PnL(self.0 + other.0)
    }
}

impl std::ops::Sub for PnL {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        PnL(self.0 - other.0)
    }
}
