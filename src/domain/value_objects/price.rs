use crate::domain::errors::ValidationError;

/// A per-unit price. Non-negative and finite by construction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        if value < 0.0 {
            return Err(ValidationError::MustBeNonNegative);
        }
        Ok(Price(value))
    }

    /// A price usable for trade execution: strictly positive.
    pub fn positive(value: f64) -> Result<Self, ValidationError> {
        let price = Self::new(value)?;
        if price.0 == 0.0 {
            return Err(ValidationError::MustBePositive);
        }
        Ok(price)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
