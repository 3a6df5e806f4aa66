use crate::domain::errors::ValidationError;

/// A unit quantity. Non-negative and finite by construction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Quantity(f64);

impl Quantity {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::MustBeFinite);
        }
        if value < 0.0 {
            return Err(ValidationError::MustBeNonNegative);
        }
        Ok(Quantity(value))
    }

    /// A quantity usable for trade execution: strictly positive.
    pub fn positive(value: f64) -> Result<Self, ValidationError> {
        let quantity = Self::new(value)?;
        if quantity.0 == 0.0 {
            return Err(ValidationError::MustBePositive);
        }
        Ok(quantity)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}
