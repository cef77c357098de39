use serde::{Deserialize, Serialize};

/// Traded quantity in base currency units.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(f64);

impl Amount {
    pub fn new(value: f64) -> Result<Self, String> {
        if !value.is_finite() {
            return Err("Amount must be finite".to_string());
        }
        if value <= 0.0 {
            return Err("Amount must be positive".to_string());
        }
        Ok(Amount(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}
