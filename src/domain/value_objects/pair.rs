use serde::{Deserialize, Serialize};

/// Instrument identifier in canonical `BASE-QUOTE` form (e.g. `BTC-USD`).
///
/// Currency codes are normalized to uppercase. Destination-specific symbol
/// spellings are the adapter's concern; everything inside the gateway keys on
/// this canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    base: String,
    quote: String,
}

impl Pair {
    pub fn new(base: &str, quote: &str) -> Result<Self, String> {
        let base = Self::normalize_code(base)?;
        let quote = Self::normalize_code(quote)?;
        Ok(Pair { base, quote })
    }

    /// Parse a `BASE-QUOTE` string.
    pub fn parse(symbol: &str) -> Result<Self, String> {
        match symbol.split_once('-') {
            Some((base, quote)) => Pair::new(base, quote),
            None => Err(format!(
                "Invalid pair '{}' (expected BASE-QUOTE format)",
                symbol
            )),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    fn normalize_code(code: &str) -> Result<String, String> {
        if code.is_empty() || code.len() > 10 {
            return Err(format!(
                "Invalid currency code '{}' (must be 1-10 characters)",
                code
            ));
        }
        if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!(
                "Invalid currency code '{}' (only alphanumeric allowed)",
                code
            ));
        }
        Ok(code.to_ascii_uppercase())
    }
}

impl std::fmt::Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.base, self.quote)
    }
}
