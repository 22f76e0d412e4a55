//! Converter Engine
//!
//! Pure conversion arithmetic over a price table. The engine only reads tables;
//! replacing them is the refresh pipeline's job.
//!
//! - Crypto (USD per unit): `amount * price[from] / price[to]`
//! - Fiat (units per USD): `amount / rate[from] * rate[to]`

use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::price_table::{CryptoPriceTable, FiatRateTable};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),
    #[error("Conversion overflowed")]
    Overflow,
    #[error("Prices not available yet")]
    TableUnavailable,
}

/// Parse a user-supplied amount. Must be a positive number.
pub fn parse_amount(input: &str) -> Result<Decimal, ConversionError> {
    let trimmed = input.trim();
    let amount = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| ConversionError::InvalidAmount(input.to_string()))?;

    ensure_positive(amount)
}

fn ensure_positive(amount: Decimal) -> Result<Decimal, ConversionError> {
    if amount <= Decimal::ZERO {
        return Err(ConversionError::InvalidAmount(amount.to_string()));
    }
    Ok(amount)
}

/// A table the engine can convert against
pub trait ConversionTable {
    /// Table value for a key (case-insensitive)
    fn lookup(&self, key: &str) -> Option<Decimal>;

    /// Apply the table's anchor convention. `None` on overflow.
    fn apply(amount: Decimal, from: Decimal, to: Decimal) -> Option<Decimal>;

    /// Decimal places used when presenting a result
    fn display_scale(&self) -> u32;

    fn convert(&self, amount: Decimal, from: &str, to: &str) -> Result<Decimal, ConversionError> {
        let amount = ensure_positive(amount)?;
        let from_value = self
            .lookup(from)
            .ok_or_else(|| ConversionError::UnknownAsset(from.to_string()))?;
        let to_value = self
            .lookup(to)
            .ok_or_else(|| ConversionError::UnknownAsset(to.to_string()))?;

        Self::apply(amount, from_value, to_value).ok_or(ConversionError::Overflow)
    }
}

impl ConversionTable for CryptoPriceTable {
    fn lookup(&self, key: &str) -> Option<Decimal> {
        self.price(key)
    }

    fn apply(amount: Decimal, from: Decimal, to: Decimal) -> Option<Decimal> {
        amount.checked_mul(from)?.checked_div(to)
    }

    fn display_scale(&self) -> u32 {
        6
    }
}

impl ConversionTable for FiatRateTable {
    fn lookup(&self, key: &str) -> Option<Decimal> {
        self.rate(key)
    }

    fn apply(amount: Decimal, from: Decimal, to: Decimal) -> Option<Decimal> {
        amount.checked_div(from)?.checked_mul(to)
    }

    fn display_scale(&self) -> u32 {
        2
    }
}

/// `convert(amount, from, to, table)`
pub fn convert<T: ConversionTable>(
    amount: Decimal,
    from: &str,
    to: &str,
    table: &T,
) -> Result<Decimal, ConversionError> {
    table.convert(amount, from, to)
}

/// A finished conversion, ready for display
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub amount: Decimal,
    pub from: String,
    pub to: String,
    pub result: Decimal,
    pub scale: u32,
}

impl Conversion {
    pub fn compute<T: ConversionTable>(
        amount: Decimal,
        from: &str,
        to: &str,
        table: &T,
    ) -> Result<Self, ConversionError> {
        let result = table.convert(amount, from, to)?;
        Ok(Self {
            amount,
            from: from.to_string(),
            to: to.to_string(),
            result,
            scale: table.display_scale(),
        })
    }

    pub fn rounded(&self) -> Decimal {
        self.result.round_dp(self.scale)
    }
}

impl fmt::Display for Conversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} = {:.*} {}",
            self.amount.normalize(),
            self.from.to_uppercase(),
            self.scale as usize,
            self.rounded(),
            self.to.to_uppercase()
        )
    }
}
