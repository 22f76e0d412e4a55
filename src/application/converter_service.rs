//! Converter Service
//!
//! Answers conversion queries from the latest crypto and fiat table snapshots.

use crate::domain::{parse_amount, Conversion, ConversionError, CryptoPriceTable, FiatRateTable};
use super::table_slot::TableSlot;

/// Pair shown by the crypto converter after each refresh
pub const DEFAULT_CRYPTO_PAIR: (&str, &str) = ("bitcoin", "ethereum");
/// Pair shown by the fiat converter after each refresh
pub const DEFAULT_FIAT_PAIR: (&str, &str) = ("usd", "brl");

#[derive(Debug, Clone, Default)]
pub struct ConverterService {
    crypto: TableSlot<CryptoPriceTable>,
    fiat: TableSlot<FiatRateTable>,
}

impl ConverterService {
    pub fn new(crypto: TableSlot<CryptoPriceTable>, fiat: TableSlot<FiatRateTable>) -> Self {
        Self { crypto, fiat }
    }

    pub fn crypto_slot(&self) -> TableSlot<CryptoPriceTable> {
        self.crypto.clone()
    }

    pub fn fiat_slot(&self) -> TableSlot<FiatRateTable> {
        self.fiat.clone()
    }

    /// `amount` is user input; the amount is validated before the table is consulted
    pub async fn convert_crypto(&self, amount: &str, from: &str, to: &str) -> Result<Conversion, ConversionError> {
        let amount = parse_amount(amount)?;
        let table = self.crypto.snapshot().await.ok_or(ConversionError::TableUnavailable)?;
        Conversion::compute(amount, from, to, table.as_ref())
    }

    pub async fn convert_fiat(&self, amount: &str, from: &str, to: &str) -> Result<Conversion, ConversionError> {
        let amount = parse_amount(amount)?;
        let table = self.fiat.snapshot().await.ok_or(ConversionError::TableUnavailable)?;
        Conversion::compute(amount, from, to, table.as_ref())
    }
}
