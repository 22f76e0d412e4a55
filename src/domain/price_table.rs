//! Price Tables
//!
//! Two anchor conventions, kept as separate types:
//! - `CryptoPriceTable`: USD per one unit of the asset (usd = 1)
//! - `FiatRateTable`: units of the currency per one USD (usd = 1)
//!
//! Tables are built wholesale from one refresh and never edited afterwards.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::quote::{Quote, USD_ANCHOR};

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

fn positive_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    Decimal::from_f64(value)
}

/// Asset-denominated table: price of one unit in USD
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CryptoPriceTable {
    prices: BTreeMap<String, Decimal>,
}

impl CryptoPriceTable {
    /// Build from a crypto listing. Quotes without a positive price are skipped,
    /// and the USD anchor is always present.
    pub fn from_quotes(quotes: &[Quote]) -> Self {
        let mut prices = BTreeMap::new();
        prices.insert(USD_ANCHOR.to_string(), Decimal::ONE);

        for quote in quotes {
            match quote.price.and_then(positive_decimal) {
                Some(price) => {
                    prices.entry(quote.key()).or_insert(price);
                }
                None => tracing::debug!("price table: skipping {} (no usable price)", quote.symbol),
            }
        }

        Self { prices }
    }

    pub fn from_prices<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Decimal)>,
        K: AsRef<str>,
    {
        let mut prices: BTreeMap<String, Decimal> = entries
            .into_iter()
            .filter(|(_, price)| *price > Decimal::ZERO)
            .map(|(key, price)| (normalize_key(key.as_ref()), price))
            .collect();
        prices.insert(USD_ANCHOR.to_string(), Decimal::ONE);
        Self { prices }
    }

    pub fn price(&self, key: &str) -> Option<Decimal> {
        self.prices.get(&normalize_key(key)).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.prices.contains_key(&normalize_key(key))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.prices.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Rate-denominated table: units of the currency per one USD
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FiatRateTable {
    rates: BTreeMap<String, Decimal>,
}

impl FiatRateTable {
    /// Build from `(currency code, units per USD)` pairs. USD is pinned to 1.
    pub fn from_rates<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut rates = BTreeMap::new();
        for (code, rate) in entries {
            match positive_decimal(rate) {
                Some(rate) => {
                    rates.insert(normalize_key(code.as_ref()), rate);
                }
                None => tracing::debug!("rate table: skipping {} (rate {})", code.as_ref(), rate),
            }
        }
        rates.insert(USD_ANCHOR.to_string(), Decimal::ONE);
        Self { rates }
    }

    pub fn rate(&self, key: &str) -> Option<Decimal> {
        self.rates.get(&normalize_key(key)).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.rates.contains_key(&normalize_key(key))
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Currency codes in sorted order
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.rates.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_crypto_table_from_quotes() {
        let quotes = vec![
            Quote::usd_anchor(),
            Quote::new("bitcoin", "Bitcoin (BTC)").with_price(65000.0),
        ];
        let table = CryptoPriceTable::from_quotes(&quotes);

        assert_eq!(table.len(), 2);
        assert_eq!(table.price("usd"), Some(dec!(1)));
        assert_eq!(table.price("bitcoin"), Some(dec!(65000)));
    }

    #[test]
    fn test_crypto_table_skips_unusable_prices() {
        let quotes = vec![
            Quote::new("zero", "Zero").with_price(0.0),
            Quote::new("missing", "Missing"),
            Quote::new("ethereum", "Ethereum").with_price(3200.0),
        ];
        let table = CryptoPriceTable::from_quotes(&quotes);

        assert!(!table.contains("zero"));
        assert!(!table.contains("missing"));
        assert!(table.contains("ethereum"));
        assert!(table.contains("usd"));
    }

    #[test]
    fn test_crypto_keys_are_case_insensitive() {
        let table = CryptoPriceTable::from_prices([("Bitcoin", dec!(65000))]);
        assert_eq!(table.price("BITCOIN"), Some(dec!(65000)));
    }

    #[test]
    fn test_fiat_table_pins_usd() {
        let table = FiatRateTable::from_rates([("EUR", 0.92), ("BRL", 5.4), ("USD", 3.0)]);
        assert_eq!(table.rate("usd"), Some(Decimal::ONE));
        let eur = table.rate("EUR").unwrap();
        assert!((eur - dec!(0.92)).abs() < dec!(0.000001));
        assert_eq!(table.codes().collect::<Vec<_>>(), vec!["brl", "eur", "usd"]);
    }

    #[test]
    fn test_fiat_table_skips_bad_rates() {
        let table = FiatRateTable::from_rates([("XXX", f64::NAN), ("YYY", -2.0)]);
        assert_eq!(table.len(), 1);
    }
}
