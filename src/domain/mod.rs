//! Domain Layer - Core data types and pure logic
//!
//! No I/O happens here; everything external goes through the ports layer.
//!
//! - `quote`: normalized market record and its invariants
//! - `price_table`: USD-anchored crypto prices and fiat rates
//! - `converter`: conversion arithmetic over a price table
//! - `sentiment`: fear/greed reading and buckets

pub mod quote;
pub mod price_table;
pub mod converter;
pub mod sentiment;

pub use quote::{retain_valid, Quote, QuoteError, SourceTag, Volume, USD_ANCHOR};
pub use price_table::{CryptoPriceTable, FiatRateTable};
pub use converter::{convert, parse_amount, Conversion, ConversionError, ConversionTable};
pub use sentiment::{SentimentClass, SentimentReading, SentimentSample};
