//! Quote
//!
//! Normalized price/change/volume record for one symbol within one refresh cycle.
//! Every adapter produces these, the aggregator merges them and the render sink
//! receives them as read-only rows.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Key of the synthetic USD quote the crypto adapter injects
pub const USD_ANCHOR: &str = "usd";

/// Which side of a merge a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Primary,
    Fallback,
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceTag::Primary => write!(f, "primary"),
            SourceTag::Fallback => write!(f, "fallback"),
        }
    }
}

/// Traded volume, either numeric or the provider's own preformatted text ("1.2M")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Volume {
    Units(f64),
    Display(String),
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Volume::Units(units) => write!(f, "{}", units),
            Volume::Display(text) => write!(f, "{}", text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuoteError {
    #[error("quote has an empty symbol")]
    EmptySymbol,
    #[error("{symbol}: {field} is not a finite number")]
    NonFinite { symbol: String, field: &'static str },
    #[error("{symbol}: negative price {price}")]
    NegativePrice { symbol: String, price: f64 },
}

/// One normalized market record.
///
/// `price`, `change_percent` and `volume` are optional so a merge can tell a field
/// the provider left unset apart from one it supplied. A supplied value must be finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Merge key. Provider asset id for crypto, ticker for equities.
    pub symbol: String,
    pub display_name: String,
    pub price: Option<f64>,
    pub change_percent: Option<f64>,
    pub volume: Option<Volume>,
    pub market_cap: Option<f64>,
    pub source: SourceTag,
}

impl Quote {
    pub fn new(symbol: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            display_name: display_name.into(),
            price: None,
            change_percent: None,
            volume: None,
            market_cap: None,
            source: SourceTag::Primary,
        }
    }

    /// The USD = 1 anchor every crypto listing starts with
    pub fn usd_anchor() -> Self {
        Self::new(USD_ANCHOR, "US Dollar (USD)")
            .with_price(1.0)
            .with_change_percent(0.0)
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_change_percent(mut self, change: f64) -> Self {
        self.change_percent = Some(change);
        self
    }

    pub fn with_volume(mut self, volume: Volume) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_market_cap(mut self, market_cap: f64) -> Self {
        self.market_cap = Some(market_cap);
        self
    }

    pub fn with_source(mut self, source: SourceTag) -> Self {
        self.source = source;
        self
    }

    pub fn is_anchor(&self) -> bool {
        self.symbol == USD_ANCHOR
    }

    /// Case-insensitive merge key
    pub fn key(&self) -> String {
        self.symbol.to_lowercase()
    }

    /// Check the numeric invariants. Adapters drop records that fail this.
    pub fn validate(&self) -> Result<(), QuoteError> {
        if self.symbol.trim().is_empty() {
            return Err(QuoteError::EmptySymbol);
        }

        if let Some(price) = self.price {
            if !price.is_finite() {
                return Err(self.non_finite("price"));
            }
            if price < 0.0 {
                return Err(QuoteError::NegativePrice {
                    symbol: self.symbol.clone(),
                    price,
                });
            }
        }

        if let Some(change) = self.change_percent {
            if !change.is_finite() {
                return Err(self.non_finite("change_percent"));
            }
        }

        if let Some(Volume::Units(units)) = self.volume {
            if !units.is_finite() {
                return Err(self.non_finite("volume"));
            }
        }

        if let Some(cap) = self.market_cap {
            if !cap.is_finite() {
                return Err(self.non_finite("market_cap"));
            }
        }

        Ok(())
    }

    fn non_finite(&self, field: &'static str) -> QuoteError {
        QuoteError::NonFinite {
            symbol: self.symbol.clone(),
            field,
        }
    }
}

/// Keep only quotes that pass [`Quote::validate`], logging the rest
pub fn retain_valid(quotes: Vec<Quote>, source: &str) -> Vec<Quote> {
    quotes
        .into_iter()
        .filter(|quote| match quote.validate() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("{}: dropping record: {}", source, e);
                false
            }
        })
        .collect()
}
