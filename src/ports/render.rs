//! Render sink port
//!
//! The presentation layer is external. The refresh pipeline pushes read-only
//! snapshots through this trait and never reads anything back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::{Conversion, ConversionError, Quote, SentimentReading};

/// Visible areas the pipeline updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Crypto,
    Equities,
    Movers,
    Sentiment,
    CryptoConverter,
    FiatConverter,
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Panel::Crypto => "crypto",
            Panel::Equities => "equities",
            Panel::Movers => "movers",
            Panel::Sentiment => "sentiment",
            Panel::CryptoConverter => "crypto converter",
            Panel::FiatConverter => "fiat converter",
        };
        f.write_str(name)
    }
}

/// Price direction compared with the previous render of the same symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceMove {
    New,
    Up,
    Down,
    Unchanged,
}

impl PriceMove {
    pub fn between(previous: Option<f64>, current: Option<f64>) -> Self {
        match (previous, current) {
            (Some(old), Some(new)) if new > old => PriceMove::Up,
            (Some(old), Some(new)) if new < old => PriceMove::Down,
            (Some(_), _) | (None, None) => PriceMove::Unchanged,
            (None, Some(_)) => PriceMove::New,
        }
    }
}

/// One table row as handed to the sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRow {
    /// 1-based position in the table
    pub rank: usize,
    pub quote: Quote,
    pub movement: PriceMove,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelStatus {
    Updating,
    Updated { at: DateTime<Utc> },
    /// Prior data (if any) is still on screen
    UpdateFailed { reason: String },
}

/// Dropdown entry for a converter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetOption {
    pub key: String,
    pub label: String,
}

impl AssetOption {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

pub trait RenderSink: Send + Sync {
    /// Replace the rows of a table
    fn render_rows(&self, panel: Panel, rows: &[QuoteRow]);

    /// Show a single explanatory row in place of the table
    fn render_error(&self, panel: Panel, message: &str);

    fn render_status(&self, panel: Panel, status: &PanelStatus);

    /// Gauge value. Drawing is up to the sink.
    fn render_gauge(&self, reading: &SentimentReading);

    /// Replace a converter's dropdown entries
    fn render_options(&self, panel: Panel, options: &[AssetOption]);

    fn render_conversion(&self, panel: Panel, result: &Result<Conversion, ConversionError>);
}
