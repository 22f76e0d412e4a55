//! LLM-backed market movers scraper
//!
//! The endpoint asks a language model to read a movers page and answer with a
//! JSON array. Answers are unreliable: they may be wrapped in prose or code
//! fences, use strings for numbers, or hold a single object instead of an
//! array. Callers must pair this source with a deterministic fallback.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{retain_valid, Quote, Volume};
use crate::ports::fetcher::{Provider, ProviderRequest, RawPayload};
use crate::ports::source::{AdapterError, SourceAdapter};
use super::numbers::loose_f64;

pub const DEFAULT_SCRAPER_URL: &str = "http://localhost:8888/.netlify/functions/gemini-scraper";

/// First top-level JSON array or object in `text`.
///
/// Scans for the first `[` or `{` and returns the span up to its matching
/// closer. Brackets inside string literals (including escaped quotes) are
/// ignored. `None` when no balanced span exists.
pub fn extract_json_span(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + c.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }

    None
}

/// One scraped row. Field names follow the endpoint's prompt, with English aliases.
#[derive(Debug, Deserialize)]
struct ScrapedMover {
    #[serde(alias = "symbol", alias = "ticker")]
    simbolo: Option<String>,
    #[serde(alias = "name")]
    nombre: Option<String>,
    #[serde(default, alias = "price")]
    precio: Value,
    #[serde(default, alias = "change_percent", alias = "changePercent")]
    cambio_porcentaje: Value,
    #[serde(default, alias = "volume")]
    volumen: Value,
}

impl ScrapedMover {
    fn into_quote(self) -> Option<Quote> {
        let symbol = self.simbolo.map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty())?;
        let name = self
            .nombre
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| symbol.clone());

        let mut quote = Quote::new(symbol, name);
        if let Some(price) = loose_f64(&self.precio) {
            quote = quote.with_price(price);
        }
        if let Some(change) = loose_f64(&self.cambio_porcentaje) {
            quote = quote.with_change_percent(change);
        }
        quote.volume = match self.volumen {
            Value::Number(n) => n.as_f64().map(Volume::Units),
            Value::String(s) if !s.trim().is_empty() => Some(Volume::Display(s.trim().to_string())),
            _ => None,
        };
        Some(quote)
    }
}

#[derive(Debug, Clone)]
pub struct AiMoversAdapter {
    url: String,
}

impl AiMoversAdapter {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Default for AiMoversAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_SCRAPER_URL)
    }
}

#[async_trait]
impl SourceAdapter for AiMoversAdapter {
    type Record = Quote;

    fn name(&self) -> &'static str {
        "ai_movers"
    }

    fn request(&self) -> ProviderRequest {
        ProviderRequest::new(Provider::MoversScraper, self.url.clone())
    }

    fn normalize(&self, payload: &RawPayload) -> Result<Vec<Quote>, AdapterError> {
        let span = extract_json_span(&payload.body).ok_or_else(|| {
            let preview: String = payload.body.chars().take(80).collect();
            AdapterError::Unparseable(format!("no JSON in scraper answer: {:?}", preview))
        })?;

        let items = match serde_json::from_str::<Value>(span)? {
            Value::Array(items) => items,
            object @ Value::Object(_) => vec![object],
            other => return Err(AdapterError::Malformed(format!("unexpected JSON: {}", other))),
        };

        let quotes: Vec<Quote> = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<ScrapedMover>(item) {
                Ok(mover) => mover.into_quote(),
                Err(e) => {
                    tracing::warn!("ai_movers: skipping row: {}", e);
                    None
                }
            })
            .collect();

        let quotes = retain_valid(quotes, self.name());
        if quotes.is_empty() {
            return Err(AdapterError::NoData("scraper answer held no usable rows".to_string()));
        }
        Ok(quotes)
    }
}
