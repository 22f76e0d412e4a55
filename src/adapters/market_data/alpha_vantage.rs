//! Alpha Vantage equity quotes
//!
//! One `GLOBAL_QUOTE` request per symbol. The free tier answers `{}` or a
//! `Note` message instead of an error status when throttled, so those are
//! treated as "no data" for that symbol rather than a transport failure.

use std::collections::HashMap;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::{Quote, Volume};
use crate::ports::fetcher::{HttpFetch, Provider, ProviderRequest, RawPayload};
use crate::ports::source::{AdapterError, SourceAdapter};
use super::numbers::loose_f64;

pub const ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co/query";

/// Keys the provider uses for throttle and error messages
const MESSAGE_KEYS: [&str; 3] = ["Note", "Information", "Error Message"];

#[derive(Debug, Clone)]
pub struct AlphaVantageAdapter {
    base_url: String,
    api_key: Option<String>,
    symbols: Vec<String>,
    company_names: HashMap<String, String>,
}

impl AlphaVantageAdapter {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            symbols: Vec::new(),
            company_names: HashMap::new(),
        }
    }

    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols = symbols.into_iter().map(|s| s.into().to_uppercase()).collect();
        self
    }

    pub fn with_company_names(mut self, names: HashMap<String, String>) -> Self {
        self.company_names = names
            .into_iter()
            .map(|(symbol, name)| (symbol.to_uppercase(), name))
            .collect();
        self
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// `GLOBAL_QUOTE` request. The key is omitted when none is configured
    /// (e.g. when pointed at the proxy, which adds its own).
    pub fn request_for(&self, symbol: &str) -> ProviderRequest {
        let request = ProviderRequest::new(Provider::AlphaVantage, self.base_url.clone())
            .with_query("function", "GLOBAL_QUOTE")
            .with_query("symbol", symbol);

        match &self.api_key {
            Some(key) => request.with_query("apikey", key.clone()),
            None => request,
        }
    }

    fn display_name(&self, symbol: &str) -> String {
        self.company_names
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| symbol.to_string())
    }

    /// Normalize the answer for one requested symbol
    pub fn normalize_symbol(&self, requested: &str, payload: &RawPayload) -> Result<Quote, AdapterError> {
        let body: Map<String, Value> = payload.json()?;

        if body.is_empty() {
            return Err(AdapterError::NoData(format!("{}: empty response", requested)));
        }

        for key in MESSAGE_KEYS {
            if let Some(message) = body.get(key).and_then(Value::as_str) {
                return Err(AdapterError::NoData(format!("{}: {}", requested, message)));
            }
        }

        let fields = match body.get("Global Quote").and_then(Value::as_object) {
            Some(fields) if !fields.is_empty() => fields,
            _ => return Err(AdapterError::NoData(format!("{}: empty quote", requested))),
        };

        let symbol = fields
            .get("01. symbol")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(requested)
            .to_uppercase();

        let price = fields
            .get("05. price")
            .and_then(loose_f64)
            .ok_or_else(|| AdapterError::NoData(format!("{}: no price", symbol)))?;
        let change = fields
            .get("10. change percent")
            .and_then(loose_f64)
            .ok_or_else(|| AdapterError::NoData(format!("{}: no change percent", symbol)))?;

        let mut quote = Quote::new(symbol.clone(), self.display_name(&symbol))
            .with_price(price)
            .with_change_percent(change);

        if let Some(volume) = fields.get("06. volume").and_then(loose_f64) {
            quote = quote.with_volume(Volume::Units(volume));
        }

        quote
            .validate()
            .map_err(|e| AdapterError::Malformed(e.to_string()))?;
        Ok(quote)
    }
}

impl Default for AlphaVantageAdapter {
    fn default() -> Self {
        Self::new(ALPHA_VANTAGE_URL, None)
    }
}

#[async_trait]
impl SourceAdapter for AlphaVantageAdapter {
    type Record = Quote;

    fn name(&self) -> &'static str {
        "alpha_vantage"
    }

    /// Request for the first configured symbol
    fn request(&self) -> ProviderRequest {
        let symbol = self.symbols.first().map(String::as_str).unwrap_or_default();
        self.request_for(symbol)
    }

    fn normalize(&self, payload: &RawPayload) -> Result<Vec<Quote>, AdapterError> {
        let requested = self.symbols.first().map(String::as_str).unwrap_or_default();
        self.normalize_symbol(requested, payload).map(|q| vec![q])
    }

    /// One request per symbol, in order. Failed symbols are skipped.
    async fn pull(&self, fetcher: &dyn HttpFetch) -> Result<Vec<Quote>, AdapterError> {
        let mut quotes = Vec::with_capacity(self.symbols.len());
        let mut last_error = None;

        for symbol in &self.symbols {
            let result = match fetcher.fetch(self.request_for(symbol)).await {
                Ok(payload) => self.normalize_symbol(symbol, &payload),
                Err(e) => Err(AdapterError::from(e)),
            };

            match result {
                Ok(quote) => quotes.push(quote),
                Err(e) => {
                    tracing::warn!("alpha_vantage: skipping {}: {}", symbol, e);
                    last_error = Some(e);
                }
            }
        }

        if quotes.is_empty() {
            return Err(match last_error {
                Some(AdapterError::Fetch(e)) => AdapterError::Fetch(e),
                Some(e) => AdapterError::NoData(format!("no symbol returned data (last: {})", e)),
                None => AdapterError::NoData("no symbols configured".to_string()),
            });
        }

        tracing::debug!("alpha_vantage: {}/{} symbols", quotes.len(), self.symbols.len());
        Ok(quotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::ScriptedFetch;
    use crate::ports::FetchError;

    const AAPL: &str = r#"{
        "Global Quote": {
            "01. symbol": "AAPL",
            "02. open": "189.0000",
            "05. price": "190.1200",
            "06. volume": "51234567",
            "07. latest trading day": "2024-05-10",
            "09. change": "1.5400",
            "10. change percent": "0.8166%"
        }
    }"#;

    const MSFT: &str = r#"{
        "Global Quote": {
            "01. symbol": "MSFT",
            "05. price": "410.5000",
            "06. volume": "20000000",
            "10. change percent": "-0.2500%"
        }
    }"#;

    fn adapter() -> AlphaVantageAdapter {
        let names = HashMap::from([("AAPL".to_string(), "Apple Inc.".to_string())]);
        AlphaVantageAdapter::new(ALPHA_VANTAGE_URL, Some("demo-key".into()))
            .with_symbols(["AAPL", "XYZ", "MSFT"])
            .with_company_names(names)
    }

    fn payload(body: &str) -> RawPayload {
        RawPayload::ok(Provider::AlphaVantage, body)
    }

    #[test]
    fn test_request_includes_key_when_configured() {
        let req = adapter().request_for("AAPL");
        assert_eq!(req.query_value("function"), Some("GLOBAL_QUOTE"));
        assert_eq!(req.query_value("symbol"), Some("AAPL"));
        assert_eq!(req.query_value("apikey"), Some("demo-key"));

        let keyless = AlphaVantageAdapter::default().request_for("AAPL");
        assert_eq!(keyless.query_value("apikey"), None);
    }

    #[test]
    fn test_normalize_global_quote() {
        let quote = adapter().normalize_symbol("AAPL", &payload(AAPL)).unwrap();
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.display_name, "Apple Inc.");
        assert_eq!(quote.price, Some(190.12));
        assert_eq!(quote.change_percent, Some(0.8166));
        assert_eq!(quote.volume, Some(Volume::Units(51_234_567.0)));
    }

    #[test]
    fn test_unknown_company_uses_ticker() {
        let quote = adapter().normalize_symbol("MSFT", &payload(MSFT)).unwrap();
        assert_eq!(quote.display_name, "MSFT");
        assert_eq!(quote.change_percent, Some(-0.25));
    }

    #[test]
    fn test_empty_object_is_no_data() {
        let err = adapter().normalize_symbol("XYZ", &payload("{}")).unwrap_err();
        assert!(matches!(err, AdapterError::NoData(msg) if msg.contains("XYZ")));
    }

    #[test]
    fn test_empty_global_quote_is_no_data() {
        let err = adapter()
            .normalize_symbol("XYZ", &payload(r#"{"Global Quote": {}}"#))
            .unwrap_err();
        assert!(matches!(err, AdapterError::NoData(_)));
    }

    #[test]
    fn test_throttle_note_is_no_data() {
        let body = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute"}"#;
        let err = adapter().normalize_symbol("AAPL", &payload(body)).unwrap_err();
        assert!(matches!(err, AdapterError::NoData(msg) if msg.contains("5 calls per minute")));
    }

    #[test]
    fn test_non_object_is_malformed() {
        let err = adapter().normalize_symbol("AAPL", &payload("[1,2]")).unwrap_err();
        assert!(matches!(err, AdapterError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_pull_skips_symbol_without_data() {
        let fetcher = ScriptedFetch::new()
            .with_symbol_response(Provider::AlphaVantage, "AAPL", AAPL)
            .with_symbol_response(Provider::AlphaVantage, "XYZ", "{}")
            .with_symbol_response(Provider::AlphaVantage, "MSFT", MSFT);

        let quotes = adapter().pull(&fetcher).await.unwrap();

        assert_eq!(fetcher.calls_to(Provider::AlphaVantage), 3);
        let symbols: Vec<_> = quotes.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
    }

    #[tokio::test]
    async fn test_pull_all_failed_is_error() {
        let fetcher = ScriptedFetch::new().with_response(Provider::AlphaVantage, "{}");
        let err = adapter().pull(&fetcher).await.unwrap_err();
        assert!(matches!(err, AdapterError::NoData(_)));
    }

    #[tokio::test]
    async fn test_pull_all_network_failures_keep_fetch_error() {
        let fetcher = ScriptedFetch::new().with_error(
            Provider::AlphaVantage,
            FetchError::Network {
                provider: Provider::AlphaVantage,
                message: "dns".into(),
            },
        );
        let err = adapter().pull(&fetcher).await.unwrap_err();
        assert!(err.is_network());
    }
}
