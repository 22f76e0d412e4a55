//! Financial Modeling Prep most-actives list, the secondary movers source

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{retain_valid, Quote, Volume};
use crate::ports::fetcher::{Provider, ProviderRequest, RawPayload};
use crate::ports::source::{AdapterError, SourceAdapter};
use super::numbers::loose_f64;

pub const FMP_ACTIVES_URL: &str = "https://financialmodelingprep.com/api/v3/actives";

#[derive(Debug, Clone)]
pub struct FmpActivesAdapter {
    base_url: String,
    api_key: String,
}

impl FmpActivesAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveStock {
    ticker: String,
    company_name: Option<String>,
    #[serde(default)]
    price: Value,
    /// Number, or text like "(+1.25%)" on older API versions
    #[serde(default)]
    changes_percentage: Value,
    #[serde(default)]
    volume: Value,
}

impl ActiveStock {
    fn into_quote(self) -> Quote {
        let symbol = self.ticker.trim().to_uppercase();
        let name = self.company_name.unwrap_or_else(|| symbol.clone());

        let mut quote = Quote::new(symbol, name);
        if let Some(price) = loose_f64(&self.price) {
            quote = quote.with_price(price);
        }
        if let Some(change) = loose_f64(&self.changes_percentage) {
            quote = quote.with_change_percent(change);
        }
        if let Some(volume) = loose_f64(&self.volume) {
            quote = quote.with_volume(Volume::Units(volume));
        }
        quote
    }
}

#[async_trait]
impl SourceAdapter for FmpActivesAdapter {
    type Record = Quote;

    fn name(&self) -> &'static str {
        "fmp_actives"
    }

    fn request(&self) -> ProviderRequest {
        ProviderRequest::new(Provider::Fmp, self.base_url.clone()).with_query("apikey", self.api_key.clone())
    }

    fn normalize(&self, payload: &RawPayload) -> Result<Vec<Quote>, AdapterError> {
        // errors come back as 200 with {"Error Message": "..."}
        if let Ok(Value::Object(body)) = payload.json::<Value>() {
            let message = body
                .get("Error Message")
                .and_then(Value::as_str)
                .unwrap_or("unexpected object");
            return Err(AdapterError::NoData(message.to_string()));
        }

        let stocks: Vec<ActiveStock> = payload.json()?;
        let quotes = stocks.into_iter().map(ActiveStock::into_quote).collect();
        Ok(retain_valid(quotes, self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> FmpActivesAdapter {
        FmpActivesAdapter::new(FMP_ACTIVES_URL, "fmp-key")
    }

    #[test]
    fn test_request_carries_key() {
        let req = adapter().request();
        assert_eq!(req.provider, Provider::Fmp);
        assert_eq!(req.query_value("apikey"), Some("fmp-key"));
    }

    #[test]
    fn test_normalize_actives() {
        let body = r#"[
            {"ticker":"AMD","changes":2.1,"price":"160.5","changesPercentage":"1.33","companyName":"Advanced Micro Devices","volume":55000000},
            {"ticker":"f","price":12.1,"changesPercentage":"(-0.8%)","companyName":"Ford Motor"}
        ]"#;
        let quotes = adapter()
            .normalize(&RawPayload::ok(Provider::Fmp, body))
            .unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].symbol, "AMD");
        assert_eq!(quotes[0].price, Some(160.5));
        assert_eq!(quotes[0].change_percent, Some(1.33));
        assert_eq!(quotes[0].volume, Some(Volume::Units(55_000_000.0)));
        assert_eq!(quotes[1].symbol, "F");
        assert_eq!(quotes[1].change_percent, Some(-0.8));
        assert!(quotes[1].volume.is_none());
    }

    #[test]
    fn test_error_message_is_no_data() {
        let body = r#"{"Error Message": "Invalid API KEY."}"#;
        let err = adapter()
            .normalize(&RawPayload::ok(Provider::Fmp, body))
            .unwrap_err();
        assert_eq!(err, AdapterError::NoData("Invalid API KEY.".into()));
    }
}
