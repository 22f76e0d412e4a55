//! Frankfurter fiat rates, relative to USD

use std::collections::BTreeMap;
use async_trait::async_trait;
use serde::Deserialize;

use crate::ports::fetcher::{Provider, ProviderRequest, RawPayload};
use crate::ports::source::{AdapterError, SourceAdapter};

pub const FRANKFURTER_URL: &str = "https://api.frankfurter.app/latest";

/// Units of `code` per one USD
#[derive(Debug, Clone, PartialEq)]
pub struct FiatRate {
    pub code: String,
    pub units_per_usd: f64,
}

impl FiatRate {
    pub fn new(code: impl Into<String>, units_per_usd: f64) -> Self {
        Self {
            code: code.into(),
            units_per_usd,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrankfurterAdapter {
    base_url: String,
}

impl FrankfurterAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for FrankfurterAdapter {
    fn default() -> Self {
        Self::new(FRANKFURTER_URL)
    }
}

#[derive(Debug, Deserialize)]
struct LatestRates {
    base: String,
    #[serde(default)]
    rates: BTreeMap<String, f64>,
}

#[async_trait]
impl SourceAdapter for FrankfurterAdapter {
    type Record = FiatRate;

    fn name(&self) -> &'static str {
        "frankfurter"
    }

    fn request(&self) -> ProviderRequest {
        ProviderRequest::new(Provider::Frankfurter, self.base_url.clone()).with_query("from", "USD")
    }

    /// USD first, then the provider's rates in code order
    fn normalize(&self, payload: &RawPayload) -> Result<Vec<FiatRate>, AdapterError> {
        let latest: LatestRates = payload.json()?;

        if !latest.base.eq_ignore_ascii_case("USD") {
            return Err(AdapterError::Malformed(format!("rates based on {}, expected USD", latest.base)));
        }
        if latest.rates.is_empty() {
            return Err(AdapterError::NoData("no rates".to_string()));
        }

        let mut rates = Vec::with_capacity(latest.rates.len() + 1);
        rates.push(FiatRate::new("USD", 1.0));
        rates.extend(
            latest
                .rates
                .into_iter()
                .filter(|(code, _)| !code.eq_ignore_ascii_case("USD"))
                .map(|(code, rate)| FiatRate::new(code, rate)),
        );
        Ok(rates)
    }
}
