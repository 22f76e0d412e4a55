//! Fetch port
//!
//! One HTTP GET against one provider. Pacing lives behind this trait; retries do not.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use thiserror::Error;

/// External data providers the dashboard talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Crypto market listing
    CoinGecko,
    /// Equity quotes (GLOBAL_QUOTE)
    AlphaVantage,
    /// Fear & greed index
    FearGreed,
    /// Fiat exchange rates
    Frankfurter,
    /// LLM-backed market movers scraper
    MoversScraper,
    /// Most active equities
    Fmp,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::CoinGecko => "coingecko",
            Provider::AlphaVantage => "alpha_vantage",
            Provider::FearGreed => "fear_greed",
            Provider::Frankfurter => "frankfurter",
            Provider::MoversScraper => "movers_scraper",
            Provider::Fmp => "fmp",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("{provider} returned HTTP {status}")]
    Http {
        provider: Provider,
        status: u16,
        body: String,
    },
    #[error("network error contacting {provider}: {message}")]
    Network { provider: Provider, message: String },
}

impl FetchError {
    pub fn provider(&self) -> Provider {
        match self {
            FetchError::Http { provider, .. } | FetchError::Network { provider, .. } => *provider,
        }
    }
}

/// A GET request to one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub provider: Provider,
    pub url: String,
    pub query: Vec<(String, String)>,
}

impl ProviderRequest {
    pub fn new(provider: Provider, url: impl Into<String>) -> Self {
        Self {
            provider,
            url: url.into(),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Successful (2xx) response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub provider: Provider,
    pub status: u16,
    pub body: String,
}

impl RawPayload {
    pub fn ok(provider: Provider, body: impl Into<String>) -> Self {
        Self {
            provider,
            status: 200,
            body: body.into(),
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// HTTP fetch port
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn fetch(&self, request: ProviderRequest) -> Result<RawPayload, FetchError>;
}
