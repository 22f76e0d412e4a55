//! CoinGecko market listing
//!
//! Crypto source for the crypto table, the crypto converter and the movers
//! fallback. Records are keyed by CoinGecko's asset id ("bitcoin"), never the
//! ticker, since tickers collide. The USD anchor is always the first record.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::{retain_valid, Quote, Volume};
use crate::ports::fetcher::{HttpFetch, Provider, ProviderRequest, RawPayload};
use crate::ports::source::{AdapterError, SourceAdapter};

pub const COINGECKO_MARKETS_URL: &str = "https://api.coingecko.com/api/v3/coins/markets";

/// CoinGecko caps `per_page` at 250
const MAX_PER_PAGE: u32 = 250;

#[derive(Debug, Clone)]
pub struct CoinGeckoAdapter {
    base_url: String,
    per_page: u32,
    pages: u32,
}

impl CoinGeckoAdapter {
    pub fn new(base_url: impl Into<String>, per_page: u32) -> Self {
        Self {
            base_url: base_url.into(),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
            pages: 1,
        }
    }

    /// Fetch this many pages per pull
    pub fn with_pages(mut self, pages: u32) -> Self {
        self.pages = pages.max(1);
        self
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn request_page(&self, page: u32) -> ProviderRequest {
        ProviderRequest::new(Provider::CoinGecko, self.base_url.clone())
            .with_query("vs_currency", "usd")
            .with_query("order", "market_cap_desc")
            .with_query("per_page", self.per_page.to_string())
            .with_query("page", page.to_string())
            .with_query("sparkline", "false")
    }

    /// Listing entries without the anchor
    fn normalize_entries(&self, payload: &RawPayload) -> Result<Vec<Quote>, AdapterError> {
        let entries: Vec<MarketEntry> = payload.json()?;
        let quotes = entries.into_iter().filter_map(MarketEntry::into_quote).collect();
        Ok(retain_valid(quotes, self.name()))
    }
}

impl Default for CoinGeckoAdapter {
    fn default() -> Self {
        Self::new(COINGECKO_MARKETS_URL, 15)
    }
}

#[async_trait]
impl SourceAdapter for CoinGeckoAdapter {
    type Record = Quote;

    fn name(&self) -> &'static str {
        "coingecko"
    }

    fn request(&self) -> ProviderRequest {
        self.request_page(1)
    }

    fn normalize(&self, payload: &RawPayload) -> Result<Vec<Quote>, AdapterError> {
        let entries = self.normalize_entries(payload)?;
        let mut quotes = Vec::with_capacity(entries.len() + 1);
        quotes.push(Quote::usd_anchor());
        quotes.extend(entries);
        Ok(quotes)
    }

    async fn pull(&self, fetcher: &dyn HttpFetch) -> Result<Vec<Quote>, AdapterError> {
        let first = fetcher.fetch(self.request_page(1)).await?;
        let mut quotes = self.normalize(&first)?;
        let mut seen: HashSet<String> = quotes.iter().map(|q| q.symbol.clone()).collect();

        for page in 2..=self.pages {
            let payload = match fetcher.fetch(self.request_page(page)).await {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!("coingecko: page {} failed, keeping {} records: {}", page, quotes.len(), e);
                    break;
                }
            };

            match self.normalize_entries(&payload) {
                Ok(entries) if entries.is_empty() => break,
                Ok(entries) => {
                    for entry in entries {
                        if seen.insert(entry.symbol.clone()) {
                            quotes.push(entry);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("coingecko: page {} unreadable: {}", page, e);
                    break;
                }
            }
        }

        tracing::debug!("coingecko: {} records", quotes.len());
        Ok(quotes)
    }
}

/// One `/coins/markets` entry
#[derive(Debug, Clone, Deserialize)]
struct MarketEntry {
    id: String,
    symbol: String,
    name: String,
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    market_cap: Option<f64>,
    total_volume: Option<f64>,
    #[allow(dead_code)]
    image: Option<String>,
}

impl MarketEntry {
    /// Price and 24h change are required; entries missing either are skipped
    fn into_quote(self) -> Option<Quote> {
        let (Some(price), Some(change)) = (self.current_price, self.price_change_percentage_24h)
        else {
            tracing::debug!("coingecko: {} has no price/change, skipping", self.id);
            return None;
        };

        let display_name = format!("{} ({})", self.name, self.symbol.to_uppercase());
        let mut quote = Quote::new(self.id, display_name)
            .with_price(price)
            .with_change_percent(change);

        if let Some(volume) = self.total_volume {
            quote = quote.with_volume(Volume::Units(volume));
        }
        if let Some(cap) = self.market_cap {
            quote = quote.with_market_cap(cap);
        }
        Some(quote)
    }
}
