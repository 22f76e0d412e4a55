//! Dashboard
//!
//! Builds every pull from the configuration and registers it with the
//! scheduler. The fetcher and the render sink are injected so the whole
//! pipeline can run against scripted providers.

use std::sync::Arc;
use std::time::Duration;

use crate::adapters::market_data::{
    AiMoversAdapter, AlphaVantageAdapter, CoinGeckoAdapter, FearGreedAdapter, FmpActivesAdapter,
    FrankfurterAdapter,
};
use crate::config::Config;
use crate::ports::fetcher::HttpFetch;
use crate::ports::render::{Panel, RenderSink};
use super::converter_service::ConverterService;
use super::pulls::{
    CryptoConverterPull, FiatConverterPull, MoversPull, SentimentPull, TablePull,
};
use super::scheduler::{Cadence, Scheduler, SchedulerError, TriggerOutcome};
use super::table_view::TableView;

pub const CRYPTO_PULL: &str = "crypto";
pub const EQUITIES_PULL: &str = "equities";
pub const MOVERS_PULL: &str = "movers";
pub const SENTIMENT_PULL: &str = "sentiment";
pub const CRYPTO_CONVERTER_PULL: &str = "crypto_converter";
pub const FIAT_CONVERTER_PULL: &str = "fiat_converter";

pub struct Dashboard {
    scheduler: Scheduler,
    converter: ConverterService,
}

impl Dashboard {
    pub fn from_config(config: &Config, fetcher: Arc<dyn HttpFetch>, sink: Arc<dyn RenderSink>) -> Self {
        let providers = &config.providers;
        let schedule = &config.schedule;
        let cadence = |secs: u64| Cadence::every(Duration::from_secs(secs)).with_retry_after(schedule.retry_after());

        let converter = ConverterService::default();
        let mut scheduler = Scheduler::new();

        let crypto = TablePull::new(
            CRYPTO_PULL,
            CoinGeckoAdapter::new(&providers.coingecko_url, providers.crypto_table_size),
            Arc::clone(&fetcher),
            TableView::new(Panel::Crypto, Arc::clone(&sink)),
        );
        scheduler.register(Arc::new(crypto), cadence(schedule.crypto_secs));

        let alpha_vantage_key = providers.get_alpha_vantage_key();
        if alpha_vantage_key.is_none() {
            tracing::warn!(
                "No Alpha Vantage key configured; equity requests go to {} without one",
                providers.alpha_vantage_url
            );
        }
        let equities = TablePull::new(
            EQUITIES_PULL,
            AlphaVantageAdapter::new(&providers.alpha_vantage_url, alpha_vantage_key)
                .with_symbols(config.equities.symbols.iter().cloned())
                .with_company_names(config.equities.names.clone()),
            Arc::clone(&fetcher),
            TableView::new(Panel::Equities, Arc::clone(&sink)),
        );
        scheduler.register(Arc::new(equities), cadence(schedule.equities_secs));

        let mut movers = MoversPull::new(
            AiMoversAdapter::new(&config.movers.scraper_url),
            CoinGeckoAdapter::new(&providers.coingecko_url, providers.crypto_table_size),
            Arc::clone(&fetcher),
            TableView::new(Panel::Movers, Arc::clone(&sink)),
        )
        .with_fallback_limit(config.movers.fallback_limit);
        if config.movers.use_fmp {
            match providers.get_fmp_key() {
                Some(key) => movers = movers.with_secondary(FmpActivesAdapter::new(&providers.fmp_url, key)),
                None => tracing::info!("No FMP key; movers run without the most-actives list"),
            }
        }
        scheduler.register(Arc::new(movers), cadence(schedule.movers_secs));

        let sentiment = SentimentPull::new(
            FearGreedAdapter::new(&providers.fear_greed_url),
            Arc::clone(&fetcher),
            Arc::clone(&sink),
        );
        scheduler.register(Arc::new(sentiment), cadence(schedule.sentiment_secs));

        let crypto_converter = CryptoConverterPull::new(
            CoinGeckoAdapter::new(&providers.coingecko_url, providers.converter_listing_size)
                .with_pages(providers.converter_pages),
            Arc::clone(&fetcher),
            converter.crypto_slot(),
            Arc::clone(&sink),
        );
        scheduler.register(Arc::new(crypto_converter), cadence(schedule.converter_secs));

        let fiat_converter = FiatConverterPull::new(
            FrankfurterAdapter::new(&providers.frankfurter_url),
            Arc::clone(&fetcher),
            converter.fiat_slot(),
            Arc::clone(&sink),
        );
        scheduler.register(Arc::new(fiat_converter), cadence(schedule.converter_secs));

        Self { scheduler, converter }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn converter(&self) -> &ConverterService {
        &self.converter
    }

    pub async fn trigger(&self, name: &str) -> Result<TriggerOutcome, SchedulerError> {
        self.scheduler.trigger(name).await
    }

    /// Refresh every panel once
    pub async fn refresh_all(&self) -> Vec<(&'static str, TriggerOutcome)> {
        self.scheduler.run_once().await
    }
}
