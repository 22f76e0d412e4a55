//! Pulls
//!
//! One `Pull` per visible panel. Each run is fetch, normalize, (merge),
//! then render, strictly in that order. State is only replaced on success.

use std::sync::{Arc, Mutex, PoisonError};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use crate::adapters::market_data::{
    AiMoversAdapter, CoinGeckoAdapter, FearGreedAdapter, FmpActivesAdapter, FrankfurterAdapter,
};
use crate::domain::{Conversion, CryptoPriceTable, FiatRateTable, Quote, SentimentReading, USD_ANCHOR};
use crate::ports::fetcher::HttpFetch;
use crate::ports::render::{AssetOption, Panel, PanelStatus, RenderSink};
use crate::ports::source::{AdapterError, SourceAdapter};
use super::aggregator::{merge_with_fallback, DataOrigin};
use super::converter_service::{DEFAULT_CRYPTO_PAIR, DEFAULT_FIAT_PAIR};
use super::scheduler::{Pull, PullError, PullReport};
use super::table_slot::TableSlot;
use super::table_view::TableView;

fn failure_message(panel: Panel, error: &dyn std::fmt::Display) -> String {
    format!("Could not load {} data: {}", panel, error)
}

/// Status + error row handling for panels that are not quote tables
fn report_failure(sink: &dyn RenderSink, panel: Panel, has_data: bool, message: &str) {
    if !has_data {
        sink.render_error(panel, message);
    }
    sink.render_status(
        panel,
        &PanelStatus::UpdateFailed {
            reason: message.to_string(),
        },
    );
}

fn without_anchor(quotes: Vec<Quote>) -> Vec<Quote> {
    quotes.into_iter().filter(|q| !q.is_anchor()).collect()
}

/// Single-source quote table (crypto listing, equities)
pub struct TablePull<A> {
    name: &'static str,
    adapter: A,
    fetcher: Arc<dyn HttpFetch>,
    view: TableView,
}

impl<A> TablePull<A> {
    pub fn new(name: &'static str, adapter: A, fetcher: Arc<dyn HttpFetch>, view: TableView) -> Self {
        Self {
            name,
            adapter,
            fetcher,
            view,
        }
    }

    pub fn view(&self) -> &TableView {
        &self.view
    }
}

#[async_trait]
impl<A> Pull for TablePull<A>
where
    A: SourceAdapter<Record = Quote>,
{
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(&self) -> Result<PullReport, PullError> {
        self.view.begin();

        let result = self
            .adapter
            .pull(self.fetcher.as_ref())
            .await
            .map(without_anchor)
            .and_then(|quotes| {
                if quotes.is_empty() {
                    Err(AdapterError::NoData(format!("{} returned no rows", self.adapter.name())))
                } else {
                    Ok(quotes)
                }
            });

        match result {
            Ok(quotes) => {
                let records = quotes.len();
                self.view.show(quotes);
                Ok(PullReport::new(records))
            }
            Err(e) => {
                self.view.fail(&failure_message(self.view.panel(), &e));
                Err(e.into())
            }
        }
    }
}

/// Market movers: LLM scraper first, most-actives merged in, crypto listing as fallback
pub struct MoversPull {
    primary: AiMoversAdapter,
    secondary: Option<FmpActivesAdapter>,
    fallback: CoinGeckoAdapter,
    fallback_limit: usize,
    fetcher: Arc<dyn HttpFetch>,
    view: TableView,
}

impl MoversPull {
    pub fn new(
        primary: AiMoversAdapter,
        fallback: CoinGeckoAdapter,
        fetcher: Arc<dyn HttpFetch>,
        view: TableView,
    ) -> Self {
        Self {
            primary,
            secondary: None,
            fallback,
            fallback_limit: 10,
            fetcher,
            view,
        }
    }

    pub fn with_secondary(mut self, secondary: FmpActivesAdapter) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn with_fallback_limit(mut self, limit: usize) -> Self {
        self.fallback_limit = limit.max(1);
        self
    }

    pub fn view(&self) -> &TableView {
        &self.view
    }
}

#[async_trait]
impl Pull for MoversPull {
    fn name(&self) -> &'static str {
        "movers"
    }

    async fn run(&self) -> Result<PullReport, PullError> {
        self.view.begin();
        let fetcher = self.fetcher.as_ref();

        let primary = self.primary.pull(fetcher).await;

        // secondary only matters when there is a primary list to merge into
        let secondary = match (&primary, &self.secondary) {
            (Ok(rows), Some(adapter)) if !rows.is_empty() => adapter.pull(fetcher).await,
            _ => Ok(Vec::new()),
        };

        let limit = self.fallback_limit;
        let merged = merge_with_fallback(primary, secondary, || async move {
            let listing = self.fallback.pull(fetcher).await?;
            Ok::<Vec<Quote>, AdapterError>(without_anchor(listing).into_iter().take(limit).collect())
        })
        .await;

        match merged {
            Ok(merged) => {
                let records = merged.quotes.len();
                let origin = merged.origin;
                self.view.show(merged.quotes);
                let report = PullReport::new(records);
                Ok(match origin {
                    DataOrigin::Primary => report,
                    DataOrigin::Fallback => report.with_note("fallback: crypto listing"),
                })
            }
            Err(e) => {
                self.view.fail(&failure_message(Panel::Movers, &e));
                Err(e.into())
            }
        }
    }
}

/// Fear & Greed gauge
pub struct SentimentPull {
    adapter: FearGreedAdapter,
    fetcher: Arc<dyn HttpFetch>,
    sink: Arc<dyn RenderSink>,
    latest: Mutex<Option<SentimentReading>>,
}

impl SentimentPull {
    pub fn new(adapter: FearGreedAdapter, fetcher: Arc<dyn HttpFetch>, sink: Arc<dyn RenderSink>) -> Self {
        Self {
            adapter,
            fetcher,
            sink,
            latest: Mutex::new(None),
        }
    }

    /// Last reading shown on the gauge
    pub fn latest(&self) -> Option<SentimentReading> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Pull for SentimentPull {
    fn name(&self) -> &'static str {
        "sentiment"
    }

    async fn run(&self) -> Result<PullReport, PullError> {
        self.sink.render_status(Panel::Sentiment, &PanelStatus::Updating);

        let sample = self
            .adapter
            .pull(self.fetcher.as_ref())
            .await
            .and_then(|samples| {
                samples
                    .into_iter()
                    .next()
                    .ok_or_else(|| AdapterError::NoData("no sentiment sample".to_string()))
            });

        match sample {
            Ok(sample) => {
                let (reading, out_of_range) = SentimentReading::from_sample(&sample);
                self.sink.render_gauge(&reading);
                *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(reading);
                self.sink
                    .render_status(Panel::Sentiment, &PanelStatus::Updated { at: Utc::now() });

                let report = PullReport::new(1);
                Ok(if out_of_range {
                    report.with_note(format!("provider value {} clamped", sample.value))
                } else {
                    report
                })
            }
            Err(e) => {
                let message = failure_message(Panel::Sentiment, &e);
                report_failure(self.sink.as_ref(), Panel::Sentiment, self.latest().is_some(), &message);
                Err(e.into())
            }
        }
    }
}

/// Crypto converter table: listing to `CryptoPriceTable`, dropdowns, default pair
pub struct CryptoConverterPull {
    adapter: CoinGeckoAdapter,
    fetcher: Arc<dyn HttpFetch>,
    slot: TableSlot<CryptoPriceTable>,
    sink: Arc<dyn RenderSink>,
}

impl CryptoConverterPull {
    pub fn new(
        adapter: CoinGeckoAdapter,
        fetcher: Arc<dyn HttpFetch>,
        slot: TableSlot<CryptoPriceTable>,
        sink: Arc<dyn RenderSink>,
    ) -> Self {
        Self {
            adapter,
            fetcher,
            slot,
            sink,
        }
    }
}

#[async_trait]
impl Pull for CryptoConverterPull {
    fn name(&self) -> &'static str {
        "crypto_converter"
    }

    async fn run(&self) -> Result<PullReport, PullError> {
        let panel = Panel::CryptoConverter;
        self.sink.render_status(panel, &PanelStatus::Updating);

        let quotes = match self.adapter.pull(self.fetcher.as_ref()).await {
            Ok(quotes) => quotes,
            Err(e) => {
                let has_data = self.slot.snapshot().await.is_some();
                report_failure(self.sink.as_ref(), panel, has_data, &failure_message(panel, &e));
                return Err(e.into());
            }
        };

        let table = CryptoPriceTable::from_quotes(&quotes);
        // listing order, labelled "Name (TICKER)"
        let options: Vec<AssetOption> = quotes
            .iter()
            .filter(|q| table.contains(&q.symbol))
            .map(|q| AssetOption::new(q.key(), q.display_name.clone()))
            .collect();

        let (from, to) = DEFAULT_CRYPTO_PAIR;
        let default = Conversion::compute(Decimal::ONE, from, to, &table);
        let records = table.len();

        self.slot.replace(table).await;
        self.sink.render_options(panel, &options);
        self.sink.render_conversion(panel, &default);
        self.sink
            .render_status(panel, &PanelStatus::Updated { at: Utc::now() });

        Ok(PullReport::new(records))
    }
}

/// Fiat converter table: USD-relative rates, dropdowns, default pair
pub struct FiatConverterPull {
    adapter: FrankfurterAdapter,
    fetcher: Arc<dyn HttpFetch>,
    slot: TableSlot<FiatRateTable>,
    sink: Arc<dyn RenderSink>,
}

impl FiatConverterPull {
    pub fn new(
        adapter: FrankfurterAdapter,
        fetcher: Arc<dyn HttpFetch>,
        slot: TableSlot<FiatRateTable>,
        sink: Arc<dyn RenderSink>,
    ) -> Self {
        Self {
            adapter,
            fetcher,
            slot,
            sink,
        }
    }
}

#[async_trait]
impl Pull for FiatConverterPull {
    fn name(&self) -> &'static str {
        "fiat_converter"
    }

    async fn run(&self) -> Result<PullReport, PullError> {
        let panel = Panel::FiatConverter;
        self.sink.render_status(panel, &PanelStatus::Updating);

        let rates = match self.adapter.pull(self.fetcher.as_ref()).await {
            Ok(rates) => rates,
            Err(e) => {
                let has_data = self.slot.snapshot().await.is_some();
                report_failure(self.sink.as_ref(), panel, has_data, &failure_message(panel, &e));
                return Err(e.into());
            }
        };

        let table = FiatRateTable::from_rates(rates.iter().map(|r| (r.code.as_str(), r.units_per_usd)));
        // USD first, then alphabetical
        let options: Vec<AssetOption> = std::iter::once(USD_ANCHOR)
            .chain(table.codes().filter(|code| *code != USD_ANCHOR))
            .map(|code| AssetOption::new(code, code.to_uppercase()))
            .collect();

        let (from, to) = DEFAULT_FIAT_PAIR;
        let default = Conversion::compute(Decimal::ONE, from, to, &table);
        let records = table.len();

        self.slot.replace(table).await;
        self.sink.render_options(panel, &options);
        self.sink.render_conversion(panel, &default);
        self.sink
            .render_status(panel, &PanelStatus::Updated { at: Utc::now() });

        Ok(PullReport::new(records))
    }
}
