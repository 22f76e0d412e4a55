use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;

use super::fetcher::{FetchError, HttpFetch, Provider, ProviderRequest, RawPayload};
use super::render::{AssetOption, Panel, PanelStatus, QuoteRow, RenderSink};
use crate::domain::{Conversion, ConversionError, SentimentReading};

type Scripted = Result<RawPayload, FetchError>;

/// Fetcher that records calls and replays scripted responses.
///
/// Responses are keyed by provider, or by provider + `symbol` query value.
/// Queued responses are consumed in order; the last one sticks.
#[derive(Debug, Default, Clone)]
pub struct ScriptedFetch {
    calls: Arc<Mutex<Vec<ProviderRequest>>>,
    responses: Arc<Mutex<HashMap<String, VecDeque<Scripted>>>>,
}

fn route(provider: Provider, symbol: Option<&str>) -> String {
    match symbol {
        Some(symbol) => format!("{}:{}", provider, symbol),
        None => provider.to_string(),
    }
}

impl ScriptedFetch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to queue a 200 body for a provider
    pub fn with_response(self, provider: Provider, body: &str) -> Self {
        self.push(route(provider, None), Ok(RawPayload::ok(provider, body)))
    }

    /// Builder method to queue a 200 body for one symbol of a provider
    pub fn with_symbol_response(self, provider: Provider, symbol: &str, body: &str) -> Self {
        self.push(route(provider, Some(symbol)), Ok(RawPayload::ok(provider, body)))
    }

    /// Builder method to queue an error for a provider
    pub fn with_error(self, provider: Provider, error: FetchError) -> Self {
        self.push(route(provider, None), Err(error))
    }

    /// Replace everything scripted for a provider
    pub fn set_response(&self, provider: Provider, response: Scripted) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(route(provider, None), VecDeque::from(vec![response]));
    }

    fn push(self, key: String, response: Scripted) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(key)
            .or_default()
            .push_back(response);
        self
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<ProviderRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, provider: Provider) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.provider == provider)
            .count()
    }

    fn next_response(&self, request: &ProviderRequest) -> Scripted {
        let mut responses = self.responses.lock().unwrap();
        let keyed = request
            .query_value("symbol")
            .map(|symbol| route(request.provider, Some(symbol)))
            .filter(|key| responses.contains_key(key));
        let key = keyed.unwrap_or_else(|| route(request.provider, None));

        match responses.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Err(FetchError::Network {
                provider: request.provider,
                message: "No response configured".to_string(),
            }),
        }
    }
}

#[async_trait]
impl HttpFetch for ScriptedFetch {
    async fn fetch(&self, request: ProviderRequest) -> Result<RawPayload, FetchError> {
        self.calls.lock().unwrap().push(request.clone());
        self.next_response(&request)
    }
}

/// Everything a sink was asked to show
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Rows(Panel, Vec<QuoteRow>),
    Error(Panel, String),
    Status(Panel, PanelStatus),
    Gauge(SentimentReading),
    Options(Panel, Vec<AssetOption>),
    Conversion(Panel, Result<Conversion, ConversionError>),
}

/// Sink that records render calls
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<RenderEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Every row render for a panel, oldest first
    pub fn row_renders(&self, panel: Panel) -> Vec<Vec<QuoteRow>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RenderEvent::Rows(p, rows) if p == panel => Some(rows),
                _ => None,
            })
            .collect()
    }

    pub fn last_rows(&self, panel: Panel) -> Option<Vec<QuoteRow>> {
        self.row_renders(panel).pop()
    }

    pub fn errors(&self, panel: Panel) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RenderEvent::Error(p, message) if p == panel => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self, panel: Panel) -> Option<PanelStatus> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RenderEvent::Status(p, status) if p == panel => Some(status),
                _ => None,
            })
            .last()
    }

    pub fn last_gauge(&self) -> Option<SentimentReading> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RenderEvent::Gauge(reading) => Some(reading),
                _ => None,
            })
            .last()
    }

    pub fn last_options(&self, panel: Panel) -> Option<Vec<AssetOption>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RenderEvent::Options(p, options) if p == panel => Some(options),
                _ => None,
            })
            .last()
    }

    pub fn last_conversion(&self, panel: Panel) -> Option<Result<Conversion, ConversionError>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RenderEvent::Conversion(p, result) if p == panel => Some(result),
                _ => None,
            })
            .last()
    }

    fn record(&self, event: RenderEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl RenderSink for RecordingSink {
    fn render_rows(&self, panel: Panel, rows: &[QuoteRow]) {
        self.record(RenderEvent::Rows(panel, rows.to_vec()));
    }

    fn render_error(&self, panel: Panel, message: &str) {
        self.record(RenderEvent::Error(panel, message.to_string()));
    }

    fn render_status(&self, panel: Panel, status: &PanelStatus) {
        self.record(RenderEvent::Status(panel, status.clone()));
    }

    fn render_gauge(&self, reading: &SentimentReading) {
        self.record(RenderEvent::Gauge(reading.clone()));
    }

    fn render_options(&self, panel: Panel, options: &[AssetOption]) {
        self.record(RenderEvent::Options(panel, options.to_vec()));
    }

    fn render_conversion(&self, panel: Panel, result: &Result<Conversion, ConversionError>) {
        self.record(RenderEvent::Conversion(panel, result.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_fetch() {
        let mock = ScriptedFetch::new()
            .with_response(Provider::FearGreed, "first")
            .with_response(Provider::FearGreed, "second");

        let req = ProviderRequest::new(Provider::FearGreed, "https://example.test");
        assert_eq!(mock.fetch(req.clone()).await.unwrap().body, "first");
        assert_eq!(mock.fetch(req.clone()).await.unwrap().body, "second");
        // last response sticks
        assert_eq!(mock.fetch(req).await.unwrap().body, "second");
        assert_eq!(mock.calls_to(Provider::FearGreed), 3);
    }

    #[tokio::test]
    async fn test_scripted_fetch_by_symbol() {
        let mock = ScriptedFetch::new()
            .with_symbol_response(Provider::AlphaVantage, "AAPL", "apple")
            .with_response(Provider::AlphaVantage, "default");

        let aapl = ProviderRequest::new(Provider::AlphaVantage, "u").with_query("symbol", "AAPL");
        let msft = ProviderRequest::new(Provider::AlphaVantage, "u").with_query("symbol", "MSFT");
        assert_eq!(mock.fetch(aapl).await.unwrap().body, "apple");
        assert_eq!(mock.fetch(msft).await.unwrap().body, "default");
    }

    #[tokio::test]
    async fn test_unscripted_provider_fails() {
        let mock = ScriptedFetch::new();
        let req = ProviderRequest::new(Provider::Fmp, "u");
        assert!(matches!(
            mock.fetch(req).await,
            Err(FetchError::Network { .. })
        ));
        assert_eq!(mock.get_calls().len(), 1);
    }

    #[test]
    fn test_recording_sink() {
        let sink = RecordingSink::new();
        sink.render_error(Panel::Movers, "nothing");
        sink.render_status(Panel::Movers, &PanelStatus::Updating);

        assert_eq!(sink.errors(Panel::Movers), vec!["nothing".to_string()]);
        assert_eq!(sink.last_status(Panel::Movers), Some(PanelStatus::Updating));
        assert!(sink.last_rows(Panel::Movers).is_none());
    }
}
