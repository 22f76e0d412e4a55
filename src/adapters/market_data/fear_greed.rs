//! Fear & Greed index (alternative.me)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::SentimentSample;
use crate::ports::fetcher::{Provider, ProviderRequest, RawPayload};
use crate::ports::source::{AdapterError, SourceAdapter};

pub const FEAR_GREED_URL: &str = "https://api.alternative.me/fng/";

#[derive(Debug, Clone)]
pub struct FearGreedAdapter {
    base_url: String,
}

impl FearGreedAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for FearGreedAdapter {
    fn default() -> Self {
        Self::new(FEAR_GREED_URL)
    }
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    #[serde(default)]
    data: Vec<IndexEntry>,
}

/// Values arrive as strings: `{"value":"54","value_classification":"Neutral","timestamp":"1715299200"}`
#[derive(Debug, Deserialize)]
struct IndexEntry {
    value: String,
    value_classification: Option<String>,
    timestamp: Option<String>,
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

#[async_trait]
impl SourceAdapter for FearGreedAdapter {
    type Record = SentimentSample;

    fn name(&self) -> &'static str {
        "fear_greed"
    }

    fn request(&self) -> ProviderRequest {
        ProviderRequest::new(Provider::FearGreed, self.base_url.clone()).with_query("limit", "1")
    }

    /// Most recent entry only. The value is passed through unclamped.
    fn normalize(&self, payload: &RawPayload) -> Result<Vec<SentimentSample>, AdapterError> {
        let response: IndexResponse = payload.json()?;
        let entry = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::NoData("empty index series".to_string()))?;

        let value = entry
            .value
            .trim()
            .parse::<i64>()
            .map_err(|_| AdapterError::Malformed(format!("index value {:?}", entry.value)))?;

        Ok(vec![SentimentSample {
            value,
            provider_label: entry.value_classification,
            timestamp: entry.timestamp.as_deref().and_then(parse_timestamp),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SentimentClass, SentimentReading};

    fn payload(body: &str) -> RawPayload {
        RawPayload::ok(Provider::FearGreed, body)
    }

    #[test]
    fn test_request() {
        let req = FearGreedAdapter::default().request();
        assert_eq!(req.url, FEAR_GREED_URL);
        assert_eq!(req.query_value("limit"), Some("1"));
    }

    #[test]
    fn test_normalize_first_entry() {
        let body = r#"{
            "name": "Fear and Greed Index",
            "data": [
                {"value": "54", "value_classification": "Neutral", "timestamp": "1715299200", "time_until_update": "3600"},
                {"value": "20", "value_classification": "Extreme Fear", "timestamp": "1715212800"}
            ],
            "metadata": {"error": null}
        }"#;
        let samples = FearGreedAdapter::default().normalize(&payload(body)).unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 54);
        assert_eq!(samples[0].provider_label.as_deref(), Some("Neutral"));
        assert_eq!(samples[0].timestamp.map(|t| t.timestamp()), Some(1_715_299_200));

        let (reading, out_of_range) = SentimentReading::from_sample(&samples[0]);
        assert!(!out_of_range);
        assert_eq!(reading.classification, SentimentClass::Neutral);
    }

    #[test]
    fn test_out_of_range_value_passed_through() {
        let body = r#"{"data": [{"value": "140"}]}"#;
        let samples = FearGreedAdapter::default().normalize(&payload(body)).unwrap();
        assert_eq!(samples[0].value, 140);
        assert!(samples[0].timestamp.is_none());
    }

    #[test]
    fn test_empty_series_is_no_data() {
        let err = FearGreedAdapter::default()
            .normalize(&payload(r#"{"data": []}"#))
            .unwrap_err();
        assert!(matches!(err, AdapterError::NoData(_)));
    }

    #[test]
    fn test_non_numeric_value_is_malformed() {
        let err = FearGreedAdapter::default()
            .normalize(&payload(r#"{"data": [{"value": "high"}]}"#))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Malformed(_)));
    }
}
