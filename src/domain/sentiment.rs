//! Sentiment index reading (0-100 fear/greed scale)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const SENTIMENT_MIN: i64 = 0;
pub const SENTIMENT_MAX: i64 = 100;

/// Bucket derived from the numeric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentClass {
    ExtremeFear,
    Fear,
    Neutral,
    Greed,
    ExtremeGreed,
}

impl SentimentClass {
    pub fn from_value(value: u8) -> Self {
        match value {
            0..=24 => SentimentClass::ExtremeFear,
            25..=44 => SentimentClass::Fear,
            45..=55 => SentimentClass::Neutral,
            56..=75 => SentimentClass::Greed,
            _ => SentimentClass::ExtremeGreed,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SentimentClass::ExtremeFear => "Extreme Fear",
            SentimentClass::Fear => "Fear",
            SentimentClass::Neutral => "Neutral",
            SentimentClass::Greed => "Greed",
            SentimentClass::ExtremeGreed => "Extreme Greed",
        }
    }
}

impl fmt::Display for SentimentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Raw entry as the provider reported it. The value is not range-checked.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentSample {
    pub value: i64,
    pub provider_label: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Current reading shown on the gauge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReading {
    pub value: u8,
    pub classification: SentimentClass,
    pub timestamp: Option<DateTime<Utc>>,
}

impl SentimentReading {
    pub fn new(value: u8) -> Self {
        let value = value.min(SENTIMENT_MAX as u8);
        Self {
            value,
            classification: SentimentClass::from_value(value),
            timestamp: None,
        }
    }

    /// Clamp a raw sample into range. Out-of-range input is a provider defect:
    /// it is logged and flagged by the returned `bool`.
    pub fn from_sample(sample: &SentimentSample) -> (Self, bool) {
        let out_of_range = !(SENTIMENT_MIN..=SENTIMENT_MAX).contains(&sample.value);
        if out_of_range {
            tracing::warn!(
                "sentiment value {} outside {}-{}, clamping",
                sample.value,
                SENTIMENT_MIN,
                SENTIMENT_MAX
            );
        }

        let clamped = sample.value.clamp(SENTIMENT_MIN, SENTIMENT_MAX) as u8;
        let mut reading = Self::new(clamped);
        reading.timestamp = sample.timestamp;
        (reading, out_of_range)
    }
}
