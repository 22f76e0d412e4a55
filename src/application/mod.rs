//! Application Layer - Refresh pipeline and use cases
//!
//! - Aggregator: merge primary and secondary sources, fall back when both fail
//! - Scheduler: timed pulls with an in-flight guard per panel
//! - Pulls: one unit of refresh work per panel
//! - Converter service: queries over the latest price tables

pub mod aggregator;
pub mod converter_service;
pub mod dashboard;
pub mod pulls;
pub mod scheduler;
pub mod table_slot;
pub mod table_view;

pub use aggregator::{merge, merge_with_fallback, AggregateError, DataOrigin, MergedQuotes};
pub use converter_service::{ConverterService, DEFAULT_CRYPTO_PAIR, DEFAULT_FIAT_PAIR};
pub use dashboard::{
    Dashboard, CRYPTO_CONVERTER_PULL, CRYPTO_PULL, EQUITIES_PULL, FIAT_CONVERTER_PULL, MOVERS_PULL,
    SENTIMENT_PULL,
};
pub use pulls::{CryptoConverterPull, FiatConverterPull, MoversPull, SentimentPull, TablePull};
pub use scheduler::{
    Cadence, Pull, PullError, PullPhase, PullReport, RefreshState, Scheduler, SchedulerError,
    TriggerOutcome,
};
pub use table_slot::TableSlot;
pub use table_view::TableView;
