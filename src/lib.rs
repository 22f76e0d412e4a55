//! Market Pulse - Market Data Dashboard Library
//!
//! Polls crypto, equity, sentiment and fiat-rate providers, merges primary and
//! secondary sources with a fallback, and keeps refreshed tables and converters.
//!
//! # Modules
//!
//! - `domain`: Core types (Quote, price tables, conversion, sentiment)
//! - `ports`: Trait abstractions (HttpFetch, SourceAdapter, RenderSink)
//! - `adapters`: External implementations (providers, HTTP client, proxy, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Aggregator, scheduler and refresh pulls

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;
