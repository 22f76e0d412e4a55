//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - HTTP: rate-limited provider fetcher
//! - Market Data: one source adapter per provider
//! - Render: console output of refreshed panels
//! - Proxy: equity provider behind a server-held key
//! - CLI: Command-line interface handlers

pub mod http;
pub mod market_data;
pub mod render;
pub mod proxy;
pub mod cli;

pub use http::{FetcherConfig, ReqwestFetcher};
pub use market_data::{
    AiMoversAdapter, AlphaVantageAdapter, CoinGeckoAdapter, FearGreedAdapter, FmpActivesAdapter,
    FrankfurterAdapter,
};
pub use render::ConsoleSink;
pub use proxy::{ProxyError, ProxyState};
pub use cli::CliApp;
