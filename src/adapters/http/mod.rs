//! HTTP Adapter
//!
//! Implementation of the fetch port on top of reqwest, with per-provider pacing.

mod client;
mod rate_limiter;

pub use client::{FetcherConfig, ReqwestFetcher};
pub use rate_limiter::{RateLimiter, RatePolicy, RATE_WINDOW};
