//! Market Data Adapters
//!
//! One `SourceAdapter` per provider:
//! - `CoinGeckoAdapter`: crypto listing, USD-anchored, paginated
//! - `AlphaVantageAdapter`: equity quotes, one request per symbol
//! - `FearGreedAdapter`: sentiment index, latest entry
//! - `FrankfurterAdapter`: fiat rates relative to USD
//! - `AiMoversAdapter`: LLM-scraped movers, best effort
//! - `FmpActivesAdapter`: most-active equities, secondary movers source

mod numbers;
mod coingecko;
mod alpha_vantage;
mod fear_greed;
mod frankfurter;
mod ai_movers;
mod fmp;

pub use numbers::{loose_f64, parse_loose_number};
pub use coingecko::{CoinGeckoAdapter, COINGECKO_MARKETS_URL};
pub use alpha_vantage::{AlphaVantageAdapter, ALPHA_VANTAGE_URL};
pub use fear_greed::{FearGreedAdapter, FEAR_GREED_URL};
pub use frankfurter::{FiatRate, FrankfurterAdapter, FRANKFURTER_URL};
pub use ai_movers::{extract_json_span, AiMoversAdapter, DEFAULT_SCRAPER_URL};
pub use fmp::{FmpActivesAdapter, FMP_ACTIVES_URL};
