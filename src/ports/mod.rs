//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement:
//! - HTTP fetching against rate-limited providers
//! - Source adapters normalizing provider payloads
//! - The render sink consuming refreshed snapshots

pub mod fetcher;
pub mod source;
pub mod render;
pub mod mocks;

pub use fetcher::{FetchError, HttpFetch, Provider, ProviderRequest, RawPayload};
pub use source::{AdapterError, SourceAdapter};
pub use render::{AssetOption, Panel, PanelStatus, PriceMove, QuoteRow, RenderSink};
