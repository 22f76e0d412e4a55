//! Source adapter port
//!
//! Every provider integration is a `SourceAdapter`: it knows how to build its
//! request and how to turn the provider's payload into records.

use async_trait::async_trait;
use thiserror::Error;

use super::fetcher::{FetchError, HttpFetch, ProviderRequest, RawPayload};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// Well-formed response without the expected data (e.g. `{}` when rate limited)
    #[error("No data: {0}")]
    NoData(String),
    /// Free-form text with no extractable structured payload
    #[error("Unparseable response: {0}")]
    Unparseable(String),
    /// JSON that does not match the provider's documented shape
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl AdapterError {
    pub fn is_network(&self) -> bool {
        matches!(self, AdapterError::Fetch(FetchError::Network { .. }))
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(e: serde_json::Error) -> Self {
        AdapterError::Malformed(e.to_string())
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    type Record: Send;

    /// Name used in logs
    fn name(&self) -> &'static str;

    /// The request for one pull
    fn request(&self) -> ProviderRequest;

    /// Turn a provider payload into records
    fn normalize(&self, payload: &RawPayload) -> Result<Vec<Self::Record>, AdapterError>;

    /// Fetch and normalize. Adapters needing several requests override this.
    async fn pull(&self, fetcher: &dyn HttpFetch) -> Result<Vec<Self::Record>, AdapterError> {
        let payload = fetcher.fetch(self.request()).await?;
        let records = self.normalize(&payload)?;
        tracing::debug!("{}: normalized {} records", self.name(), records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::fetcher::{MockHttpFetch, Provider};

    struct EchoAdapter;

    #[async_trait]
    impl SourceAdapter for EchoAdapter {
        type Record = String;

        fn name(&self) -> &'static str {
            "echo"
        }

        fn request(&self) -> ProviderRequest {
            ProviderRequest::new(Provider::FearGreed, "https://example.test/echo")
        }

        fn normalize(&self, payload: &RawPayload) -> Result<Vec<String>, AdapterError> {
            if payload.body.is_empty() {
                return Err(AdapterError::NoData("empty body".into()));
            }
            Ok(payload.body.split(',').map(str::to_string).collect())
        }
    }

    #[tokio::test]
    async fn test_default_pull_fetches_then_normalizes() {
        let mut fetcher = MockHttpFetch::new();
        fetcher
            .expect_fetch()
            .times(1)
            .returning(|req| Ok(RawPayload::ok(req.provider, "a,b,c")));

        let records = EchoAdapter.pull(&fetcher).await.unwrap();
        assert_eq!(records, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_default_pull_propagates_fetch_error() {
        let mut fetcher = MockHttpFetch::new();
        fetcher.expect_fetch().returning(|req| {
            Err(FetchError::Network {
                provider: req.provider,
                message: "timeout".into(),
            })
        });

        let err = EchoAdapter.pull(&fetcher).await.unwrap_err();
        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_default_pull_propagates_normalize_error() {
        let mut fetcher = MockHttpFetch::new();
        fetcher
            .expect_fetch()
            .returning(|req| Ok(RawPayload::ok(req.provider, "")));

        let err = EchoAdapter.pull(&fetcher).await.unwrap_err();
        assert!(matches!(err, AdapterError::NoData(_)));
    }
}
