//! Rate-limited HTTP client
//!
//! `reqwest`-backed implementation of the fetch port. Requests to a paced
//! provider are serialized: the provider's limiter stays locked until the
//! response body has been read.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;

use crate::ports::fetcher::{FetchError, HttpFetch, Provider, ProviderRequest, RawPayload};
use super::rate_limiter::{RateLimiter, RatePolicy};

/// Longest error body kept in a `FetchError::Http`
const MAX_ERROR_BODY: usize = 512;

/// Fetcher configuration
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Request timeout
    pub timeout: Duration,
    /// User agent sent to providers
    pub user_agent: String,
    /// Pacing per provider. Providers without an entry are not paced.
    pub policies: HashMap<Provider, RatePolicy>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        let mut policies = HashMap::new();
        // Free tier: 5 requests per minute, spaced 15 seconds apart
        policies.insert(
            Provider::AlphaVantage,
            RatePolicy {
                min_spacing: Duration::from_secs(15),
                max_per_window: Some(5),
            },
        );

        Self {
            timeout: Duration::from_secs(20),
            user_agent: concat!("market-pulse/", env!("CARGO_PKG_VERSION")).to_string(),
            policies,
        }
    }
}

impl FetcherConfig {
    pub fn with_policy(mut self, provider: Provider, policy: RatePolicy) -> Self {
        self.policies.insert(provider, policy);
        self
    }
}

/// HTTP fetcher with per-provider pacing
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    http: Client,
    limiters: HashMap<Provider, Arc<Mutex<RateLimiter>>>,
}

impl ReqwestFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        let limiters = config
            .policies
            .iter()
            .map(|(provider, policy)| (*provider, Arc::new(Mutex::new(RateLimiter::new(*policy)))))
            .collect();

        Ok(Self { http, limiters })
    }

    async fn send(&self, request: &ProviderRequest) -> Result<RawPayload, FetchError> {
        let network = |e: reqwest::Error| FetchError::Network {
            provider: request.provider,
            message: e.to_string(),
        };

        tracing::debug!("GET {} ({})", request.url, request.provider);

        let response = self
            .http
            .get(&request.url)
            .query(&request.query)
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        let body = response.text().await.map_err(network)?;

        if !status.is_success() {
            tracing::warn!("{} returned {}", request.provider, status);
            let mut body = body;
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(FetchError::Http {
                provider: request.provider,
                status: status.as_u16(),
                body,
            });
        }

        Ok(RawPayload {
            provider: request.provider,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn fetch(&self, request: ProviderRequest) -> Result<RawPayload, FetchError> {
        match self.limiters.get(&request.provider) {
            Some(limiter) => {
                // held for the whole request so calls to this provider never overlap
                let mut limiter = limiter.lock().await;
                let waited = limiter.wait_if_needed().await;
                if !waited.is_zero() {
                    tracing::debug!("{}: paced for {:?}", request.provider, waited);
                }
                self.send(&request).await
            }
            None => self.send(&request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Arrivals {
        starts: Vec<std::time::Instant>,
        active: usize,
        max_active: usize,
    }

    /// Local upstream that holds each request open for `hold`
    async fn spawn_slow_upstream(hold: Duration) -> (String, Arc<std::sync::Mutex<Arrivals>>) {
        let arrivals = Arc::new(std::sync::Mutex::new(Arrivals::default()));
        let state = Arc::clone(&arrivals);
        let app = axum::Router::new().route(
            "/fng/",
            axum::routing::get(move || {
                let state = Arc::clone(&state);
                async move {
                    {
                        let mut arrivals = state.lock().unwrap();
                        arrivals.starts.push(std::time::Instant::now());
                        arrivals.active += 1;
                        arrivals.max_active = arrivals.max_active.max(arrivals.active);
                    }
                    tokio::time::sleep(hold).await;
                    state.lock().unwrap().active -= 1;
                    r#"{"data":[]}"#
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{}/fng/", addr), arrivals)
    }

    #[test]
    fn test_default_config_paces_equities() {
        let config = FetcherConfig::default();
        let policy = config.policies.get(&Provider::AlphaVantage).unwrap();
        assert_eq!(policy.min_spacing, Duration::from_secs(15));
        assert_eq!(policy.max_per_window, Some(5));
        assert!(config.policies.get(&Provider::CoinGecko).is_none());
    }

    #[test]
    fn test_fetcher_creation() {
        let fetcher = ReqwestFetcher::new(FetcherConfig::default());
        assert!(fetcher.is_ok());
    }

    #[test]
    fn test_with_policy() {
        let config = FetcherConfig::default()
            .with_policy(Provider::CoinGecko, RatePolicy::per_minute(30));
        let fetcher = ReqwestFetcher::new(config).unwrap();

        assert!(fetcher.limiters.contains_key(&Provider::CoinGecko));
        assert!(fetcher.limiters.contains_key(&Provider::AlphaVantage));
        assert!(!fetcher.limiters.contains_key(&Provider::FearGreed));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let config = FetcherConfig {
            timeout: Duration::from_millis(500),
            ..FetcherConfig::default()
        };
        let fetcher = ReqwestFetcher::new(config).unwrap();
        // port 9 on loopback: nothing listens there
        let request = ProviderRequest::new(Provider::FearGreed, "http://127.0.0.1:9/fng/");

        let err = fetcher.fetch(request).await.unwrap_err();
        assert!(matches!(err, FetchError::Network { provider: Provider::FearGreed, .. }));
    }

    #[tokio::test]
    async fn test_paced_requests_are_spaced_and_never_overlap() {
        let spacing = Duration::from_millis(200);
        // each response takes longer than the spacing, so only the held lock keeps them apart
        let (url, arrivals) = spawn_slow_upstream(Duration::from_millis(300)).await;
        let config = FetcherConfig::default()
            .with_policy(Provider::FearGreed, RatePolicy::spacing(spacing));
        let fetcher = ReqwestFetcher::new(config).unwrap();
        let request = || ProviderRequest::new(Provider::FearGreed, url.clone());

        let (first, second, third) = tokio::join!(
            fetcher.fetch(request()),
            fetcher.fetch(request()),
            fetcher.fetch(request()),
        );
        assert!(first.is_ok() && second.is_ok() && third.is_ok());

        let arrivals = arrivals.lock().unwrap();
        assert_eq!(arrivals.starts.len(), 3);
        assert_eq!(arrivals.max_active, 1);
        for pair in arrivals.starts.windows(2) {
            let gap = pair[1] - pair[0];
            // connection setup on the first request can eat a few ms of the gap
            assert!(gap >= spacing - Duration::from_millis(20), "gap {:?} below spacing", gap);
        }
    }
}
