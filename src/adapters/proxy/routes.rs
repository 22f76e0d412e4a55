use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use super::ProxyError;
use crate::ports::fetcher::{FetchError, HttpFetch, Provider, ProviderRequest};

pub const PROXY_PATH: &str = "/api/alpha-vantage-proxy";

const MISSING_PARAMS: &str = "Missing required query parameters: function and symbol.";
const UPSTREAM_ERROR: &str = "Error from Alpha Vantage API";
const NO_RESPONSE: &str = "No response received from Alpha Vantage API.";

/// Shared handler state. Construction fails without a key.
#[derive(Clone)]
pub struct ProxyState {
    fetcher: Arc<dyn HttpFetch>,
    upstream_url: String,
    api_key: String,
}

impl ProxyState {
    pub fn new(
        fetcher: Arc<dyn HttpFetch>,
        upstream_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, ProxyError> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(ProxyError::MissingKey)?;

        Ok(Self {
            fetcher,
            upstream_url: upstream_url.into(),
            api_key,
        })
    }
}

pub fn create_router(state: ProxyState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(PROXY_PATH, get(alpha_vantage_proxy))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

async fn health_check() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct ProxyQuery {
    function: Option<String>,
    symbol: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn alpha_vantage_proxy(
    State(state): State<Arc<ProxyState>>,
    Query(query): Query<ProxyQuery>,
) -> Response {
    let (Some(function), Some(symbol)) = (present(query.function), present(query.symbol)) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": MISSING_PARAMS }))).into_response();
    };

    tracing::debug!("Proxying {} for {}", function, symbol);
    let request = ProviderRequest::new(Provider::AlphaVantage, &state.upstream_url)
        .with_query("function", function)
        .with_query("symbol", symbol)
        .with_query("apikey", &state.api_key);

    match state.fetcher.fetch(request).await {
        Ok(payload) => (StatusCode::OK, Json(body_value(payload.body))).into_response(),
        Err(FetchError::Http { status, body, .. }) => {
            tracing::warn!("Upstream answered HTTP {}", status);
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            let details = body_value(body);
            (status, Json(json!({ "error": UPSTREAM_ERROR, "details": details }))).into_response()
        }
        Err(e @ FetchError::Network { .. }) => {
            tracing::error!("Proxy request failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": NO_RESPONSE }))).into_response()
        }
    }
}

/// Upstream JSON as-is, anything else as a JSON string
fn body_value(body: String) -> Value {
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}
