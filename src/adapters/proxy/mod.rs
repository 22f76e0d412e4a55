//! Equity proxy server
//!
//! Exposes the equity quote provider behind a key held by the server, so a
//! dashboard pointed at the proxy never ships the key.

mod routes;

pub use routes::{create_router, ProxyState, PROXY_PATH};

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no Alpha Vantage API key configured; set providers.alpha_vantage_api_key or ALPHA_VANTAGE_API_KEY")]
    MissingKey,

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("proxy server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Bind and serve until the process is stopped
pub async fn serve(bind: SocketAddr, state: ProxyState) -> Result<(), ProxyError> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|source| ProxyError::Bind { addr: bind, source })?;

    tracing::info!("Equity proxy listening on {}{}", bind, PROXY_PATH);
    axum::serve(listener, create_router(state))
        .await
        .map_err(ProxyError::Serve)
}
