// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wicket: an authenticating reverse proxy for one internal upstream.
//!
//! Clients authenticate with bearer tokens backed by a shared session
//! cache; authenticated traffic is relayed to the upstream over HTTP or
//! WebSocket with the caller's identity injected out-of-band.

pub mod cache;
pub mod config;
pub mod error;
pub mod password;
pub mod session;
pub mod state;
pub mod store;
pub mod token;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ProxyConfig;
use crate::state::ProxyState;
use crate::transport::build_router;

/// Run the proxy until shutdown.
pub async fn run(config: ProxyConfig) -> anyhow::Result<()> {
    if config.signing_secret.is_empty() {
        tracing::warn!(
            "SIGNING_SECRET is empty; tokens are signed with an empty key. \
             Do not expose this deployment to real traffic."
        );
    }

    let shutdown = CancellationToken::new();

    let cache = cache::redis::RedisCache::connect(&config.redis_url()).await?;
    let store = store::postgres::PostgresStore::connect(&config.postgres_url()).await?;
    store.ensure_schema().await?;

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(ProxyState::new(
        config,
        Arc::new(cache),
        Arc::new(store),
        shutdown.clone(),
    )?);

    tracing::info!(
        upstream = %state.config.proxied_host,
        mode = if state.config.websocket_mode { "websocket" } else { "http" },
        "wicket listening on {addr}"
    );

    let router = build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
