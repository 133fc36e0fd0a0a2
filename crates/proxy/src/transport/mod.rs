// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the proxy.

pub mod admin;
pub mod auth;
pub mod proxy;
pub mod ws;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::ProxyState;

/// Build the axum `Router` with the admin surface and the catch-all.
///
/// Literal admin routes (`/auth/users/me`, `/auth/users/search`) win over
/// the `{id}` capture; everything outside `/auth` falls through to the
/// passthrough handler selected by `WEBSOCKET_MODE`.
pub fn build_router(state: Arc<ProxyState>) -> Router {
    let router = Router::<Arc<ProxyState>>::new()
        // Health (public)
        .route("/auth/live", get(admin::live))
        .route("/auth/ready", get(admin::ready))
        // Sessions
        .route("/auth/login", post(admin::login))
        .route("/auth/logout", post(admin::logout))
        // User management (internal-only, except `me`)
        .route("/auth/users", post(admin::create_user))
        .route("/auth/users/me", get(admin::me))
        .route("/auth/users/search", post(admin::search_users))
        .route("/auth/users/{id}", get(admin::get_user).post(admin::update_password))
        .route("/auth/users/{id}/deactivate", post(admin::deactivate_user))
        .route("/auth/users/{id}/reactivate", post(admin::reactivate_user));

    let router = if state.config.websocket_mode {
        router.fallback(ws::ws_entry)
    } else {
        router.fallback(proxy::passthrough)
    };

    router
        .layer(middleware::from_fn_with_state::<_, Arc<ProxyState>, (axum::extract::State<Arc<ProxyState>>, axum::extract::Request)>(Arc::clone(&state), auth::gate_layer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
