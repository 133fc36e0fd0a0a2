// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The auth gate: bearer grammar, host gating, and the per-route policy.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::GateError;
use crate::state::ProxyState;
use crate::token::Claim;

/// Authorization policy of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// No check at all.
    Public,
    /// Requires a valid bearer token; the resolved claim is attached to the
    /// request.
    Bearer,
    /// Reachable only from hosts matching `ALLOWED_HOSTS`; misses render as
    /// 404 so the route is indistinguishable from a nonexistent one.
    Internal,
    /// The catch-all. Bearer-gated in HTTP mode; in WebSocket mode the
    /// handshake authenticates in-band instead.
    Passthrough,
}

pub fn classify(path: &str) -> RouteClass {
    match path {
        "/auth/live" | "/auth/ready" | "/auth/login" => RouteClass::Public,
        "/auth/logout" | "/auth/users/me" => RouteClass::Bearer,
        "/auth/users" => RouteClass::Internal,
        p if p.starts_with("/auth/users/") => RouteClass::Internal,
        _ => RouteClass::Passthrough,
    }
}

/// Extract the token from an `Authorization`-style value.
///
/// The token is everything after the final whitespace run; what precedes it,
/// trimmed, must be the whole word `bearer` in any case. `Bearert` (no
/// separator) and `B e a r e r t` (not a whole word) are rejected.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let value = value.trim_end();
    let token_start = value
        .char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .next_back()
        .map(|(i, c)| i + c.len_utf8())?;
    let token = &value[token_start..];
    if token.is_empty() {
        return None;
    }
    let scheme = value[..token_start].trim();
    scheme.eq_ignore_ascii_case("bearer").then_some(token)
}

/// Parse a WebSocket auth frame payload.
///
/// A leading `Authorization:` label is conventional but optional; only the
/// bearer substring matters.
pub fn parse_ws_auth(payload: &str) -> Option<&str> {
    let rest = payload.trim_start();
    let rest = match rest.get(..14) {
        Some(label) if label.eq_ignore_ascii_case("authorization:") => &rest[14..],
        _ => rest,
    };
    parse_bearer(rest)
}

/// Whether `host_header` (minus any `:port` suffix) fully matches the
/// configured allow-regex.
pub fn host_allowed(host_header: &str, allow: &regex::Regex) -> bool {
    allow.is_match(strip_port(host_header.trim()))
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Resolve a token against both the cache and the codec.
///
/// The cache is authoritative for "still logged in"; the signature check
/// keeps a forged cache entry from minting an identity. Admission requires
/// the two claims to agree exactly.
pub async fn resolve_token(state: &ProxyState, token: &str) -> Result<Claim, GateError> {
    let cached = state
        .cache
        .get(token)
        .await
        .map_err(|_| GateError::Unauthorized)?
        .ok_or(GateError::Unauthorized)?;
    let cached: Claim = serde_json::from_str(&cached).map_err(|_| GateError::Unauthorized)?;
    let decoded = state.tokens.decode(token).map_err(|_| GateError::Unauthorized)?;
    if cached == decoded {
        Ok(decoded)
    } else {
        Err(GateError::Unauthorized)
    }
}

/// Extract the bearer token from a request's `Authorization` header.
fn bearer_token(req: &Request) -> Result<String, GateError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(GateError::Unauthorized)?;
    Ok(parse_bearer(value).ok_or(GateError::Unauthorized)?.to_owned())
}

/// Axum middleware applying the per-route policy ahead of every handler,
/// including the catch-all fallback.
pub async fn gate_layer(
    State(state): State<Arc<ProxyState>>,
    mut req: Request,
    next: Next,
) -> Response {
    match classify(req.uri().path()) {
        RouteClass::Public => next.run(req).await,
        RouteClass::Internal => {
            let host =
                req.headers().get(header::HOST).and_then(|v| v.to_str().ok()).unwrap_or("");
            if host_allowed(host, &state.allowed_hosts) {
                next.run(req).await
            } else {
                GateError::NotFound.into_response()
            }
        }
        RouteClass::Passthrough if state.config.websocket_mode => next.run(req).await,
        RouteClass::Bearer | RouteClass::Passthrough => {
            let claim_result = match bearer_token(&req) {
                Ok(token) => resolve_token(&state, &token).await,
                Err(err) => Err(err),
            };
            match claim_result {
                Ok(claim) => {
                    req.extensions_mut().insert(claim);
                    next.run(req).await
                }
                Err(err) => err.into_response(),
            }
        }
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
