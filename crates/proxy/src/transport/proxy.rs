// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP passthrough: relay authenticated requests to the upstream verbatim,
//! stamped with the caller's identity.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::error::GateError;
use crate::state::ProxyState;
use crate::token::Claim;

const USER_ID: HeaderName = HeaderName::from_static("user_id");
const USERNAME: HeaderName = HeaderName::from_static("username");

/// Response headers never relayed back: the transport re-computes framing,
/// and upstream ETags are suppressed so the proxy never vouches for
/// validators it does not understand.
const STRIPPED_RESPONSE_HEADERS: [HeaderName; 3] =
    [header::CONTENT_LENGTH, header::TRANSFER_ENCODING, header::ETAG];

/// Catch-all handler in HTTP mode. The gate middleware has already resolved
/// the bearer claim into the request extensions.
pub async fn passthrough(State(s): State<Arc<ProxyState>>, req: Request) -> Response {
    let Some(claim) = req.extensions().get::<Claim>().cloned() else {
        return GateError::Unauthorized.into_response();
    };

    let (parts, body) = req.into_parts();
    let path_and_query =
        parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/").to_owned();
    let url = format!("http://{}{}", s.config.proxied_host, path_and_query);

    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(err = %e, "failed to read request body");
            return GateError::BadRequest("unreadable request body".to_owned()).into_response();
        }
    };

    let headers = forwarded_headers(&parts.headers, &claim);

    let upstream = match s
        .http
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .send()
        .await
    {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::warn!(url = %url, err = %e, "upstream request failed");
            return GateError::Upstream(e.to_string()).into_response();
        }
    };

    // Whatever the upstream said — 2xx, 4xx, 5xx — is the answer. Only a
    // transport-level failure above synthesizes our own status.
    let status = upstream.status();
    let mut response_headers = upstream.headers().clone();
    for name in STRIPPED_RESPONSE_HEADERS {
        response_headers.remove(&name);
    }

    let bytes = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(url = %url, err = %e, "failed to read upstream body");
            return GateError::Upstream(e.to_string()).into_response();
        }
    };

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    response
}

/// Copy the client's headers for the upstream request, dropping what the
/// transport owns and stamping the authenticated identity.
fn forwarded_headers(original: &HeaderMap, claim: &Claim) -> HeaderMap {
    let mut headers = original.clone();
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);
    if let Ok(value) = HeaderValue::from_str(&claim.user_id) {
        headers.insert(USER_ID, value);
    }
    if let Ok(value) = HeaderValue::from_str(&claim.username) {
        headers.insert(USERNAME, value);
    }
    headers
}
