// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::fmt;

/// Error classes for the proxy API.
///
/// Auth failures and admin-route misses deliberately carry empty bodies:
/// a 401 leaks nothing about why the credential was rejected, and a bare
/// 404 makes internal-only routes indistinguishable from unknown paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    Unauthorized,
    NotFound,
    Conflict,
    BadRequest(String),
    Dependency(String),
    Upstream(String),
    Internal(String),
}

impl GateError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Dependency(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Dependency(_) => "DEPENDENCY_UNAVAILABLE",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(msg)
            | Self::Dependency(msg)
            | Self::Upstream(msg)
            | Self::Internal(msg) => write!(f, "{}: {msg}", self.as_str()),
            _ => f.write_str(self.as_str()),
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        match self {
            Self::BadRequest(msg) | Self::Dependency(msg) => (status, msg).into_response(),
            // Upstream/internal details go to the log, not the client.
            _ => status.into_response(),
        }
    }
}
