// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admin surface: login/logout, user management, search, and health probes.
//!
//! Request bodies are form-encoded; responses are JSON where bodied. Which
//! callers may reach each handler is decided by the auth gate middleware,
//! not here.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Form, Json};
use serde::{Deserialize, Serialize};

use crate::error::GateError;
use crate::state::ProxyState;
use crate::store::{StoreError, UserRecord};
use crate::token::Claim;
use crate::{password, session};

/// Response header carrying the freshly minted id on user creation.
const USER_ID_HEADER: HeaderName = HeaderName::from_static("user_id");

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
}

/// Public projection of a user row.
#[derive(Debug, Serialize)]
pub struct UserView {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub username: String,
}

impl From<UserRecord> for UserView {
    fn from(user: UserRecord) -> Self {
        Self { user_id: user.user_id, username: user.username }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchMiss {
    pub message: &'static str,
    pub key: &'static str,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<UserView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<SearchMiss>,
}

// -- Session endpoints --------------------------------------------------------

/// `POST /auth/login` — verify credentials and mint (or reuse) a session.
///
/// Every failure mode is a bare 401: unknown user, wrong password, empty
/// fields, and a store that cannot be queried all look identical.
pub async fn login(
    State(s): State<Arc<ProxyState>>,
    Form(form): Form<CredentialsForm>,
) -> Response {
    if form.username.is_empty() || form.password.is_empty() {
        return GateError::Unauthorized.into_response();
    }
    let username = form.username.to_lowercase();

    let user = match s.store.get_active_by_username(&username).await {
        Ok(Some(user)) => user,
        Ok(None) => return GateError::Unauthorized.into_response(),
        Err(e) => {
            tracing::warn!(err = %e, "user lookup failed during login");
            return GateError::Unauthorized.into_response();
        }
    };

    if !password::verify(form.password, user.hashed_password.clone()).await {
        return GateError::Unauthorized.into_response();
    }

    let claim = Claim { user_id: user.user_id, username: user.username };
    match session::establish(s.cache.as_ref(), &s.tokens, &claim).await {
        Ok(token) => Json(LoginResponse { access_token: token }).into_response(),
        Err(e) => {
            tracing::warn!(err = %e, "session cache write failed during login");
            GateError::Unauthorized.into_response()
        }
    }
}

/// `POST /auth/logout` — drop the caller's session mirror entries.
pub async fn logout(State(s): State<Arc<ProxyState>>, Extension(claim): Extension<Claim>) -> Response {
    match session::revoke(s.cache.as_ref(), &claim.user_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::warn!(err = %e, "session cache delete failed during logout");
            GateError::Dependency("session cache unavailable".to_owned()).into_response()
        }
    }
}

/// `GET /auth/users/me` — the authenticated caller's own row.
pub async fn me(State(s): State<Arc<ProxyState>>, Extension(claim): Extension<Claim>) -> Response {
    match s.store.get_active_by_id(&claim.user_id).await {
        Ok(Some(user)) => Json(UserView::from(user)).into_response(),
        Ok(None) => GateError::NotFound.into_response(),
        Err(e) => {
            tracing::warn!(err = %e, "user lookup failed");
            GateError::Dependency("user store unavailable".to_owned()).into_response()
        }
    }
}

// -- User management ----------------------------------------------------------

/// `POST /auth/users` — create a user with a freshly minted id.
pub async fn create_user(
    State(s): State<Arc<ProxyState>>,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let username = form.username.to_lowercase();
    let hashed = match password::hash(form.password).await {
        Ok(hashed) => hashed,
        Err(e) => {
            tracing::error!(err = %e, "password hashing failed");
            return GateError::Internal("password hashing failed".to_owned()).into_response();
        }
    };

    match s.store.create(&username, &hashed).await {
        Ok(user) => {
            tracing::info!(user_id = %user.user_id, "user created");
            match HeaderValue::from_str(&user.user_id) {
                Ok(value) => {
                    (StatusCode::CREATED, [(USER_ID_HEADER, value)]).into_response()
                }
                Err(_) => StatusCode::CREATED.into_response(),
            }
        }
        Err(StoreError::Conflict) => GateError::Conflict.into_response(),
        Err(e) => {
            tracing::warn!(err = %e, "user creation failed");
            GateError::Dependency("user store unavailable".to_owned()).into_response()
        }
    }
}

/// `GET /auth/users/{id}`
pub async fn get_user(State(s): State<Arc<ProxyState>>, Path(id): Path<String>) -> Response {
    match s.store.get_active_by_id(&id).await {
        Ok(Some(user)) => Json(UserView::from(user)).into_response(),
        Ok(None) => GateError::NotFound.into_response(),
        Err(e) => {
            tracing::warn!(err = %e, "user lookup failed");
            GateError::Dependency("user store unavailable".to_owned()).into_response()
        }
    }
}

/// `POST /auth/users/{id}` — update the password and revoke any live session.
pub async fn update_password(
    State(s): State<Arc<ProxyState>>,
    Path(id): Path<String>,
    Form(form): Form<PasswordForm>,
) -> Response {
    let hashed = match password::hash(form.password).await {
        Ok(hashed) => hashed,
        Err(e) => {
            tracing::error!(err = %e, "password hashing failed");
            return GateError::Internal("password hashing failed".to_owned()).into_response();
        }
    };

    match s.store.update_password(&id, &hashed).await {
        Ok(true) => {}
        Ok(false) => return GateError::NotFound.into_response(),
        Err(e) => {
            tracing::warn!(err = %e, "password update failed");
            return GateError::Dependency("user store unavailable".to_owned()).into_response();
        }
    }

    // A credential change invalidates whatever sessions the old credential
    // earned.
    match session::revoke(s.cache.as_ref(), &id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::warn!(err = %e, "session revocation failed after password update");
            GateError::Dependency("session cache unavailable".to_owned()).into_response()
        }
    }
}

/// `POST /auth/users/{id}/deactivate` — revoke sessions, then move the row
/// out of the active partition.
pub async fn deactivate_user(
    State(s): State<Arc<ProxyState>>,
    Path(id): Path<String>,
) -> Response {
    if let Err(e) = session::revoke(s.cache.as_ref(), &id).await {
        tracing::warn!(err = %e, "session revocation failed during deactivation");
        return GateError::Dependency("session cache unavailable".to_owned()).into_response();
    }

    match s.store.deactivate(&id).await {
        Ok(true) => {
            tracing::info!(user_id = %id, "user deactivated");
            StatusCode::OK.into_response()
        }
        Ok(false) => GateError::NotFound.into_response(),
        Err(e) => {
            tracing::warn!(err = %e, "deactivation failed");
            GateError::Dependency("user store unavailable".to_owned()).into_response()
        }
    }
}

/// `POST /auth/users/{id}/reactivate`
pub async fn reactivate_user(
    State(s): State<Arc<ProxyState>>,
    Path(id): Path<String>,
) -> Response {
    match s.store.reactivate(&id).await {
        Ok(true) => {
            tracing::info!(user_id = %id, "user reactivated");
            StatusCode::OK.into_response()
        }
        Ok(false) => GateError::NotFound.into_response(),
        Err(e) => {
            tracing::warn!(err = %e, "reactivation failed");
            GateError::Dependency("user store unavailable".to_owned()).into_response()
        }
    }
}

/// `POST /auth/users/search` — bulk lookup by repeated `user_id` or
/// `username` keys (never both).
pub async fn search_users(
    State(s): State<Arc<ProxyState>>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let mut user_ids = Vec::new();
    let mut usernames = Vec::new();
    for (key, value) in pairs {
        match key.as_str() {
            "user_id" => user_ids.push(value),
            "username" => usernames.push(value.to_lowercase()),
            _ => {}
        }
    }

    if !user_ids.is_empty() && !usernames.is_empty() {
        return GateError::BadRequest(
            "Cannot search with both 'user_id' and 'username'. Please choose one.".to_owned(),
        )
        .into_response();
    }
    if user_ids.is_empty() && usernames.is_empty() {
        return Json(serde_json::json!({ "results": [] })).into_response();
    }

    let mut results = Vec::new();
    let mut errors = Vec::new();
    for id in user_ids {
        match s.store.get_active_by_id(&id).await {
            Ok(Some(user)) => results.push(UserView::from(user)),
            _ => errors.push(SearchMiss {
                message: "Unable to find user_id",
                key: "user_id",
                value: id,
            }),
        }
    }
    for name in usernames {
        match s.store.get_active_by_username(&name).await {
            Ok(Some(user)) => results.push(UserView::from(user)),
            _ => errors.push(SearchMiss {
                message: "Unable to find username",
                key: "username",
                value: name,
            }),
        }
    }

    Json(SearchResponse { results, errors }).into_response()
}

// -- Health -------------------------------------------------------------------

/// `GET /auth/live`
pub async fn live() -> &'static str {
    "OK"
}

/// `GET /auth/ready` — probe both external dependencies.
pub async fn ready(State(s): State<Arc<ProxyState>>) -> Response {
    let probe = format!("readiness:{}", uuid::Uuid::new_v4());
    let cache_ok = async {
        s.cache.set(&probe, "ok").await?;
        s.cache.delete(&probe).await
    }
    .await;
    if let Err(e) = cache_ok {
        tracing::warn!(err = %e, "readiness: session cache probe failed");
        return GateError::Dependency("session cache unreachable".to_owned()).into_response();
    }

    // A lookup that can never match still proves the store answers queries.
    let miss = uuid::Uuid::new_v4().to_string();
    if let Err(e) = s.store.get_active_by_username(&miss).await {
        tracing::warn!(err = %e, "readiness: user store probe failed");
        return GateError::Dependency("user store unreachable".to_owned()).into_response();
    }

    "OK".into_response()
}
