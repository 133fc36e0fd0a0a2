// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end proxy tests.
//!
//! Binds the real router on a real TCP listener (with in-memory cache and
//! store adapters) next to a fake upstream that echoes what it receives,
//! then drives both over HTTP and WebSocket.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Request, State, WebSocketUpgrade};
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use wicket::cache::memory::MemoryCache;
use wicket::config::ProxyConfig;
use wicket::state::ProxyState;
use wicket::store::memory::MemoryStore;
use wicket::transport::build_router;

/// A fake upstream service.
///
/// HTTP: `/status/{code}` answers with that status; everything else echoes
/// the request (method, path, selected headers, body) as JSON, stamped with
/// an `ETag` and an `x-upstream` marker header. WebSocket upgrades echo
/// every text/binary frame and log text frames to `received`; the text
/// frame `goodbye` makes the upstream close with code 1000.
pub struct TestUpstream {
    pub addr: SocketAddr,
    pub received: Arc<Mutex<Vec<String>>>,
}

impl TestUpstream {
    pub async fn start() -> anyhow::Result<Self> {
        let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let router =
            Router::new().fallback(upstream_fallback).with_state(Arc::clone(&received));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(Self { addr, received })
    }

    /// Text frames the upstream websocket has received so far.
    pub async fn received(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }
}

async fn upstream_fallback(
    State(received): State<Arc<Mutex<Vec<String>>>>,
    ws: Option<WebSocketUpgrade>,
    req: Request,
) -> Response {
    if let Some(ws) = ws {
        return ws.on_upgrade(move |socket| echo_ws(socket, received)).into_response();
    }

    let (parts, body) = req.into_parts();

    if let Some(code) = parts.uri.path().strip_prefix("/status/") {
        let status = code
            .parse::<u16>()
            .ok()
            .and_then(|c| StatusCode::from_u16(c).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (
            status,
            [(HeaderName::from_static("x-upstream"), "present")],
            "status body",
        )
            .into_response();
    }

    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let pick = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned()
    };
    let echo = serde_json::json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or(""),
        "user_id": pick("user_id"),
        "username": pick("username"),
        "x_probe": pick("x-probe"),
        "body": String::from_utf8_lossy(&bytes),
    });

    let mut response = Response::new(Body::from(echo.to_string()));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::ETAG, HeaderValue::from_static("\"upstream-etag\""));
    headers.insert(HeaderName::from_static("x-upstream"), HeaderValue::from_static("present"));
    response
}

async fn echo_ws(mut socket: WebSocket, received: Arc<Mutex<Vec<String>>>) {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => {
                let text = text.to_string();
                received.lock().await.push(text.clone());
                if text == "goodbye" {
                    let _ = socket
                        .send(Message::Close(Some(CloseFrame { code: 1000, reason: "bye".into() })))
                        .await;
                    break;
                }
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            Message::Binary(bytes) => {
                if socket.send(Message::Binary(bytes)).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

/// A wicket proxy bound on an ephemeral port with in-memory backends.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub state: Arc<ProxyState>,
    client: reqwest::Client,
}

impl TestProxy {
    pub async fn start(proxied_host: &str, websocket_mode: bool) -> anyhow::Result<Self> {
        let config = ProxyConfig {
            host: "127.0.0.1".into(),
            port: 0,
            proxied_host: proxied_host.to_owned(),
            signing_secret: "spec-secret".into(),
            allowed_hosts: r"(localhost|127\.0\.0\.1)".into(),
            redis_host: "localhost".into(),
            postgres_host: "localhost".into(),
            postgres_port: 5432,
            postgres_db: "postgres".into(),
            postgres_user: "postgres".into(),
            postgres_password: String::new(),
            websocket_mode,
        };
        let state = Arc::new(ProxyState::new(
            config,
            Arc::new(MemoryCache::new()),
            Arc::new(MemoryStore::new()),
            CancellationToken::new(),
        )?);
        let router = build_router(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        Ok(Self { addr, state, client: reqwest::Client::new() })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Create a user through the admin endpoint, returning its id.
    pub async fn create_user(&self, username: &str, password: &str) -> anyhow::Result<String> {
        let resp = self
            .client
            .post(format!("{}/auth/users", self.base_url()))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        anyhow::ensure!(resp.status().as_u16() == 201, "create_user: {}", resp.status());
        let user_id = resp
            .headers()
            .get("user_id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| anyhow::anyhow!("missing user_id header"))?;
        Ok(user_id.to_owned())
    }

    pub async fn login(&self, username: &str, password: &str) -> anyhow::Result<String> {
        let resp = self
            .client
            .post(format!("{}/auth/login", self.base_url()))
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        anyhow::ensure!(resp.status().is_success(), "login: {}", resp.status());
        let body: serde_json::Value = resp.json().await?;
        body["access_token"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| anyhow::anyhow!("missing access_token"))
    }

    pub async fn deactivate(&self, user_id: &str) -> anyhow::Result<()> {
        let resp = self
            .client
            .post(format!("{}/auth/users/{user_id}/deactivate", self.base_url()))
            .send()
            .await?;
        anyhow::ensure!(resp.status().is_success(), "deactivate: {}", resp.status());
        Ok(())
    }
}

/// Start an upstream and a proxy pointed at it.
pub async fn start_pair(websocket_mode: bool) -> anyhow::Result<(TestUpstream, TestProxy)> {
    let upstream = TestUpstream::start().await?;
    let proxy = TestProxy::start(&upstream.addr.to_string(), websocket_mode).await?;
    Ok((upstream, proxy))
}
