// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket passthrough with an in-band authentication handshake.
//!
//! Each connection walks a fixed sequence of phases:
//!
//! - `AWAITING_AUTH`: a 2-second window for the client's first frame, which
//!   must carry a bearer token.
//! - `CONNECTING_UPSTREAM`: the upstream dial is in flight; client frames
//!   are buffered in order (bounded).
//! - `OPEN`: one identity preamble frame goes upstream, the buffer drains,
//!   then frames relay verbatim in both directions until either side closes.
//!
//! Auth failures and revocations surface to the client as close code 401.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::Uri;
use axum::response::{IntoResponse, Response};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::state::ProxyState;
use crate::token::Claim;
use crate::transport::auth;

/// How long the client has to present its bearer frame.
const AUTH_WINDOW: std::time::Duration = std::time::Duration::from_secs(2);

/// Frames buffered while the upstream dial is in flight. A chatty client
/// against a slow dial hits this and is disconnected rather than growing
/// the queue without bound.
const PENDING_LIMIT: usize = 256;

/// Close code delivered on every authentication and revocation failure.
const CLOSE_UNAUTHORIZED: u16 = 401;

type Upstream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Catch-all handler in WebSocket mode.
pub async fn ws_entry(
    State(state): State<Arc<ProxyState>>,
    uri: Uri,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| drive(socket, state, uri)).into_response()
}

/// Per-connection task: run the handshake phases to completion.
async fn drive(mut client: WebSocket, state: Arc<ProxyState>, uri: Uri) {
    let (claim, token) = match await_auth(&mut client, &state).await {
        AuthOutcome::Authenticated { claim, token } => (claim, token),
        AuthOutcome::Denied => {
            close_client(client, CLOSE_UNAUTHORIZED, "unauthorized").await;
            return;
        }
        AuthOutcome::Gone => return,
    };

    let target = upstream_url(&state.config.proxied_host, &uri);
    let (upstream, pending) = match connect_upstream(&mut client, &target).await {
        DialOutcome::Connected { upstream, pending } => (upstream, pending),
        DialOutcome::Overflow => {
            tracing::debug!(url = %target, "pending queue overflow during upstream dial");
            close_client(client, 1009, "too many frames queued").await;
            return;
        }
        DialOutcome::Failed => {
            close_client(client, 1011, "upstream unavailable").await;
            return;
        }
        DialOutcome::ClientGone => return,
    };

    tracing::debug!(url = %target, user_id = %claim.user_id, "websocket session open");
    pump(client, upstream, state, claim, token, pending).await;
}

enum AuthOutcome {
    Authenticated { claim: Claim, token: String },
    Denied,
    /// The client vanished before authenticating; nothing left to close.
    Gone,
}

/// `AWAITING_AUTH`: the first frame inside the window must authenticate.
async fn await_auth(client: &mut WebSocket, state: &ProxyState) -> AuthOutcome {
    let first = match tokio::time::timeout(AUTH_WINDOW, client.recv()).await {
        Ok(Some(Ok(message))) => message,
        Ok(Some(Err(_))) | Ok(None) => return AuthOutcome::Gone,
        Err(_) => return AuthOutcome::Denied,
    };

    let Message::Text(payload) = first else {
        return AuthOutcome::Denied;
    };
    let Some(token) = auth::parse_ws_auth(payload.as_str()) else {
        return AuthOutcome::Denied;
    };
    match auth::resolve_token(state, token).await {
        Ok(claim) => AuthOutcome::Authenticated { claim, token: token.to_owned() },
        Err(_) => AuthOutcome::Denied,
    }
}

enum DialOutcome {
    Connected { upstream: Upstream, pending: Vec<UpstreamMessage> },
    Overflow,
    Failed,
    ClientGone,
}

/// `CONNECTING_UPSTREAM`: dial the upstream while buffering client frames.
///
/// Returning on client close drops the dial future, cancelling the connect;
/// a socket it may still produce is closed by the runtime when dropped.
async fn connect_upstream(client: &mut WebSocket, target: &str) -> DialOutcome {
    let dial = tokio_tungstenite::connect_async(target);
    tokio::pin!(dial);
    let mut pending = Vec::new();

    loop {
        tokio::select! {
            dialed = &mut dial => {
                return match dialed {
                    Ok((upstream, _)) => DialOutcome::Connected { upstream, pending },
                    Err(e) => {
                        tracing::debug!(url = %target, err = %e, "upstream dial failed");
                        DialOutcome::Failed
                    }
                };
            }
            message = client.recv() => {
                match message {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        return DialOutcome::ClientGone;
                    }
                    Some(Ok(message)) => {
                        if let Some(forward) = client_to_upstream(message) {
                            pending.push(forward);
                            if pending.len() > PENDING_LIMIT {
                                return DialOutcome::Overflow;
                            }
                        }
                    }
                }
            }
        }
    }
}

/// `OPEN`: preamble, drain the buffer, then relay until either side closes.
async fn pump(
    client: WebSocket,
    upstream: Upstream,
    state: Arc<ProxyState>,
    claim: Claim,
    token: String,
    pending: Vec<UpstreamMessage>,
) {
    let (mut up_tx, mut up_rx) = upstream.split();
    let (mut client_tx, mut client_rx) = client.split();

    let preamble = UpstreamMessage::Text(format!("USER_ID: {}", claim.user_id).into());
    if up_tx.send(preamble).await.is_err() {
        close_client_tx(&mut client_tx, 1011, "upstream unavailable").await;
        return;
    }
    // Buffered frames drain in original arrival order; a fresh client frame
    // cannot overtake them because the relay loop below is the only writer.
    for message in pending {
        if up_tx.send(message).await.is_err() {
            close_client_tx(&mut client_tx, 1011, "upstream unavailable").await;
            return;
        }
    }

    loop {
        tokio::select! {
            message = client_rx.next() => {
                match message {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        let _ = up_tx.send(UpstreamMessage::Close(None)).await;
                        return;
                    }
                    Some(Ok(message)) => {
                        if let Some(forward) = client_to_upstream(message) {
                            if up_tx.send(forward).await.is_err() {
                                close_client_tx(
                                    &mut client_tx,
                                    CLOSE_UNAUTHORIZED,
                                    "unauthorized",
                                )
                                .await;
                                return;
                            }
                        }
                    }
                }
            }
            message = up_rx.next() => {
                match message {
                    Some(Ok(UpstreamMessage::Close(frame))) => {
                        // Propagate the upstream's close code; an upstream
                        // that revokes with a 401-equivalent close reaches
                        // the client unchanged.
                        let code = frame
                            .map(|f| u16::from(f.code))
                            .unwrap_or(CLOSE_UNAUTHORIZED);
                        close_client_tx(&mut client_tx, code, "").await;
                        return;
                    }
                    Some(Ok(message)) => {
                        let Some(forward) = upstream_to_client(message) else { continue };
                        // Revocation check: a frame for a session that no
                        // longer exists in the cache is withheld.
                        if !session_live(&state, &token, &claim).await {
                            close_client_tx(&mut client_tx, CLOSE_UNAUTHORIZED, "unauthorized")
                                .await;
                            let _ = up_tx.send(UpstreamMessage::Close(None)).await;
                            return;
                        }
                        if client_tx.send(forward).await.is_err() {
                            let _ = up_tx.send(UpstreamMessage::Close(None)).await;
                            return;
                        }
                    }
                    Some(Err(_)) | None => {
                        close_client_tx(&mut client_tx, CLOSE_UNAUTHORIZED, "unauthorized").await;
                        return;
                    }
                }
            }
        }
    }
}

/// Whether the session's `token → claim` entry still exists and still names
/// the same identity. Cache outages fail closed.
async fn session_live(state: &ProxyState, token: &str, claim: &Claim) -> bool {
    match state.cache.get(token).await {
        Ok(Some(raw)) => {
            serde_json::from_str::<Claim>(&raw).map(|cached| &cached == claim).unwrap_or(false)
        }
        _ => false,
    }
}

fn client_to_upstream(message: Message) -> Option<UpstreamMessage> {
    match message {
        Message::Text(text) => Some(UpstreamMessage::Text(text.to_string().into())),
        Message::Binary(bytes) => Some(UpstreamMessage::Binary(bytes)),
        // Ping/pong stay per-hop; close is handled by the callers.
        _ => None,
    }
}

fn upstream_to_client(message: UpstreamMessage) -> Option<Message> {
    match message {
        UpstreamMessage::Text(text) => Some(Message::Text(text.to_string().into())),
        UpstreamMessage::Binary(bytes) => Some(Message::Binary(bytes)),
        _ => None,
    }
}

fn upstream_url(proxied_host: &str, uri: &Uri) -> String {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("ws://{proxied_host}{path_and_query}")
}

async fn close_client(mut client: WebSocket, code: u16, reason: &'static str) {
    let _ = client
        .send(Message::Close(Some(CloseFrame { code, reason: reason.into() })))
        .await;
}

async fn close_client_tx(
    client_tx: &mut SplitSink<WebSocket, Message>,
    code: u16,
    reason: &'static str,
) {
    let _ = client_tx
        .send(Message::Close(Some(CloseFrame { code, reason: reason.into() })))
        .await;
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
