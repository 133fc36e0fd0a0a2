// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests: a real proxy listener in front of a real (fake)
//! upstream, exercised over HTTP passthrough and WebSocket.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use wicket_specs::{start_pair, TestProxy};

const TIMEOUT: Duration = Duration::from_secs(10);

type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn ws_connect(proxy: &TestProxy, path: &str) -> anyhow::Result<WsClient> {
    let (ws, _) = tokio_tungstenite::connect_async(proxy.ws_url(path)).await?;
    Ok(ws)
}

async fn next_message(ws: &mut WsClient) -> anyhow::Result<Message> {
    let message = tokio::time::timeout(TIMEOUT, ws.next())
        .await?
        .ok_or_else(|| anyhow::anyhow!("ws stream ended"))??;
    Ok(message)
}

fn close_code(message: &Message) -> Option<u16> {
    match message {
        Message::Close(Some(frame)) => Some(u16::from(frame.code)),
        _ => None,
    }
}

// -- HTTP passthrough ---------------------------------------------------------

#[tokio::test]
async fn http_passthrough_injects_identity_and_relays() -> anyhow::Result<()> {
    let (_upstream, proxy) = start_pair(false).await?;
    let user_id = proxy.create_user("test", "test").await?;
    let token = proxy.login("test", "test").await?;

    let resp = proxy
        .http()
        .get(format!("{}/widgets/7?since=42", proxy.base_url()))
        .header("Authorization", format!("Bearer {token}"))
        .header("X-Probe", "kept")
        .send()
        .await?;

    assert_eq!(resp.status().as_u16(), 200);
    // Upstream marker header relayed; its ETag suppressed.
    assert_eq!(
        resp.headers().get("x-upstream").and_then(|v| v.to_str().ok()),
        Some("present")
    );
    assert!(resp.headers().get("etag").is_none());

    let echo: serde_json::Value = resp.json().await?;
    assert_eq!(echo["method"], "GET");
    assert_eq!(echo["path"], "/widgets/7?since=42");
    assert_eq!(echo["user_id"], user_id);
    assert_eq!(echo["username"], "test");
    assert_eq!(echo["x_probe"], "kept");
    Ok(())
}

#[tokio::test]
async fn http_passthrough_relays_post_bodies() -> anyhow::Result<()> {
    let (_upstream, proxy) = start_pair(false).await?;
    proxy.create_user("test", "test").await?;
    let token = proxy.login("test", "test").await?;

    let resp = proxy
        .http()
        .post(format!("{}/ingest", proxy.base_url()))
        .header("Authorization", format!("Bearer {token}"))
        .body("payload-bytes")
        .send()
        .await?;

    assert_eq!(resp.status().as_u16(), 200);
    let echo: serde_json::Value = resp.json().await?;
    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["body"], "payload-bytes");
    Ok(())
}

#[tokio::test]
async fn http_all_methods_pass_through() -> anyhow::Result<()> {
    let (_upstream, proxy) = start_pair(false).await?;
    proxy.create_user("test", "test").await?;
    let token = proxy.login("test", "test").await?;

    for method in ["PUT", "DELETE", "PATCH"] {
        let resp = proxy
            .http()
            .request(method.parse()?, format!("{}/resource/9", proxy.base_url()))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await?;
        assert_eq!(resp.status().as_u16(), 200);
        let echo: serde_json::Value = resp.json().await?;
        assert_eq!(echo["method"], method, "method {method} was not relayed");
    }
    Ok(())
}

#[tokio::test]
async fn http_passthrough_requires_a_token() -> anyhow::Result<()> {
    let (_upstream, proxy) = start_pair(false).await?;

    let resp = proxy.http().get(format!("{}/widgets", proxy.base_url())).send().await?;
    assert_eq!(resp.status().as_u16(), 401);

    let resp = proxy
        .http()
        .get(format!("{}/widgets", proxy.base_url()))
        .header("Authorization", "Bearer bogus")
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 401);
    Ok(())
}

#[tokio::test]
async fn http_upstream_statuses_pass_through() -> anyhow::Result<()> {
    let (_upstream, proxy) = start_pair(false).await?;
    proxy.create_user("test", "test").await?;
    let token = proxy.login("test", "test").await?;

    for code in [400u16, 404, 418, 503] {
        let resp = proxy
            .http()
            .get(format!("{}/status/{code}", proxy.base_url()))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await?;
        assert_eq!(resp.status().as_u16(), code, "status {code} was not relayed");
    }
    Ok(())
}

#[tokio::test]
async fn http_dead_upstream_is_a_502() -> anyhow::Result<()> {
    // Port 1 refuses connections; only the dial failure is ours to report.
    let proxy = TestProxy::start("127.0.0.1:1", false).await?;
    proxy.create_user("test", "test").await?;
    let token = proxy.login("test", "test").await?;

    let resp = proxy
        .http()
        .get(format!("{}/widgets", proxy.base_url()))
        .header("Authorization", format!("Bearer {token}"))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 502);
    Ok(())
}

// -- WebSocket ----------------------------------------------------------------

#[tokio::test]
async fn ws_auth_deadline_closes_401() -> anyhow::Result<()> {
    let (_upstream, proxy) = start_pair(true).await?;

    let mut ws = ws_connect(&proxy, "/chat").await?;
    // Send nothing; the 2-second window must elapse and close us out.
    let message = next_message(&mut ws).await?;
    assert_eq!(close_code(&message), Some(401));
    Ok(())
}

#[tokio::test]
async fn ws_bogus_bearer_closes_401() -> anyhow::Result<()> {
    let (_upstream, proxy) = start_pair(true).await?;

    let mut ws = ws_connect(&proxy, "/chat").await?;
    ws.send(Message::Text("Authorization: Bearer bogus".into())).await?;
    let message = next_message(&mut ws).await?;
    assert_eq!(close_code(&message), Some(401));
    Ok(())
}

#[tokio::test]
async fn ws_non_bearer_first_frame_closes_401() -> anyhow::Result<()> {
    let (_upstream, proxy) = start_pair(true).await?;

    let mut ws = ws_connect(&proxy, "/chat").await?;
    ws.send(Message::Text("hello there".into())).await?;
    let message = next_message(&mut ws).await?;
    assert_eq!(close_code(&message), Some(401));
    Ok(())
}

#[tokio::test]
async fn ws_preamble_then_verbatim_relay() -> anyhow::Result<()> {
    let (upstream, proxy) = start_pair(true).await?;
    let user_id = proxy.create_user("test", "test").await?;
    let token = proxy.login("test", "test").await?;

    let mut ws = ws_connect(&proxy, "/chat").await?;
    ws.send(Message::Text(format!("Authorization: Bearer {token}").into())).await?;
    ws.send(Message::Text("hello".into())).await?;

    // The upstream echoes everything it gets, so the client first sees the
    // preamble bounce back, then its own frame.
    let first = next_message(&mut ws).await?;
    assert_eq!(first, Message::Text(format!("USER_ID: {user_id}").into()));
    let second = next_message(&mut ws).await?;
    assert_eq!(second, Message::Text("hello".into()));

    // And the upstream's own log starts with the preamble.
    let received = upstream.received().await;
    assert_eq!(received.first().map(String::as_str), Some(format!("USER_ID: {user_id}").as_str()));
    Ok(())
}

#[tokio::test]
async fn ws_frames_sent_during_dial_arrive_in_order() -> anyhow::Result<()> {
    let (upstream, proxy) = start_pair(true).await?;
    let user_id = proxy.create_user("test", "test").await?;
    let token = proxy.login("test", "test").await?;

    let mut ws = ws_connect(&proxy, "/chat").await?;
    ws.send(Message::Text(format!("Authorization: Bearer {token}").into())).await?;
    // Fire immediately after the auth frame; some of these race the
    // upstream dial and sit in the pending queue.
    for frame in ["one", "two", "three"] {
        ws.send(Message::Text(frame.into())).await?;
    }

    for expected in [format!("USER_ID: {user_id}"), "one".into(), "two".into(), "three".into()] {
        let message = next_message(&mut ws).await?;
        assert_eq!(message, Message::Text(expected.into()));
    }

    let received = upstream.received().await;
    assert_eq!(
        received,
        vec![format!("USER_ID: {user_id}"), "one".into(), "two".into(), "three".into()]
    );
    Ok(())
}

#[tokio::test]
async fn ws_revocation_withholds_frames_and_closes_401() -> anyhow::Result<()> {
    let (_upstream, proxy) = start_pair(true).await?;
    let user_id = proxy.create_user("test", "test").await?;
    let token = proxy.login("test", "test").await?;

    let mut ws = ws_connect(&proxy, "/chat").await?;
    ws.send(Message::Text(format!("Authorization: Bearer {token}").into())).await?;
    ws.send(Message::Text("before".into())).await?;
    let first = next_message(&mut ws).await?;
    assert_eq!(close_code(&first), None, "session should be open: {first:?}");

    // Deactivation deletes the session mirror entries. The next upstream
    // frame headed our way must be withheld in favor of a 401 close.
    proxy.deactivate(&user_id).await?;
    ws.send(Message::Text("after".into())).await?;

    loop {
        let message = next_message(&mut ws).await?;
        match close_code(&message) {
            Some(code) => {
                assert_eq!(code, 401);
                break;
            }
            None => {
                assert_ne!(
                    message,
                    Message::Text("after".into()),
                    "revoked session leaked a frame"
                );
            }
        }
    }
    Ok(())
}

#[tokio::test]
async fn ws_upstream_close_propagates_to_client() -> anyhow::Result<()> {
    let (_upstream, proxy) = start_pair(true).await?;
    proxy.create_user("test", "test").await?;
    let token = proxy.login("test", "test").await?;

    let mut ws = ws_connect(&proxy, "/chat").await?;
    ws.send(Message::Text(format!("Authorization: Bearer {token}").into())).await?;
    ws.send(Message::Text("goodbye".into())).await?;

    loop {
        let message = next_message(&mut ws).await?;
        if let Some(code) = close_code(&message) {
            assert_eq!(code, 1000);
            break;
        }
    }
    Ok(())
}

#[tokio::test]
async fn ws_client_close_tears_down_quietly() -> anyhow::Result<()> {
    let (_upstream, proxy) = start_pair(true).await?;
    proxy.create_user("test", "test").await?;
    let token = proxy.login("test", "test").await?;

    let mut ws = ws_connect(&proxy, "/chat").await?;
    ws.send(Message::Text(format!("Authorization: Bearer {token}").into())).await?;
    ws.send(Message::Text("hello".into())).await?;
    let _ = next_message(&mut ws).await?;

    ws.close(None).await?;
    // Drain until the stream ends; the proxy must not error out.
    while let Ok(Some(_)) = tokio::time::timeout(TIMEOUT, ws.next()).await {}
    Ok(())
}
