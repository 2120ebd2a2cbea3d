#![allow(clippy::unwrap_used)]
// End-to-end: real websocket sockets against an in-process relay.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gizwits_core::{ChannelKind, ChannelStatus, Gateway, GatewayConfig, GatewayEvent};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const D1: &str = "E2EE2EE2EE2EE2EE2EE2E2";

// ── Relay ───────────────────────────────────────────────────────────

/// Accept relay sockets forever. Logins succeed, subscriptions succeed,
/// pings get pongs, and raw data is echoed back as `s2c_raw`.
async fn spawn_relay() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve(stream));
        }
    });
    addr
}

async fn serve(stream: TcpStream) {
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    let mut p0_type = String::new();

    while let Some(Ok(msg)) = ws.next().await {
        let Message::Text(text) = msg else {
            continue;
        };
        let value: Value = serde_json::from_str(text.as_str()).unwrap();
        let reply = match value["cmd"].as_str() {
            Some("login_req") => {
                assert_eq!(value["data"]["auto_subscribe"], json!(false));
                p0_type = value["data"]["p0_type"].as_str().unwrap().to_owned();
                json!({ "cmd": "login_res", "data": { "success": true } })
            }
            Some("subscribe_req") => {
                json!({
                    "cmd": "subscribe_res",
                    "data": { "success": value["data"].clone(), "failed": [] }
                })
            }
            Some("ping") => json!({ "cmd": "pong" }),
            Some("c2s_raw") if p0_type == "custom" => {
                json!({ "cmd": "s2c_raw", "data": value["data"].clone() })
            }
            Some("c2s_write") => {
                json!({ "cmd": "s2c_noti", "data": value["data"].clone() })
            }
            _ => continue,
        };
        if ws.send(Message::text(reply.to_string())).await.is_err() {
            break;
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

async fn gateway(relay: SocketAddr) -> (MockServer, Gateway) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/app/users"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "uid": "u", "token": "t" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/app/bindings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": [{
                "did": D1,
                "type": "center_control",
                "host": relay.ip().to_string(),
                "ws_port": relay.port()
            }]
        })))
        .mount(&server)
        .await;

    let address = server.address();
    let mut config = GatewayConfig::new("app", SecretString::from("open".to_string()));
    config.api_host = format!("{}:{}", address.ip(), address.port());
    config.use_tls = false;
    (server, Gateway::new(config).unwrap())
}

async fn wait_for<F>(events: &mut broadcast::Receiver<GatewayEvent>, mut pred: F) -> GatewayEvent
where
    F: FnMut(&GatewayEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = events.recv().await.unwrap();
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_and_exchange_over_real_sockets() {
    let relay = spawn_relay().await;
    let (_server, gw) = gateway(relay).await;
    let mut events = gw.events();

    gw.init().await.unwrap();
    gw.connect(D1).unwrap();

    wait_for(&mut events, |e| matches!(e, GatewayEvent::Connected { .. })).await;
    assert_eq!(
        gw.channel_status(D1, ChannelKind::Custom).unwrap(),
        Some(ChannelStatus::Ready)
    );

    // The attrs socket may still be finishing its handshake.
    let mut attempts = 0;
    while gw.channel_status(D1, ChannelKind::AttrsV4).unwrap() != Some(ChannelStatus::Ready) {
        attempts += 1;
        assert!(attempts < 100, "attrs channel never became ready");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(gw.write(D1, Some(json!({ "power": true })), Some(vec![1, 2, 3])).unwrap());

    // The two channels are independent, so either echo may arrive first.
    let mut raw = None;
    let mut attrs = None;
    while raw.is_none() || attrs.is_none() {
        match wait_for(&mut events, |e| {
            matches!(
                e,
                GatewayEvent::RawReceived { .. } | GatewayEvent::AttrsReceived { .. }
            )
        })
        .await
        {
            e @ GatewayEvent::RawReceived { .. } => raw = Some(e),
            e => attrs = Some(e),
        }
    }
    assert_eq!(
        raw.unwrap(),
        GatewayEvent::RawReceived {
            did: D1.into(),
            raw: vec![1, 2, 3]
        }
    );
    assert_eq!(
        attrs.unwrap(),
        GatewayEvent::AttrsReceived {
            did: D1.into(),
            attrs: json!({ "power": true })
        }
    );

    gw.shutdown();
}

#[tokio::test]
async fn test_unreachable_relay_reports_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);

    let (_server, gw) = gateway(dead).await;
    let mut events = gw.events();
    gw.init().await.unwrap();
    gw.connect(D1).unwrap();

    let GatewayEvent::Error { kind, .. } =
        wait_for(&mut events, |e| matches!(e, GatewayEvent::Error { .. })).await
    else {
        unreachable!();
    };
    assert_eq!(kind.to_string(), "transport");
}
