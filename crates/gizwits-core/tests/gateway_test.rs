#![allow(clippy::unwrap_used)]
// Gateway scenarios against a wiremock directory service and in-memory relay sockets.

use std::sync::Arc;
use std::time::Duration;

use gizwits_api::frame::parse_frame;
use gizwits_api::{InboundMessage, OutboundMessage};
use gizwits_core::{
    BindInfo, ChannelKind, ChannelStatus, CoreError, DeviceType, Gateway, GatewayConfig,
    GatewayEvent, MemoryConnector, MemorySocket, SubDeviceCandidate,
};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const D1: &str = "D1D1D1D1D1D1D1D1D1D1D1";
const CHILD: &str = "C0C0C0C0C0C0C0C0C0C0C0";
const PK: &str = "0123456789abcdef0123456789abcdef";

// ── Helpers ─────────────────────────────────────────────────────────

struct Harness {
    server: MockServer,
    gateway: Gateway,
    sockets: mpsc::UnboundedReceiver<MemorySocket>,
    events: broadcast::Receiver<GatewayEvent>,
}

async fn setup() -> Harness {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/app/users"))
        .and(header("X-Gizwits-Application-Id", "app-1"))
        .and(body_json(json!({ "phone_id": "open-1", "lang": "en" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "uid": "u-1",
            "token": "tok-1"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/app/bindings"))
        .and(query_param("skip", "0"))
        .and(header("X-Gizwits-User-token", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": [{
                "did": D1,
                "mac": "aabbccddeeff",
                "product_key": PK,
                "is_online": true,
                "dev_alias": "hub",
                "remark": "",
                "type": "center_control",
                "host": "m2m.example.com",
                "ws_port": 8080,
                "wss_port": 8880
            }]
        })))
        .mount(&server)
        .await;

    let address = server.address();
    let mut config = GatewayConfig::new("app-1", SecretString::from("open-1".to_string()));
    config.api_host = format!("{}:{}", address.ip(), address.port());
    config.use_tls = false;

    let (connector, sockets) = MemoryConnector::new();
    let gateway = Gateway::with_connector(config, Arc::new(connector)).unwrap();
    let events = gateway.events();
    Harness {
        server,
        gateway,
        sockets,
        events,
    }
}

async fn next_socket(sockets: &mut mpsc::UnboundedReceiver<MemorySocket>) -> MemorySocket {
    tokio::time::timeout(Duration::from_secs(5), sockets.recv())
        .await
        .unwrap()
        .unwrap()
}

async fn next_sent(socket: &mut MemorySocket) -> OutboundMessage {
    tokio::time::timeout(Duration::from_secs(5), socket.recv())
        .await
        .unwrap()
        .unwrap()
}

async fn next_event(events: &mut broadcast::Receiver<GatewayEvent>) -> GatewayEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap()
}

/// Complete the handshake on one socket and return its channel kind.
async fn handshake(socket: &mut MemorySocket) -> ChannelKind {
    socket.accept();
    let OutboundMessage::Login(login) = next_sent(socket).await else {
        panic!("expected login_req");
    };
    assert_eq!(login.appid, "app-1");
    assert_eq!(login.uid, "u-1");
    assert_eq!(login.token, "tok-1");
    assert!(!login.auto_subscribe);

    socket.reply(InboundMessage::LoginResult { success: true });
    assert_eq!(next_sent(socket).await, OutboundMessage::subscribe([D1]));
    login.p0_type
}

/// Initialize, connect D1, and return its (attrs, custom) sockets.
async fn connected(h: &mut Harness) -> (MemorySocket, MemorySocket) {
    h.gateway.init().await.unwrap();
    assert!(matches!(
        next_event(&mut h.events).await,
        GatewayEvent::Initialized { .. }
    ));

    h.gateway.connect(D1).unwrap();
    let mut first = next_socket(&mut h.sockets).await;
    let mut second = next_socket(&mut h.sockets).await;
    let first_kind = handshake(&mut first).await;
    let second_kind = handshake(&mut second).await;

    let (attrs, mut custom) = if first_kind == ChannelKind::AttrsV4 {
        assert_eq!(second_kind, ChannelKind::Custom);
        (first, second)
    } else {
        assert_eq!(second_kind, ChannelKind::AttrsV4);
        (second, first)
    };

    custom.reply(InboundMessage::SubscribeResult {
        success: vec![D1.into()],
        failed: vec![],
    });
    assert_eq!(
        next_event(&mut h.events).await,
        GatewayEvent::Connected { did: D1.into() }
    );
    assert!(custom.try_recv().is_none());
    (attrs, custom)
}

fn list_frame(sub_did: u32) -> Vec<u8> {
    let mut payload = vec![0x00, 0x01];
    payload.extend_from_slice(PK.as_bytes());
    payload.extend_from_slice(&[0x00, 0x01]);
    payload.extend_from_slice(&sub_did.to_be_bytes());
    payload.push(1);
    payload.push(2);
    payload.extend_from_slice(b"AA");
    payload.extend_from_slice(CHILD.as_bytes());

    let mut body = vec![0x00, 0x00, 0x93, 0x00, 0x00, 0x00, 0x01, 0x5B];
    body.extend(payload);
    let mut raw = vec![0x00, 0x00, 0x00, 0x03];
    raw.extend(gizwits_api::frame::varlen::encode(body.len()));
    raw.extend(body);
    raw
}

// ── Init ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_init_loads_bound_devices() {
    let mut h = setup().await;
    let devices = h.gateway.init().await.unwrap();

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].did, D1);
    assert_eq!(devices[0].alias, "hub");
    assert_eq!(devices[0].device_type, DeviceType::CenterControl);
    assert!(h.gateway.is_initialized());

    let GatewayEvent::Initialized { devices: announced } = next_event(&mut h.events).await else {
        panic!("expected Initialized");
    };
    assert_eq!(announced, devices);
}

#[tokio::test]
async fn test_init_failure_emits_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/app/users"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad app"))
        .mount(&server)
        .await;

    let address = server.address();
    let mut config = GatewayConfig::new("app-1", SecretString::from("open-1".to_string()));
    config.api_host = format!("{}:{}", address.ip(), address.port());
    config.use_tls = false;
    let (connector, _sockets) = MemoryConnector::new();
    let gateway = Gateway::with_connector(config, Arc::new(connector)).unwrap();
    let mut events = gateway.events();

    let err = gateway.init().await.unwrap_err();
    assert!(matches!(err, CoreError::Api { .. }));
    assert!(gateway.bound_devices().is_none());
    assert!(matches!(
        next_event(&mut events).await,
        GatewayEvent::Error { .. }
    ));
    assert!(matches!(
        gateway.connect(D1),
        Err(CoreError::NotInitialized { .. })
    ));
}

#[tokio::test]
async fn test_unknown_device_is_not_found() {
    let h = setup().await;
    h.gateway.init().await.unwrap();
    assert!(matches!(
        h.gateway.connect("nobody"),
        Err(CoreError::DeviceNotFound { .. })
    ));
    assert!(matches!(
        h.gateway.write("nobody", Some(json!({})), None),
        Err(CoreError::DeviceNotFound { .. })
    ));
}

// ── Sessions ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_opens_two_secure_sockets() {
    let mut h = setup().await;
    h.gateway.init().await.unwrap();
    h.gateway.connect(D1).unwrap();

    let mut a = next_socket(&mut h.sockets).await;
    let mut b = next_socket(&mut h.sockets).await;
    assert_eq!(a.url.as_str(), "wss://m2m.example.com:8880/ws/app/v1");
    assert_eq!(b.url.as_str(), "wss://m2m.example.com:8880/ws/app/v1");

    let mut kinds = vec![handshake(&mut a).await, handshake(&mut b).await];
    kinds.sort();
    assert_eq!(kinds, vec![ChannelKind::AttrsV4, ChannelKind::Custom]);

    tokio::task::yield_now().await;
    for kind in ChannelKind::ALL {
        assert_eq!(
            h.gateway.channel_status(D1, kind).unwrap(),
            Some(ChannelStatus::Ready)
        );
    }
}

#[tokio::test]
async fn test_read_and_write_route_by_channel() {
    let mut h = setup().await;
    let (mut attrs, mut custom) = connected(&mut h).await;

    assert!(h.gateway.read(D1, None).unwrap());
    let OutboundMessage::Read(read) = next_sent(&mut attrs).await else {
        panic!("expected c2s_read");
    };
    assert_eq!(read.did, D1);
    assert!(read.names.is_none());

    assert!(
        h.gateway
            .write(D1, Some(json!({ "power": true })), Some(vec![9, 9]))
            .unwrap()
    );
    let OutboundMessage::Write(write) = next_sent(&mut attrs).await else {
        panic!("expected c2s_write");
    };
    assert_eq!(write.attrs, json!({ "power": true }));
    assert_eq!(
        next_sent(&mut custom).await,
        OutboundMessage::raw(D1, vec![9, 9])
    );

    assert!(matches!(
        h.gateway.write(D1, None, None),
        Err(CoreError::Validation { .. })
    ));
}

#[tokio::test]
#[allow(deprecated)]
async fn test_legacy_send_is_raw_write() {
    let mut h = setup().await;
    let (_attrs, mut custom) = connected(&mut h).await;
    assert!(h.gateway.send(D1, vec![4, 2]).unwrap());
    assert_eq!(
        next_sent(&mut custom).await,
        OutboundMessage::raw(D1, vec![4, 2])
    );
}

#[tokio::test]
async fn test_device_traffic_becomes_events() {
    let mut h = setup().await;
    let (attrs, custom) = connected(&mut h).await;

    attrs.reply(InboundMessage::Notification {
        did: D1.into(),
        attrs: json!({ "temp": 21 }),
    });
    assert_eq!(
        next_event(&mut h.events).await,
        GatewayEvent::AttrsReceived {
            did: D1.into(),
            attrs: json!({ "temp": 21 })
        }
    );

    custom.reply(InboundMessage::OnlineStatus {
        did: D1.into(),
        online: false,
    });
    assert_eq!(
        next_event(&mut h.events).await,
        GatewayEvent::OnlineStatusChanged {
            did: D1.into(),
            online: false
        }
    );
    assert!(!h.gateway.bound_devices().unwrap()[0].is_online);

    custom.reply(InboundMessage::Raw {
        did: D1.into(),
        raw: vec![7, 7, 7],
    });
    assert_eq!(
        next_event(&mut h.events).await,
        GatewayEvent::RawReceived {
            did: D1.into(),
            raw: vec![7, 7, 7]
        }
    );
}

#[tokio::test]
async fn test_write_on_closed_socket_reports_not_sent() {
    let mut h = setup().await;
    let (_attrs, custom) = connected(&mut h).await;

    custom.close(1006, "gone");
    assert!(matches!(
        next_event(&mut h.events).await,
        GatewayEvent::Error { .. }
    ));

    assert!(!h.gateway.write(D1, None, Some(vec![1])).unwrap());
    // The send failure starts a reconnect of the custom channel.
    let mut fresh = next_socket(&mut h.sockets).await;
    assert_eq!(handshake(&mut fresh).await, ChannelKind::Custom);
}

// ── Sub-devices ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_add_sub_devices_encodes_macs() {
    let mut h = setup().await;
    let (_attrs, mut custom) = connected(&mut h).await;

    let candidates = [SubDeviceCandidate::with_mac("AA"), SubDeviceCandidate::default()];
    assert!(h.gateway.add_sub_devices(D1, &candidates).unwrap());

    let OutboundMessage::Raw(raw) = next_sent(&mut custom).await else {
        panic!("expected c2s_raw");
    };
    assert_eq!(raw.did, D1);
    let frame = parse_frame(&raw.raw).unwrap();
    assert_eq!(frame.action, 0x56);
    assert_eq!(frame.payload, &[0x00, 0x01, 0x02, 65, 65]);
}

#[tokio::test]
async fn test_add_sub_devices_skips_empty_macs() {
    let mut h = setup().await;
    let (_attrs, mut custom) = connected(&mut h).await;

    let candidates = [
        SubDeviceCandidate::with_mac(""),
        SubDeviceCandidate::with_mac("BB"),
    ];
    assert!(h.gateway.add_sub_devices(D1, &candidates).unwrap());

    let OutboundMessage::Raw(raw) = next_sent(&mut custom).await else {
        panic!("expected c2s_raw");
    };
    let frame = parse_frame(&raw.raw).unwrap();
    assert_eq!(frame.payload, &[0x00, 0x01, 0x02, 66, 66]);
}

#[tokio::test]
async fn test_add_sub_devices_without_any_mac_is_rejected() {
    let mut h = setup().await;
    let (_attrs, mut custom) = connected(&mut h).await;

    for candidates in [
        vec![SubDeviceCandidate::default()],
        vec![SubDeviceCandidate::with_mac(""), SubDeviceCandidate::default()],
    ] {
        assert!(matches!(
            h.gateway.add_sub_devices(D1, &candidates),
            Err(CoreError::Validation { .. })
        ));
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(custom.try_recv().is_none());

    // An empty list is still an unfiltered add.
    assert!(h.gateway.add_sub_devices(D1, &[]).unwrap());
    let OutboundMessage::Raw(raw) = next_sent(&mut custom).await else {
        panic!("expected c2s_raw");
    };
    assert_eq!(parse_frame(&raw.raw).unwrap().payload, &[0x00, 0x00]);
}

#[tokio::test]
async fn test_sequence_numbers_increase_across_requests() {
    let mut h = setup().await;
    let (_attrs, mut custom) = connected(&mut h).await;

    let mut sequences = Vec::new();
    for _ in 0..3 {
        assert!(h.gateway.list_sub_devices(D1).unwrap());
        let OutboundMessage::Raw(raw) = next_sent(&mut custom).await else {
            panic!("expected c2s_raw");
        };
        let frame = parse_frame(&raw.raw).unwrap();
        assert_eq!(frame.action, 0x5A);
        sequences.push(frame.sequence.unwrap());
    }
    assert_eq!(sequences, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_delete_requires_listing_and_skips_unknown() {
    let mut h = setup().await;
    let (_attrs, mut custom) = connected(&mut h).await;

    assert!(matches!(
        h.gateway.delete_sub_devices(D1, &[CHILD.into()]),
        Err(CoreError::NotInitialized { .. })
    ));
    assert!(matches!(
        h.gateway.delete_sub_devices(D1, &[]),
        Err(CoreError::Validation { .. })
    ));

    custom.reply(InboundMessage::Raw {
        did: D1.into(),
        raw: list_frame(42),
    });
    let GatewayEvent::SubDevicesUpdated { sub_devices, .. } = next_event(&mut h.events).await
    else {
        panic!("expected SubDevicesUpdated");
    };
    assert_eq!(sub_devices.len(), 1);
    assert_eq!(h.gateway.sub_devices(D1).unwrap()[0].did, CHILD);

    let sent = h
        .gateway
        .delete_sub_devices(D1, &["unknown".into(), CHILD.into()])
        .unwrap();
    assert_eq!(sent, 1);

    let OutboundMessage::Raw(raw) = next_sent(&mut custom).await else {
        panic!("expected c2s_raw");
    };
    let frame = parse_frame(&raw.raw).unwrap();
    assert_eq!(frame.action, 0x58);
    assert_eq!(frame.payload, &42u32.to_be_bytes());
    assert!(custom.try_recv().is_none());
}

// ── Binding ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_bind_device_adds_sub_device() {
    let mut h = setup().await;
    h.gateway.init().await.unwrap();
    next_event(&mut h.events).await;

    Mock::given(method("POST"))
        .and(path("/bind"))
        .and(body_json(json!({
            "wechat_openId": "open-1",
            "mac": "AA",
            "product_key": PK
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "did": CHILD,
            "mac": "AA",
            "product_key": PK,
            "netStatus": "online"
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let url = Url::parse(&format!("{}/bind", h.server.uri())).unwrap();
    let info = BindInfo {
        mac: "AA".into(),
        product_key: PK.into(),
        parent: Some(D1.into()),
    };
    let bound = h.gateway.bind_device(url, info).await.unwrap().unwrap();
    assert_eq!(bound.did, CHILD);
    assert_eq!(bound.device_type, DeviceType::SubDevice);
    assert!(bound.is_online);
    assert_eq!(bound.wss_port, Some(8880));

    let GatewayEvent::Initialized { devices } = next_event(&mut h.events).await else {
        panic!("expected Initialized");
    };
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[1].did, CHILD);
}

#[tokio::test]
async fn test_bind_response_without_did_is_ignored() {
    let mut h = setup().await;
    h.gateway.init().await.unwrap();
    next_event(&mut h.events).await;

    Mock::given(method("POST"))
        .and(path("/bind"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "mac": "AA",
            "product_key": PK
        })))
        .mount(&h.server)
        .await;

    let url = Url::parse(&format!("{}/bind", h.server.uri())).unwrap();
    let info = BindInfo {
        mac: "AA".into(),
        product_key: PK.into(),
        parent: None,
    };
    assert!(h.gateway.bind_device(url, info).await.unwrap().is_none());
    assert_eq!(h.gateway.bound_devices().unwrap().len(), 1);
    assert!(h.events.try_recv().is_err());
}

// ── Shutdown ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_shutdown_closes_sockets() {
    let mut h = setup().await;
    let (attrs, custom) = connected(&mut h).await;

    h.gateway.shutdown();
    assert!(attrs.is_closed());
    assert!(custom.is_closed());
    assert_eq!(
        h.gateway.channel_status(D1, ChannelKind::Custom).unwrap(),
        None
    );
}
