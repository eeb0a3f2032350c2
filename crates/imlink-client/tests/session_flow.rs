#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::time::Duration;

use bytes::Bytes;
use serde_json::json;

use imlink_client::config::ClientConfig;
use imlink_client::session::{LineKind, LoginState};
use imlink_client::transport::ConnectionState;
use imlink_client::{Client, ClientEvent};
use imlink_core::error::{ConnectError, SendError, SessionError};
use imlink_core::protocol::{text, FrameKind};

use common::{accept, next, obj, open, read_envelope, scripted};

#[tokio::test]
async fn login_success() {
    let (transport, mut links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    client.login("alice", "x").unwrap();
    assert_eq!(client.login_state(), LoginState::LoggingIn);
    let mut link = open(&mut client, &mut links).await;

    let req = read_envelope(&mut link).await;
    assert!(req.is("AUTH", "LOGIN"));
    assert_eq!(req.data["username"], "alice");
    assert_eq!(req.data["password"], "x");
    assert_eq!(client.pending_requests(), 1);

    link.text(text::encode("AUTH", "LOGIN", obj(json!({"ok": true})), Some(&req.request_id)));
    assert_eq!(next(&mut client).await, ClientEvent::LoginSuccess("alice".into()));
    assert_eq!(client.pending_requests(), 0);
    assert_eq!(client.login_state(), LoginState::Idle);
}

#[tokio::test]
async fn login_failure_uses_server_message() {
    let (transport, mut links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    client.login("alice", "wrong").unwrap();
    let mut link = open(&mut client, &mut links).await;
    let req = read_envelope(&mut link).await;

    link.text(text::encode(
        "AUTH",
        "LOGIN",
        obj(json!({"ok": false, "message": "bad password"})),
        Some(&req.request_id),
    ));
    assert_eq!(next(&mut client).await, ClientEvent::LoginFailure("bad password".into()));
    assert_eq!(client.login_state(), LoginState::Idle);
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn login_failure_without_message_uses_fallback() {
    let (transport, mut links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    client.login("alice", "x").unwrap();
    let mut link = open(&mut client, &mut links).await;
    let req = read_envelope(&mut link).await;

    link.text(text::encode("AUTH", "LOGIN", obj(json!({})), Some(&req.request_id)));
    assert_eq!(next(&mut client).await, ClientEvent::LoginFailure("login failed".into()));
}

#[tokio::test]
async fn mismatched_response_fails_login_even_with_ok() {
    let (transport, mut links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    client.login("alice", "x").unwrap();
    let mut link = open(&mut client, &mut links).await;
    let req = read_envelope(&mut link).await;

    link.text(text::encode(
        "SYS",
        "ERROR",
        obj(json!({"ok": true, "message": "server busy"})),
        Some(&req.request_id),
    ));
    assert_eq!(next(&mut client).await, ClientEvent::LoginFailure("server busy".into()));
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn second_login_while_in_flight_is_rejected() {
    let (transport, mut links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    client.login("alice", "x").unwrap();
    assert_eq!(client.login("bob", "y"), Err(SessionError::LoginInFlight));

    let mut link = open(&mut client, &mut links).await;
    let req = read_envelope(&mut link).await;
    assert_eq!(req.data["username"], "alice");
    assert_eq!(client.pending_requests(), 1);
}

#[tokio::test]
async fn blank_username_uses_default() {
    let (transport, mut links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    client.login("   ", "x").unwrap();
    let mut link = open(&mut client, &mut links).await;
    let req = read_envelope(&mut link).await;
    assert_eq!(req.data["username"], "User");
}

#[tokio::test]
async fn login_when_already_connected_issues_immediately() {
    let (transport, mut links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    client.connect().unwrap();
    let mut link = open(&mut client, &mut links).await;

    client.login("carol", "pw").unwrap();
    let req = read_envelope(&mut link).await;
    assert!(req.is("AUTH", "LOGIN"));
    assert_eq!(client.pending_requests(), 1);
}

#[tokio::test]
async fn invalid_server_address_fails_login_synchronously() {
    let (transport, _links) = scripted();
    let mut cfg = ClientConfig::default();
    cfg.server.url = Some("http://example.com".into());
    let mut client = Client::with_transport(cfg, transport);

    let err = client.login("alice", "x").unwrap_err();
    assert_eq!(
        err,
        SessionError::Connect(ConnectError::InvalidAddress("http://example.com".into()))
    );
    assert_eq!(client.login_state(), LoginState::Idle);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(client.try_next_event().is_none());
}

#[tokio::test]
async fn transport_error_during_connect_fails_login() {
    use imlink_core::error::{TransportError, TransportErrorKind};

    let (transport, mut links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    client.login("alice", "x").unwrap();
    assert_eq!(next(&mut client).await, ClientEvent::StateChanged(ConnectionState::Connecting));
    let (_url, link) = accept(&mut links).await;
    link.failed(TransportError::new(TransportErrorKind::Refused, "connection refused"));

    assert_eq!(next(&mut client).await, ClientEvent::ErrorOccurred("connection refused".into()));
    assert_eq!(next(&mut client).await, ClientEvent::LoginFailure("connection refused".into()));
    assert_eq!(next(&mut client).await, ClientEvent::StateChanged(ConnectionState::Disconnected));
    assert_eq!(client.login_state(), LoginState::Idle);
}

#[tokio::test]
async fn transport_error_after_request_cancels_it() {
    use imlink_core::error::{TransportError, TransportErrorKind};

    let (transport, mut links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    client.login("alice", "x").unwrap();
    let mut link = open(&mut client, &mut links).await;
    let _req = read_envelope(&mut link).await;
    assert_eq!(client.pending_requests(), 1);

    link.failed(TransportError::new(TransportErrorKind::PeerReset, "connection reset"));
    assert_eq!(next(&mut client).await, ClientEvent::ErrorOccurred("connection reset".into()));
    assert_eq!(next(&mut client).await, ClientEvent::LoginFailure("connection reset".into()));
    assert_eq!(next(&mut client).await, ClientEvent::StateChanged(ConnectionState::Disconnected));
    assert_eq!(next(&mut client).await, ClientEvent::Disconnected);
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn disconnect_during_login_fails_it() {
    let (transport, mut links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    client.login("alice", "x").unwrap();
    let mut link = open(&mut client, &mut links).await;
    let _req = read_envelope(&mut link).await;

    link.closed();
    assert_eq!(next(&mut client).await, ClientEvent::StateChanged(ConnectionState::Disconnected));
    assert_eq!(next(&mut client).await, ClientEvent::Disconnected);
    assert_eq!(next(&mut client).await, ClientEvent::LoginFailure("connection closed".into()));
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn malformed_inbound_is_displayed_raw_and_keeps_pending_login() {
    let (transport, mut links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    client.login("alice", "x").unwrap();
    let mut link = open(&mut client, &mut links).await;
    let req = read_envelope(&mut link).await;

    link.text("not json".into());
    match next(&mut client).await {
        ClientEvent::MessageDisplay(line) => {
            assert_eq!(line.kind, LineKind::Raw(FrameKind::Text));
            assert_eq!(line.text, "not json");
            assert!(line.to_string().ends_with("text raw: not json"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(client.pending_requests(), 1);
    assert_eq!(client.login_state(), LoginState::LoggingIn);

    link.text(text::encode("AUTH", "LOGIN", obj(json!({"ok": true})), Some(&req.request_id)));
    assert_eq!(next(&mut client).await, ClientEvent::LoginSuccess("alice".into()));
}

#[tokio::test]
async fn unsolicited_envelopes_are_rendered() {
    let (transport, mut links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    client.connect().unwrap();
    let link = open(&mut client, &mut links).await;

    link.text(text::encode(
        "MESSAGE",
        "SEND",
        obj(json!({"ok": true, "echo": {"content": "hello"}})),
        Some("whatever"),
    ));
    match next(&mut client).await {
        ClientEvent::MessageDisplay(line) => {
            assert_eq!(
                line.kind,
                LineKind::Received {
                    msg_type: "MESSAGE".into(),
                    action: "SEND".into()
                }
            );
            assert_eq!(line.text, "ok=true hello");
            assert!(line.to_string().ends_with("[MESSAGE/SEND] ok=true hello"));
        }
        other => panic!("unexpected {other:?}"),
    }

    link.binary(Bytes::from_static(b"\xffoops"));
    match next(&mut client).await {
        ClientEvent::MessageDisplay(line) => {
            assert_eq!(line.kind, LineKind::Raw(FrameKind::Binary));
            assert_eq!(line.text, "\u{fffd}oops");
        }
        other => panic!("unexpected {other:?}"),
    }

    let wire = text::encode("CHAT", "PUSH", obj(json!({"content": "via binary"})), None);
    link.binary(Bytes::from(wire));
    match next(&mut client).await {
        ClientEvent::MessageDisplay(line) => assert_eq!(line.text, "via binary"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn send_message_encodes_chat_envelope() {
    let (transport, mut links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    client.connect().unwrap();
    let mut link = open(&mut client, &mut links).await;

    client.send_message("conv-7", "  hello  ").unwrap();
    match next(&mut client).await {
        ClientEvent::MessageDisplay(line) => {
            assert_eq!(line.kind, LineKind::Sent);
            assert_eq!(line.text, "hello");
        }
        other => panic!("unexpected {other:?}"),
    }

    let env = read_envelope(&mut link).await;
    assert!(env.is("MESSAGE", "SEND"));
    assert!(!env.request_id.is_empty());
    assert_eq!(env.data["conversation_id"], "conv-7");
    assert_eq!(env.data["content"], "hello");
    assert_eq!(client.pending_requests(), 0);
}

#[tokio::test]
async fn empty_message_is_rejected_without_sending() {
    let (transport, mut links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    client.connect().unwrap();
    let mut link = open(&mut client, &mut links).await;

    assert_eq!(client.send_message("conv-7", "   "), Err(SessionError::EmptyMessage));
    assert!(client.try_next_event().is_none());
    let nothing = tokio::time::timeout(Duration::from_millis(50), link.next_outbound()).await;
    assert!(nothing.is_err(), "no frame may be written");
}

#[tokio::test]
async fn send_while_disconnected_reports_error_event() {
    let (transport, _links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    assert_eq!(
        client.send_message("conv-7", "hi"),
        Err(SessionError::Send(SendError::NotConnected))
    );
    assert_eq!(
        client.try_next_event(),
        Some(ClientEvent::ErrorOccurred("websocket is not connected".into()))
    );
}

#[tokio::test(start_paused = true)]
async fn login_timeout_when_enabled() {
    let (transport, mut links) = scripted();
    let cfg = imlink_client::config::load_from_str(
        r#"
version: 1
login:
  timeout_ms: 1500
"#,
    )
    .unwrap();
    let mut client = Client::with_transport(cfg, transport);

    client.login("alice", "x").unwrap();
    let mut link = open(&mut client, &mut links).await;
    let _req = read_envelope(&mut link).await;

    assert_eq!(next(&mut client).await, ClientEvent::LoginFailure("request timed out".into()));
    assert_eq!(client.pending_requests(), 0);
    assert_eq!(client.login_state(), LoginState::Idle);
}

#[tokio::test]
async fn probe_reports_local_state() {
    let (transport, mut links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    let (state, line) = client.probe();
    assert_eq!(state, ConnectionState::Disconnected);
    assert_eq!(line.text, "connectivity: not connected");

    client.connect().unwrap();
    let _link = open(&mut client, &mut links).await;
    let (state, line) = client.probe();
    assert_eq!(state, ConnectionState::Connected);
    assert_eq!(line.kind, LineKind::Status);
    assert_eq!(line.text, "connectivity: connected");
}

#[tokio::test]
async fn close_only_waits_on_an_open_connection() {
    let (transport, mut links) = scripted();
    let mut client = Client::with_transport(ClientConfig::default(), transport);

    client.close();
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.try_next_event(), None);

    client.connect().unwrap();
    let mut link = open(&mut client, &mut links).await;
    client.close();
    assert_eq!(client.state(), ConnectionState::Closing);
    assert_eq!(
        next(&mut client).await,
        ClientEvent::StateChanged(ConnectionState::Closing)
    );
    assert!(matches!(
        link.next_outbound().await,
        Some(imlink_client::transport::Outbound::Close { code: 1000, .. })
    ));
    link.closed();
    assert_eq!(
        next(&mut client).await,
        ClientEvent::StateChanged(ConnectionState::Disconnected)
    );
    assert_eq!(next(&mut client).await, ClientEvent::Disconnected);
}
