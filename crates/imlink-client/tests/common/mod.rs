//! In-memory transport: every connect attempt hands its `Link` to the test,
//! which then plays the server side.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use url::Url;

use imlink_client::transport::{Link, Outbound, Transport};
use imlink_client::{Client, ClientEvent};
use imlink_core::protocol::text::{self, Envelope};

pub struct ScriptedTransport {
    links: mpsc::UnboundedSender<(Url, Link)>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn run(&self, url: Url, link: Link) {
        let _ = self.links.send((url, link));
    }
}

pub fn scripted() -> (Arc<ScriptedTransport>, mpsc::UnboundedReceiver<(Url, Link)>) {
    let (links, rx) = mpsc::unbounded_channel();
    (Arc::new(ScriptedTransport { links }), rx)
}

pub async fn accept(links: &mut mpsc::UnboundedReceiver<(Url, Link)>) -> (Url, Link) {
    tokio::time::timeout(Duration::from_secs(5), links.recv())
        .await
        .expect("no connect attempt")
        .expect("transport dropped")
}

pub async fn next(client: &mut Client) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(5), client.next_event())
        .await
        .expect("timed out waiting for client event")
        .expect("event queue closed")
}

/// Read the next outbound text frame and decode it.
pub async fn read_envelope(link: &mut Link) -> Envelope {
    match tokio::time::timeout(Duration::from_secs(5), link.next_outbound())
        .await
        .expect("no outbound frame")
    {
        Some(Outbound::Text(wire)) => text::decode(&wire).expect("client sent a bad envelope"),
        other => panic!("expected text frame, got {other:?}"),
    }
}

pub fn obj(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => panic!("not an object"),
    }
}

/// After `connect`/`login` started an attempt: accept it, open it, consume the
/// state/connected events.
pub async fn open(client: &mut Client, links: &mut mpsc::UnboundedReceiver<(Url, Link)>) -> Link {
    use imlink_client::transport::ConnectionState;

    assert_eq!(next(client).await, ClientEvent::StateChanged(ConnectionState::Connecting));
    let (_url, link) = accept(links).await;
    link.opened();
    assert_eq!(next(client).await, ClientEvent::StateChanged(ConnectionState::Connected));
    assert_eq!(next(client).await, ClientEvent::Connected);
    link
}
