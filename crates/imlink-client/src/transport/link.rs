//! Seam between a `Connection` and whatever actually moves frames.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use url::Url;

use imlink_core::error::TransportError;

/// Frame handed from the owning context to the I/O task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Debug)]
pub(crate) enum LinkEvent {
    Opened,
    Text(String),
    Binary(Bytes),
    Closed,
    Failed(TransportError),
}

/// One event posted by an I/O task, tagged with the connect attempt it belongs to.
#[derive(Debug)]
pub struct TransportEvent {
    pub(crate) generation: u64,
    pub(crate) event: LinkEvent,
}

/// I/O task side of one connect attempt.
///
/// A transport reports `opened` once the socket is usable, then any number of
/// `text`/`binary` frames, and finishes with exactly one of `closed`/`failed`.
#[derive(Debug)]
pub struct Link {
    generation: u64,
    events: mpsc::UnboundedSender<TransportEvent>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
}

impl Link {
    pub(crate) fn new(
        generation: u64,
        events: mpsc::UnboundedSender<TransportEvent>,
        outbound: mpsc::UnboundedReceiver<Outbound>,
    ) -> Self {
        Self {
            generation,
            events,
            outbound,
        }
    }

    fn post(&self, event: LinkEvent) {
        // Receiver gone means the client was dropped; nothing left to notify.
        let _ = self.events.send(TransportEvent {
            generation: self.generation,
            event,
        });
    }

    pub fn opened(&self) {
        self.post(LinkEvent::Opened);
    }

    pub fn text(&self, payload: String) {
        self.post(LinkEvent::Text(payload));
    }

    pub fn binary(&self, payload: Bytes) {
        self.post(LinkEvent::Binary(payload));
    }

    pub fn closed(&self) {
        self.post(LinkEvent::Closed);
    }

    pub fn failed(&self, err: TransportError) {
        self.post(LinkEvent::Failed(err));
    }

    /// Next frame to write. `None` once the owning `Connection` dropped its sender.
    pub async fn next_outbound(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }
}

/// Something that can open a message-oriented link to a URL.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Drive one connection attempt to completion.
    async fn run(&self, url: Url, link: Link);
}
