//! tokio-tungstenite transport.
//!
//! One task per connect attempt:
//! - dial + websocket handshake
//! - outbound writer (frames posted by `Connection::send` / `close`)
//! - inbound reader (text/binary surfaced, ping/pong/close handled here)
//! - optional keepalive ping
//! - close handshake bounded by `close_timeout`

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::transport::codec::{self, Inbound};
use crate::transport::link::{Link, Outbound, Transport};

#[derive(Debug, Clone)]
pub struct WsTransport {
    keepalive: Option<Duration>,
    close_timeout: Duration,
}

impl WsTransport {
    pub fn new(keepalive: Option<Duration>, close_timeout: Duration) -> Self {
        Self {
            keepalive,
            close_timeout,
        }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn run(&self, url: Url, mut link: Link) {
        tracing::debug!(%url, "websocket dialing");
        let (socket, _resp) = match connect_async(url.as_str()).await {
            Ok(ok) => ok,
            Err(e) => {
                link.failed(codec::map_error(e));
                return;
            }
        };
        link.opened();

        let (mut ws_tx, mut ws_rx) = socket.split();

        let mut ping_tick = self.keepalive.map(|every| {
            let mut t = tokio::time::interval(every);
            t.set_missed_tick_behavior(MissedTickBehavior::Delay);
            t
        });

        // Set once we sent our close frame; we then only read until the peer
        // confirms or `close_by` passes.
        let mut closing = false;
        let mut close_by: Option<Instant> = None;

        loop {
            tokio::select! {
                // outbound writer
                maybe_out = link.next_outbound(), if !closing => {
                    match maybe_out {
                        Some(out @ Outbound::Close { .. }) => {
                            closing = true;
                            let by = Instant::now() + self.close_timeout;
                            close_by = Some(by);
                            let frame = codec::encode(out);
                            match tokio::time::timeout_at(by, ws_tx.send(frame)).await {
                                Ok(Ok(())) => {}
                                Ok(Err(_)) => {
                                    link.closed();
                                    return;
                                }
                                Err(_) => {
                                    tracing::warn!("close frame not flushed, dropping socket");
                                    link.closed();
                                    return;
                                }
                            }
                        }
                        Some(out) => {
                            if let Err(e) = ws_tx.send(codec::encode(out)).await {
                                if codec::is_clean_close(&e) {
                                    link.closed();
                                } else {
                                    link.failed(codec::map_error(e));
                                }
                                return;
                            }
                        }
                        None => {
                            // Connection dropped: best-effort close, nobody is listening anymore.
                            let _ = ws_tx.close().await;
                            return;
                        }
                    }
                }

                // inbound reader
                incoming = ws_rx.next() => {
                    match incoming {
                        Some(Ok(msg)) => match codec::decode(msg) {
                            Some(Inbound::Text(s)) => link.text(s),
                            Some(Inbound::Binary(b)) => link.binary(b),
                            Some(Inbound::Close(frame)) => {
                                tracing::debug!(?frame, "peer sent close");
                            }
                            Some(Inbound::Ping(_)) | Some(Inbound::Pong(_)) | None => {}
                        },
                        Some(Err(e)) => {
                            if closing || codec::is_clean_close(&e) {
                                link.closed();
                            } else {
                                link.failed(codec::map_error(e));
                            }
                            return;
                        }
                        None => {
                            link.closed();
                            return;
                        }
                    }
                }

                // peer never answered our close frame
                _ = deadline(close_by) => {
                    tracing::warn!(
                        timeout_ms = self.close_timeout.as_millis() as u64,
                        "close handshake timed out, dropping socket"
                    );
                    link.closed();
                    return;
                }

                // keepalive
                _ = tick(&mut ping_tick), if !closing => {
                    if let Err(e) = ws_tx.send(Message::Ping(Bytes::new())).await {
                        link.failed(codec::map_error(e));
                        return;
                    }
                }
            }
        }
    }
}

async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
