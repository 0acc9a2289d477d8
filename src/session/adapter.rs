//! Per-connection adapter
//!
//! Bridges one upgraded WebSocket connection to the hub. The connection is
//! split into halves, each owned by exactly one loop: the inbound pump
//! relays peer messages into the hub's broadcast path, the outbound pump
//! drains the client's queue to the wire and keeps the peer alive with
//! pings. The outbound queue is the only resource the two sides share.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::hub::{ClientHandle, Hub, HubConfig, Identity};

/// Adapter for a single live connection
///
/// Owns the WebSocket exclusively. [`run`](ClientSession::run) registers
/// the client, drives both pumps to completion, and releases everything —
/// a failure on either side of the connection never escapes this task.
pub struct ClientSession<S> {
    key: u64,
    identity: Identity,
    hub: Hub,
    config: HubConfig,
    stream: WebSocketStream<S>,
}

impl<S> ClientSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Create an adapter for an upgraded connection
    pub fn new(
        key: u64,
        identity: Identity,
        hub: Hub,
        config: HubConfig,
        stream: WebSocketStream<S>,
    ) -> Self {
        Self {
            key,
            identity,
            hub,
            config,
            stream,
        }
    }

    /// Drive the connection until either side fails or the peer leaves
    pub async fn run(self) {
        let Self {
            key,
            identity,
            hub,
            config,
            stream,
        } = self;

        // The hub's record holds the only producer; dropping it on
        // unregistration is what closes the queue.
        let (sender, queue) = mpsc::channel(config.queue_capacity.max(1));
        hub.register(ClientHandle::new(key, identity.clone(), sender))
            .await;
        hub.broadcast(format!("{} just joined", identity).into_bytes())
            .await;

        let (ws_tx, ws_rx) = stream.split();
        let mut writer = tokio::spawn(write_pump(ws_tx, queue, config.clone()));

        let writer_done = tokio::select! {
            _ = &mut writer => true,
            _ = read_pump(ws_rx, &hub, &identity, config.read_timeout) => false,
        };

        hub.broadcast(format!("{} just left", identity).into_bytes())
            .await;
        hub.unregister(key).await;

        if !writer_done {
            // Unregistration closes the queue, which ends the writer.
            let _ = writer.await;
        }

        tracing::debug!(client = %identity, session = key, "session finished");
    }
}

/// Inbound pump: relay peer messages into the hub
///
/// Each read is bounded by the read-liveness timeout; any frame from the
/// peer (including pong) restarts it. Ends on close, read error, oversized
/// message, or timeout.
async fn read_pump<S>(
    mut ws_rx: SplitStream<WebSocketStream<S>>,
    hub: &Hub,
    identity: &Identity,
    read_timeout: Duration,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let message = match tokio::time::timeout(read_timeout, ws_rx.next()).await {
            Err(_) => {
                tracing::debug!(client = %identity, "peer silent past read timeout");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(error))) => {
                log_read_error(identity, &error);
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(text) => relay(hub, identity, text.as_str()).await,
            Message::Binary(data) => relay(hub, identity, &String::from_utf8_lossy(&data)).await,
            Message::Close(frame) => {
                note_close(identity, frame.as_ref());
                break;
            }
            // Pings are answered by the protocol layer; pongs and raw
            // frames only count as liveness credit.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }
}

/// Normalize an inbound message and submit it under the sender's identity
async fn relay(hub: &Hub, identity: &Identity, raw: &str) {
    hub.broadcast(format!("{}:{}", identity, normalize(raw)).into_bytes())
        .await;
}

/// Fold interior newlines to single spaces and trim surrounding whitespace
fn normalize(raw: &str) -> String {
    raw.replace('\n', " ").trim().to_string()
}

fn log_read_error(identity: &Identity, error: &WsError) {
    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            tracing::debug!(client = %identity, "connection closed during read");
        }
        WsError::Capacity(reason) => {
            tracing::warn!(client = %identity, %reason, "inbound message over size limit");
        }
        error => {
            tracing::warn!(client = %identity, %error, "read failed");
        }
    }
}

/// Going-away, abnormal closure, and no-status are ordinary departures;
/// anything else is worth a warning.
fn note_close(identity: &Identity, frame: Option<&CloseFrame>) {
    match frame {
        Some(frame)
            if !matches!(
                frame.code,
                CloseCode::Away | CloseCode::Abnormal | CloseCode::Status
            ) =>
        {
            tracing::warn!(client = %identity, code = ?frame.code, "unexpected close code");
        }
        _ => tracing::debug!(client = %identity, "peer closed connection"),
    }
}

/// Outbound pump: drain the queue to the wire, keep the peer alive
///
/// Races the queue against the keepalive timer. Queued messages are
/// coalesced — everything already waiting goes out in the same frame,
/// newline-separated — to cut write syscalls under burst load. The queue
/// closing is the only normal exit: it sends the peer a close frame.
/// Every write is bounded by the write deadline; a slow or dead peer
/// kills this connection only.
async fn write_pump<S>(
    mut ws_tx: SplitSink<WebSocketStream<S>, Message>,
    mut queue: mpsc::Receiver<Bytes>,
    config: HubConfig,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut ticker = tokio::time::interval(config.ping_period);
    // An interval's first tick completes immediately; swallow it.
    ticker.tick().await;

    loop {
        tokio::select! {
            message = queue.recv() => {
                let Some(first) = message else {
                    // The hub closed the queue.
                    let _ = tokio::time::timeout(
                        config.write_deadline,
                        ws_tx.send(Message::Close(None)),
                    )
                    .await;
                    return;
                };

                let mut batch = BytesMut::with_capacity(first.len());
                batch.extend_from_slice(&first);
                while let Ok(next) = queue.try_recv() {
                    batch.extend_from_slice(b"\n");
                    batch.extend_from_slice(&next);
                }

                let text = String::from_utf8_lossy(&batch).into_owned();
                if !write_with_deadline(&mut ws_tx, Message::text(text), config.write_deadline)
                    .await
                {
                    return;
                }
            }
            _ = ticker.tick() => {
                if !write_with_deadline(
                    &mut ws_tx,
                    Message::Ping(Bytes::new()),
                    config.write_deadline,
                )
                .await
                {
                    return;
                }
            }
        }
    }
}

/// Returns false when the write failed or overran the deadline
async fn write_with_deadline<S>(
    ws_tx: &mut SplitSink<WebSocketStream<S>, Message>,
    message: Message,
    deadline: Duration,
) -> bool
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match tokio::time::timeout(deadline, ws_tx.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(error)) => {
            tracing::debug!(%error, "write failed");
            false
        }
        Err(_) => {
            tracing::warn!("write deadline exceeded");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_tungstenite::tungstenite::protocol::Role;

    use super::*;

    async fn ws_pair() -> (
        WebSocketStream<tokio::io::DuplexStream>,
        WebSocketStream<tokio::io::DuplexStream>,
    ) {
        let (server_io, client_io) = tokio::io::duplex(4096);
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        (server, client)
    }

    #[test]
    fn test_normalize_folds_newlines_and_trims() {
        assert_eq!(normalize("  hello\nworld\n"), "hello world");
        assert_eq!(normalize("one\ntwo\nthree"), "one two three");
        assert_eq!(normalize("\n\n"), "");
        assert_eq!(normalize("plain"), "plain");
    }

    #[tokio::test]
    async fn test_session_announces_relays_and_unregisters() {
        let hub = Hub::spawn(HubConfig::default());
        let (probe_tx, mut probe) = mpsc::channel(16);
        hub.register(ClientHandle::new(1, Identity::from("probe"), probe_tx))
            .await;

        let (server, mut client) = ws_pair().await;
        let session = ClientSession::new(
            2,
            Identity::from("42"),
            hub.clone(),
            HubConfig::default(),
            server,
        );
        let running = tokio::spawn(session.run());

        assert_eq!(probe.recv().await.unwrap(), Bytes::from("42 just joined"));

        client
            .send(Message::text("  hello\nthere  "))
            .await
            .unwrap();
        assert_eq!(probe.recv().await.unwrap(), Bytes::from("42:hello there"));

        client.close(None).await.unwrap();
        assert_eq!(probe.recv().await.unwrap(), Bytes::from("42 just left"));

        running.await.unwrap();
        assert_eq!(hub.client_count().await, 1);
    }

    #[tokio::test]
    async fn test_outbound_pump_coalesces_queued_messages() {
        let (server, mut client) = ws_pair().await;
        let (tx, rx) = mpsc::channel(8);

        tx.send(Bytes::from("one")).await.unwrap();
        tx.send(Bytes::from("two")).await.unwrap();
        tx.send(Bytes::from("three")).await.unwrap();

        let (ws_tx, _ws_rx) = server.split();
        let pump = tokio::spawn(write_pump(ws_tx, rx, HubConfig::default()));

        let frame = client.next().await.unwrap().unwrap();
        assert_eq!(frame, Message::text("one\ntwo\nthree"));

        // Closing the queue is the writer's only normal exit: close frame.
        drop(tx);
        let frame = client.next().await.unwrap().unwrap();
        assert!(matches!(frame, Message::Close(None)));

        pump.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbound_pump_sends_keepalive_pings() {
        let config = HubConfig::default().read_timeout(Duration::from_secs(1));
        let (server, mut client) = ws_pair().await;
        let (tx, rx) = mpsc::channel::<Bytes>(8);

        let (ws_tx, _ws_rx) = server.split();
        let _pump = tokio::spawn(write_pump(ws_tx, rx, config));

        // No queued messages: the timer side of the race fires first.
        let frame = client.next().await.unwrap().unwrap();
        assert!(matches!(frame, Message::Ping(_)));
        let frame = client.next().await.unwrap().unwrap();
        assert!(matches!(frame, Message::Ping(_)));

        drop(tx);
    }

    #[tokio::test]
    async fn test_session_survives_peer_vanishing() {
        let hub = Hub::spawn(HubConfig::default());
        let (server, client) = ws_pair().await;

        let session = ClientSession::new(
            7,
            Identity::from("9"),
            hub.clone(),
            HubConfig::default(),
            server,
        );
        let running = tokio::spawn(session.run());

        // Transport torn down with no close handshake.
        drop(client);

        running.await.unwrap();
        assert_eq!(hub.client_count().await, 0);
    }
}
