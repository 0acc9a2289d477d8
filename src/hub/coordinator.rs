//! Hub control loop
//!
//! The membership set is owned by a single task and mutated only there.
//! Every operation — register, unregister, broadcast, unicast — arrives as
//! an event on one bounded queue, so membership changes and fan-out are
//! serialized without a lock. Events are processed in submission order;
//! a registration is visible to every event submitted after it completes.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

use crate::stats::HubStats;

use super::client::ClientHandle;
use super::config::HubConfig;

/// Event processed by the hub control loop
enum HubEvent {
    /// Add a client to the membership set
    Register(ClientHandle),
    /// Remove a client by registry key (no-op if absent)
    Unregister(u64),
    /// Fan a message out to every registered client
    Broadcast(Bytes),
    /// Deliver a message to every client with a matching identity
    Unicast { identity: String, message: Bytes },
    /// Report the current membership size
    Count(oneshot::Sender<usize>),
}

/// Handle to a running hub
///
/// Cheap to clone; every clone addresses the same membership set. Construct
/// one per process with [`Hub::spawn`] and pass it by reference (or clone)
/// into whatever layer needs to broadcast — the hub itself lives for the
/// process lifetime. All delivery operations are fire-and-forget.
#[derive(Debug, Clone)]
pub struct Hub {
    events: mpsc::Sender<HubEvent>,
    stats: Arc<HubStats>,
    config: HubConfig,
}

impl Hub {
    /// Start the control loop and return a handle to it
    ///
    /// Must be called from within a Tokio runtime. The loop runs until
    /// every `Hub` handle has been dropped; there is no explicit shutdown.
    pub fn spawn(config: HubConfig) -> Self {
        let (events, rx) = mpsc::channel(config.event_capacity.max(1));
        let stats = Arc::new(HubStats::default());

        let task = HubTask {
            clients: HashMap::new(),
            events: rx,
            stats: Arc::clone(&stats),
        };
        tokio::spawn(task.run());

        Self {
            events,
            stats,
            config,
        }
    }

    /// The configuration this hub was started with
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Point-in-time copy of the hub counters
    pub fn stats(&self) -> crate::stats::HubStatsSnapshot {
        self.stats.snapshot()
    }

    /// Add a client to the membership set
    ///
    /// Always succeeds; there is no rejection path. The client is visible
    /// to every broadcast submitted after this call returns.
    pub async fn register(&self, client: ClientHandle) {
        self.submit(HubEvent::Register(client)).await;
    }

    /// Remove a client by registry key
    ///
    /// Idempotent: removing an absent client is a no-op. Removal closes the
    /// client's outbound queue, which terminates its outbound pump.
    pub async fn unregister(&self, key: u64) {
        self.submit(HubEvent::Unregister(key)).await;
    }

    /// Broadcast a message to every registered client
    ///
    /// Best-effort: a client whose queue is full is disconnected instead of
    /// slowing anyone down. Never reports an error to the caller.
    pub async fn broadcast(&self, message: impl Into<Bytes>) {
        self.submit(HubEvent::Broadcast(message.into())).await;
    }

    /// Send a message to every client whose identity matches
    ///
    /// Silent no-op when no client matches. Uses the same full-queue policy
    /// as [`broadcast`](Hub::broadcast).
    pub async fn send_to(&self, identity: &str, message: impl Into<Bytes>) {
        self.submit(HubEvent::Unicast {
            identity: identity.to_owned(),
            message: message.into(),
        })
        .await;
    }

    /// Current membership size
    ///
    /// Answered by the control loop after every previously submitted event
    /// has been processed. Returns 0 if the loop has stopped.
    pub async fn client_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.events.send(HubEvent::Count(tx)).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    async fn submit(&self, event: HubEvent) {
        // The loop only stops once every handle is gone, so a send error
        // here means the process is tearing down; nothing left to do.
        let _ = self.events.send(event).await;
    }
}

/// State owned by the control loop task
struct HubTask {
    clients: HashMap<u64, ClientHandle>,
    events: mpsc::Receiver<HubEvent>,
    stats: Arc<HubStats>,
}

impl HubTask {
    async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            match event {
                HubEvent::Register(client) => {
                    tracing::debug!(
                        client = %client.identity(),
                        session = client.key(),
                        clients = self.clients.len() + 1,
                        "client registered"
                    );
                    self.stats.clients_registered.fetch_add(1, Ordering::Relaxed);
                    self.clients.insert(client.key(), client);
                }
                HubEvent::Unregister(key) => {
                    if let Some(client) = self.clients.remove(&key) {
                        tracing::debug!(
                            client = %client.identity(),
                            session = key,
                            clients = self.clients.len(),
                            "client unregistered"
                        );
                        self.stats
                            .clients_unregistered
                            .fetch_add(1, Ordering::Relaxed);
                    }
                }
                HubEvent::Broadcast(message) => {
                    self.stats.broadcasts.fetch_add(1, Ordering::Relaxed);
                    self.deliver(message, None);
                }
                HubEvent::Unicast { identity, message } => {
                    self.stats.unicasts.fetch_add(1, Ordering::Relaxed);
                    self.deliver(message, Some(&identity));
                }
                HubEvent::Count(reply) => {
                    let _ = reply.send(self.clients.len());
                }
            }
        }
        tracing::debug!("hub control loop stopped");
    }

    /// Offer a message to every client, or to matching identities only
    ///
    /// A full queue marks its client unresponsive: the record is removed
    /// on the spot (closing the queue) and delivery continues to the rest.
    fn deliver(&mut self, message: Bytes, identity: Option<&str>) {
        let stats = &self.stats;

        self.clients.retain(|key, client| {
            if let Some(identity) = identity {
                if client.identity().as_str() != identity {
                    return true;
                }
            }

            match client.try_enqueue(message.clone()) {
                Ok(()) => {
                    stats.messages_enqueued.fetch_add(1, Ordering::Relaxed);
                    true
                }
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        client = %client.identity(),
                        session = *key,
                        "outbound queue full, disconnecting client"
                    );
                    stats.clients_evicted.fetch_add(1, Ordering::Relaxed);
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    // Pump already gone; its unregistration is in flight.
                    tracing::debug!(session = *key, "outbound queue closed, dropping record");
                    false
                }
            }
        });
    }
}
