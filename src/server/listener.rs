//! WebSocket hub server
//!
//! Handles the TCP accept loop and the WebSocket upgrade, then hands each
//! live connection to a per-connection session. The hub itself never sees
//! a handshake: failures stop here.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::error::Result;
use crate::hub::{Hub, HubConfig, Identity};
use crate::server::config::ServerConfig;
use crate::session::ClientSession;

/// WebSocket broadcast hub server
///
/// Owns the hub for its process lifetime. Create once and run; the hub
/// handle is reachable through [`hub`](HubServer::hub) so outer layers can
/// broadcast without going through a connection.
pub struct HubServer {
    config: ServerConfig,
    hub_config: HubConfig,
    hub: Hub,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl HubServer {
    /// Create a new server with the given configuration
    ///
    /// Must be called from within a Tokio runtime (the hub control loop is
    /// started here).
    pub fn new(config: ServerConfig) -> Self {
        Self::with_hub_config(config, HubConfig::default())
    }

    /// Create a new server with custom hub configuration
    pub fn with_hub_config(config: ServerConfig, hub_config: HubConfig) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            hub_config: hub_config.clone(),
            hub: Hub::spawn(hub_config),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a handle to the hub
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the process exits.
    pub async fn run(&self) -> Result<()> {
        self.hub_config.validate()?;

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "hub server listening");

        self.accept_loop(&listener).await
    }

    /// Run the server until the shutdown future completes
    ///
    /// Stops accepting new connections; live sessions and the hub keep
    /// running until the process exits.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        self.hub_config.validate()?;

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "hub server listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(error = %e, "failed to set TCP_NODELAY");
            }
        }

        let ws_config = WebSocketConfig::default()
            .read_buffer_size(self.config.read_buffer_size)
            .write_buffer_size(self.config.write_buffer_size)
            .max_message_size(Some(self.hub_config.max_message_size))
            .max_frame_size(Some(self.hub_config.max_message_size));

        let hub = self.hub.clone();
        let hub_config = self.hub_config.clone();
        let handshake_timeout = self.config.handshake_timeout;

        tokio::spawn(async move {
            // Holds the connection slot until the session finishes.
            let _permit = permit;

            let handshake = tokio_tungstenite::accept_async_with_config(socket, Some(ws_config));
            let stream = match tokio::time::timeout(handshake_timeout, handshake).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(error)) => {
                    log_handshake_error(peer_addr, &error);
                    return;
                }
                Err(_) => {
                    tracing::debug!(peer = %peer_addr, "handshake timed out");
                    return;
                }
            };

            let identity = Identity::random();
            tracing::info!(
                session = session_id,
                peer = %peer_addr,
                client = %identity,
                "connection upgraded"
            );

            ClientSession::new(session_id, identity, hub, hub_config, stream)
                .run()
                .await;

            tracing::debug!(session = session_id, "connection closed");
        });
    }
}

/// A peer dropping the socket mid-handshake is routine; anything else
/// (malformed upgrade, protocol violation) is worth a warning.
fn log_handshake_error(peer_addr: SocketAddr, error: &WsError) {
    match error {
        WsError::Io(e) => {
            tracing::debug!(peer = %peer_addr, error = %e, "handshake aborted");
        }
        error => {
            tracing::warn!(peer = %peer_addr, %error, "handshake failed");
        }
    }
}
