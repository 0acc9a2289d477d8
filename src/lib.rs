//! # wshub-rs
//!
//! WebSocket broadcast hub library: a concurrent registry of live
//! connections with global broadcast, targeted unicast, and safe teardown
//! under slow or failed consumers.
//!
//! # Architecture
//!
//! ```text
//!   TCP accept ──► WebSocket upgrade ──► ClientSession (per connection)
//!                  (server::HubServer)    ├── inbound pump  ──► Hub
//!                                         └── outbound pump ◄── queue
//!                                                               ▲
//!   Hub control loop ── register/unregister/broadcast ──────────┘
//!   (hub::Hub, one task, owns the membership set)
//! ```
//!
//! Delivery is best-effort: the hub offers each message to a client's
//! bounded queue without blocking, and a client whose queue is full is
//! disconnected rather than allowed to stall the broadcaster or anyone
//! else. Join and leave announcements (`"<id> just joined"` /
//! `"<id> just left"`) are part of the protocol.
//!
//! # Example
//!
//! ```no_run
//! use wshub_rs::{HubServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> wshub_rs::Result<()> {
//!     let server = HubServer::new(ServerConfig::default());
//!
//!     // The hub is reachable for out-of-band broadcasts.
//!     server.hub().broadcast("server started").await;
//!
//!     server.run().await
//! }
//! ```

pub mod error;
pub mod hub;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use hub::{Hub, HubConfig, Identity};
pub use server::{HubServer, ServerConfig};
pub use session::ClientSession;
pub use stats::{HubStats, HubStatsSnapshot};
