//! Connection broadcast hub
//!
//! The hub is the single authority for the set of currently connected
//! clients. All membership changes and all fan-out go through one control
//! loop, so no lock guards the membership set and no slow consumer can
//! stall anyone else.
//!
//! # Architecture
//!
//! ```text
//!                              Hub (handle)
//!                     ┌──────────────────────────┐
//!                     │ events: mpsc ────────────┼──► control loop task
//!                     │                          │    clients: HashMap<
//!                     │ register / unregister    │      key, ClientHandle>
//!                     │ broadcast / send_to      │
//!                     └────────────┬─────────────┘
//!                                  │ try_send per client
//!          ┌───────────────────────┼───────────────────────┐
//!          ▼                       ▼                       ▼
//!     [outbound queue]       [outbound queue]        [outbound queue]
//!     outbound pump          outbound pump           outbound pump
//!          │                       │                       │
//!          └──► WebSocket          └──► WebSocket          └──► WebSocket
//! ```
//!
//! # Backpressure isolation
//!
//! The control loop only ever *offers* a message to a client's bounded
//! outbound queue. A full queue means the client is unresponsive: it is
//! disconnected on the spot and fan-out continues to the rest. One slow
//! consumer can only ever affect itself.
//!
//! # Zero-copy fan-out
//!
//! Payloads are `bytes::Bytes`, so a broadcast to N clients reference-counts
//! one allocation instead of copying it N times.

pub mod client;
pub mod config;
pub mod coordinator;

pub use client::{ClientHandle, Identity};
pub use config::HubConfig;
pub use coordinator::Hub;
