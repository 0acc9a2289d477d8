//! Server components
//!
//! TCP accept loop, WebSocket upgrade, and server configuration.

pub mod config;
pub mod listener;

pub use config::ServerConfig;
pub use listener::HubServer;
