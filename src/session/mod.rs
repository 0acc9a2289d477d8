//! Per-connection session handling
//!
//! One [`ClientSession`] per upgraded connection: an inbound pump relaying
//! peer messages into the hub and an outbound pump draining the client's
//! queue to the wire, with keepalive pings and write deadlines.

pub mod adapter;

pub use adapter::ClientSession;
