//! Hub configuration

use std::time::Duration;

use crate::error::{Error, Result};

/// Time allowed to write a message to the peer.
pub const WRITE_DEADLINE: Duration = Duration::from_secs(10);

/// Time allowed between frames from the peer before it is considered dead.
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum message size allowed from a peer, in bytes.
pub const MAX_MESSAGE_SIZE: usize = 512;

/// Outbound queue capacity per client, in messages.
pub const QUEUE_CAPACITY: usize = 256;

/// Hub event queue capacity.
pub const EVENT_CAPACITY: usize = 1024;

/// Configuration for the hub and its per-connection pumps
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Outbound queue capacity per client (messages)
    pub queue_capacity: usize,

    /// Hub event queue capacity
    pub event_capacity: usize,

    /// Maximum inbound message size (bytes)
    pub max_message_size: usize,

    /// Time allowed for a single write to the peer
    pub write_deadline: Duration,

    /// Time allowed between frames from the peer
    pub read_timeout: Duration,

    /// Keepalive ping period. Must be strictly less than `read_timeout`.
    pub ping_period: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: QUEUE_CAPACITY,
            event_capacity: EVENT_CAPACITY,
            max_message_size: MAX_MESSAGE_SIZE,
            write_deadline: WRITE_DEADLINE,
            read_timeout: READ_TIMEOUT,
            ping_period: keepalive_for(READ_TIMEOUT),
        }
    }
}

/// Keepalive period for a given read timeout (9/10 of it)
fn keepalive_for(read_timeout: Duration) -> Duration {
    read_timeout * 9 / 10
}

impl HubConfig {
    /// Set the per-client outbound queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the hub event queue capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Set the maximum inbound message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size.max(1);
        self
    }

    /// Set the write deadline
    pub fn write_deadline(mut self, deadline: Duration) -> Self {
        self.write_deadline = deadline;
        self
    }

    /// Set the read timeout. The ping period is rederived as 9/10 of it.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self.ping_period = keepalive_for(timeout);
        self
    }

    /// Override the ping period. Must stay strictly below the read timeout.
    pub fn ping_period(mut self, period: Duration) -> Self {
        self.ping_period = period;
        self
    }

    /// Check structural invariants
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".into()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".into()));
        }
        if self.max_message_size == 0 {
            return Err(Error::Config("max_message_size must be at least 1".into()));
        }
        if self.ping_period.is_zero() {
            return Err(Error::Config("ping_period must be non-zero".into()));
        }
        if self.ping_period >= self.read_timeout {
            return Err(Error::Config(format!(
                "ping_period ({:?}) must be strictly less than read_timeout ({:?})",
                self.ping_period, self.read_timeout
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();

        assert_eq!(config.queue_capacity, 256);
        assert_eq!(config.max_message_size, 512);
        assert_eq!(config.write_deadline, Duration::from_secs(10));
        assert_eq!(config.read_timeout, Duration::from_secs(60));
        assert_eq!(config.ping_period, Duration::from_secs(54));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_keepalive_stays_below_read_timeout() {
        // The structural invariant: ping period < read timeout, for any
        // read timeout set through the builder.
        for secs in [1u64, 2, 10, 30, 60, 90, 600] {
            let config = HubConfig::default().read_timeout(Duration::from_secs(secs));
            assert!(
                config.ping_period < config.read_timeout,
                "ping {:?} not below read timeout {:?}",
                config.ping_period,
                config.read_timeout
            );
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_ping_period_override_validated() {
        let config = HubConfig::default()
            .read_timeout(Duration::from_secs(10))
            .ping_period(Duration::from_secs(10));

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_ping_period_rejected() {
        let config = HubConfig::default().ping_period(Duration::ZERO);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_capacities_clamped() {
        let config = HubConfig::default().queue_capacity(0).event_capacity(0);

        assert_eq!(config.queue_capacity, 1);
        assert_eq!(config.event_capacity, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = HubConfig::default()
            .queue_capacity(32)
            .max_message_size(1024)
            .write_deadline(Duration::from_secs(5))
            .read_timeout(Duration::from_secs(30));

        assert_eq!(config.queue_capacity, 32);
        assert_eq!(config.max_message_size, 1024);
        assert_eq!(config.write_deadline, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Duration::from_secs(30));
        assert_eq!(config.ping_period, Duration::from_secs(27));
    }
}
