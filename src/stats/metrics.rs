//! Statistics and counters for the broadcast hub

use std::sync::atomic::{AtomicU64, Ordering};

/// Hub-level counters
///
/// Updated by the hub control loop; read via [`HubStats::snapshot`].
#[derive(Debug, Default)]
pub struct HubStats {
    /// Clients ever registered
    pub(crate) clients_registered: AtomicU64,
    /// Clients removed by explicit unregistration
    pub(crate) clients_unregistered: AtomicU64,
    /// Clients forcibly disconnected because their queue was full
    pub(crate) clients_evicted: AtomicU64,
    /// Broadcast events processed
    pub(crate) broadcasts: AtomicU64,
    /// Unicast events processed
    pub(crate) unicasts: AtomicU64,
    /// Messages successfully placed on an outbound queue
    pub(crate) messages_enqueued: AtomicU64,
}

impl HubStats {
    /// Take a point-in-time copy of all counters
    pub fn snapshot(&self) -> HubStatsSnapshot {
        HubStatsSnapshot {
            clients_registered: self.clients_registered.load(Ordering::Relaxed),
            clients_unregistered: self.clients_unregistered.load(Ordering::Relaxed),
            clients_evicted: self.clients_evicted.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            unicasts: self.unicasts.load(Ordering::Relaxed),
            messages_enqueued: self.messages_enqueued.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`HubStats`]
#[derive(Debug, Clone, Default)]
pub struct HubStatsSnapshot {
    /// Clients ever registered
    pub clients_registered: u64,
    /// Clients removed by explicit unregistration
    pub clients_unregistered: u64,
    /// Clients forcibly disconnected because their queue was full
    pub clients_evicted: u64,
    /// Broadcast events processed
    pub broadcasts: u64,
    /// Unicast events processed
    pub unicasts: u64,
    /// Messages successfully placed on an outbound queue
    pub messages_enqueued: u64,
}

impl HubStatsSnapshot {
    /// Clients still accounted as live (registered minus every removal path)
    pub fn live_clients(&self) -> u64 {
        self.clients_registered
            .saturating_sub(self.clients_unregistered)
            .saturating_sub(self.clients_evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_starts_at_zero() {
        let stats = HubStats::default();
        let snap = stats.snapshot();

        assert_eq!(snap.clients_registered, 0);
        assert_eq!(snap.clients_unregistered, 0);
        assert_eq!(snap.clients_evicted, 0);
        assert_eq!(snap.broadcasts, 0);
        assert_eq!(snap.unicasts, 0);
        assert_eq!(snap.messages_enqueued, 0);
        assert_eq!(snap.live_clients(), 0);
    }

    #[test]
    fn test_live_clients_accounting() {
        let stats = HubStats::default();
        stats.clients_registered.store(5, Ordering::Relaxed);
        stats.clients_unregistered.store(2, Ordering::Relaxed);
        stats.clients_evicted.store(1, Ordering::Relaxed);

        assert_eq!(stats.snapshot().live_clients(), 2);
    }

    #[test]
    fn test_live_clients_saturates() {
        let stats = HubStats::default();
        stats.clients_unregistered.store(3, Ordering::Relaxed);

        assert_eq!(stats.snapshot().live_clients(), 0);
    }
}
