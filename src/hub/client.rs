//! Client record types
//!
//! The hub tracks each live connection through a [`ClientHandle`]: the
//! client's identity plus the producer side of its outbound queue. The
//! handle is created by the upgrade boundary and surrendered to the hub at
//! registration; dropping it is what closes the queue.

use bytes::Bytes;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Size of the identity space. Identities are decimal strings in
/// `0..IDENTITY_SPACE`.
const IDENTITY_SPACE: u32 = 100;

/// Display identity of a connected client
///
/// Identities are not unique: the space is small and two live clients can
/// share one. [`Hub::send_to`](super::Hub::send_to) delivers to every
/// client whose identity matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Draw a random identity
    pub fn random() -> Self {
        Self(rand::rng().random_range(0..IDENTITY_SPACE).to_string())
    }

    /// The identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Record for a single registered client
///
/// Holds the only producer side of the client's outbound queue; when the
/// hub drops the handle, the queue closes and the client's outbound pump
/// terminates.
#[derive(Debug)]
pub struct ClientHandle {
    /// Registry key, unique per process run
    key: u64,

    /// Display identity (possibly shared with other clients)
    identity: Identity,

    /// Producer side of the outbound queue
    sender: mpsc::Sender<Bytes>,
}

impl ClientHandle {
    /// Create a new client record
    pub fn new(key: u64, identity: Identity, sender: mpsc::Sender<Bytes>) -> Self {
        Self {
            key,
            identity,
            sender,
        }
    }

    /// Registry key
    pub fn key(&self) -> u64 {
        self.key
    }

    /// Display identity
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Offer a message to the outbound queue without blocking
    pub(crate) fn try_enqueue(&self, message: Bytes) -> Result<(), TrySendError<Bytes>> {
        self.sender.try_send(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_within_space() {
        for _ in 0..256 {
            let id = Identity::random();
            let n: u32 = id.as_str().parse().expect("identity is a decimal string");
            assert!(n < IDENTITY_SPACE);
        }
    }

    #[test]
    fn test_identity_from_str() {
        let id = Identity::from("42");
        assert_eq!(id.as_str(), "42");
        assert_eq!(id.to_string(), "42");
    }

    #[tokio::test]
    async fn test_try_enqueue_reports_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let client = ClientHandle::new(1, Identity::from("7"), tx);

        assert!(client.try_enqueue(Bytes::from_static(b"one")).is_ok());
        assert!(matches!(
            client.try_enqueue(Bytes::from_static(b"two")),
            Err(TrySendError::Full(_))
        ));

        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"one"));
    }

    #[tokio::test]
    async fn test_dropping_handle_closes_queue() {
        let (tx, mut rx) = mpsc::channel::<Bytes>(1);
        let client = ClientHandle::new(1, Identity::from("7"), tx);

        drop(client);
        assert!(rx.recv().await.is_none());
    }
}
